//! `descio` — copy bytes between two extended descriptors.
//!
//! Usage: `descio [--text] <input-descriptor> <output-descriptor>`
//!
//! The input may be a file, `-` (standard input), a `cmd|` pipeline, or
//! a `path:offset` form; the output may be a file, `-`, or a `|cmd`
//! pipeline. By default the payload header is read from the input and
//! propagated to the output; `--text` skips the header entirely.
//!
//! When a `descio.toml` exists in the working directory, its `[mapper]`
//! table configures the path mapper before anything is opened.
//!
//! Exit codes:
//! - 0: bytes copied and both descriptors closed
//! - 1: error (bad usage, bad configuration, open/copy/close failure)

use std::env;
use std::io;
use std::path::Path;
use std::process;

use descio_base::tracing::init_tracing;
use descio_base::{EmulationMapper, PathMapperHandle, install_path_mapper};
use descio_core::{Input, Output, load_config};

const CONFIG_FILE: &str = "descio.toml";

fn main() {
    init_tracing().unwrap();

    let args: Vec<String> = env::args().skip(1).collect();
    let (text_mode, rest) = match args.first().map(String::as_str) {
        Some("--text") => (true, &args[1..]),
        _ => (false, &args[..]),
    };
    let [input_descriptor, output_descriptor] = rest else {
        eprintln!("Usage: descio [--text] <input-descriptor> <output-descriptor>");
        process::exit(1);
    };

    if Path::new(CONFIG_FILE).exists() {
        let config = match load_config(Path::new(CONFIG_FILE)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: failed to load {}: {}", CONFIG_FILE, e);
                process::exit(1);
            }
        };
        if let Some(mapper) = config.mapper {
            let handle = PathMapperHandle::new(EmulationMapper::new(mapper.into()));
            if let Err(e) = install_path_mapper(handle) {
                eprintln!("Error: failed to install path mapper: {}", e);
                process::exit(1);
            }
        }
    }

    let mut input = Input::new();
    let mut output = Output::new();

    let binary = if text_mode {
        if let Err(e) = input.open_text(input_descriptor) {
            eprintln!("Error: failed to open input {}: {}", input_descriptor, e);
            process::exit(1);
        }
        false
    } else {
        match input.open_with_header(input_descriptor) {
            Ok(binary) => binary,
            Err(e) => {
                eprintln!("Error: failed to open input {}: {}", input_descriptor, e);
                process::exit(1);
            }
        }
    };

    if let Err(e) = output.open(output_descriptor, binary, !text_mode) {
        eprintln!("Error: failed to open output {}: {}", output_descriptor, e);
        process::exit(1);
    }

    let copied = match io::copy(input.stream(), output.stream()) {
        Ok(copied) => copied,
        Err(e) => {
            eprintln!("Error: failed copying bytes: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = output.close() {
        eprintln!("Error: failed to close output {}: {}", output_descriptor, e);
        process::exit(1);
    }
    input.close();

    tracing::debug!(copied, "copy complete");
    // The payload may be going to standard output; keep the summary on
    // standard error.
    eprintln!("Copied {} bytes", copied);
}
