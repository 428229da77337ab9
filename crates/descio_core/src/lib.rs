//! Extended-descriptor I/O.
//!
//! One string — an "extended descriptor" — names where bytes come from
//! or go to: a regular file, the process's standard streams, a shell
//! pipeline, or (reading only) a byte offset inside a file. The
//! [`Input`] and [`Output`] facades classify the descriptor, own the
//! matching backend, and hand back one sequential stream handle. This
//! layer decides *where* bytes flow; it never transforms them.

pub mod classify;
pub mod config;
pub mod header;
pub mod input;
pub mod output;
pub mod process;

pub use classify::{
    ReadDescriptorKind, WriteDescriptorKind, classify_read_descriptor,
    classify_write_descriptor, printable_read_descriptor, printable_write_descriptor,
};
pub use config::{Config, MapperConfig, load_config, parse_config};
pub use header::{BinaryMarker, HeaderHook, HeaderHookHandle};
pub use input::Input;
pub use output::Output;
pub use process::{PipeReader, PipeWriter};
