//! Write-side backends and the [`Output`] facade.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use descio_base::error::ErrorKind;
use descio_base::{DescioError, DescioResult, defect, path_mapper};

use crate::classify::{
    WriteDescriptorKind, classify_write_descriptor, printable_write_descriptor,
};
use crate::header::HeaderHookHandle;
use crate::process::PipeWriter;

/// Contract shared by the concrete write-side resources.
///
/// Instances are created by [`Output`] after classification, own exactly
/// one native resource, and never outlive the facade's current open
/// session.
trait OutputBackend: fmt::Debug {
    /// Open the resource. Calling this on an already open backend is a
    /// defect.
    fn open(&mut self, descriptor: &str, binary: bool) -> DescioResult<()>;

    /// The stream payload bytes are written to. Defect if not open.
    fn stream(&mut self) -> &mut dyn Write;

    /// Flush and release the resource, reporting stream health.
    fn close(&mut self) -> DescioResult<()>;
}

/// Writes to a regular file at the mapper-translated path.
#[derive(Debug, Default)]
struct FileOutputBackend {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl OutputBackend for FileOutputBackend {
    fn open(&mut self, descriptor: &str, _binary: bool) -> DescioResult<()> {
        if self.writer.is_some() {
            defect!("file output opened while already open: {}", descriptor);
        }
        let path = path_mapper().map(descriptor)?;
        let file = File::create(&path).map_err(|e| {
            Box::new(DescioError::new(ErrorKind::FileError {
                path: path.clone(),
                source: e,
            }))
        })?;
        debug!(path = %path.display(), "opened file for writing");
        self.path = path;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn stream(&mut self) -> &mut dyn Write {
        match &mut self.writer {
            Some(writer) => writer,
            None => defect!("file output stream requested but the file is not open"),
        }
    }

    fn close(&mut self) -> DescioResult<()> {
        let Some(mut writer) = self.writer.take() else {
            defect!("file output closed but the file is not open");
        };
        writer.flush().map_err(|e| {
            Box::new(DescioError::new(ErrorKind::FileError {
                path: self.path.clone(),
                source: e,
            }))
        })
    }
}

/// Wraps the process's standard output.
#[derive(Debug, Default)]
struct StandardOutputBackend {
    stdout: Option<Stdout>,
}

impl OutputBackend for StandardOutputBackend {
    fn open(&mut self, _descriptor: &str, _binary: bool) -> DescioResult<()> {
        if self.stdout.is_some() {
            defect!("standard output opened while already open");
        }
        self.stdout = Some(io::stdout());
        Ok(())
    }

    fn stream(&mut self) -> &mut dyn Write {
        match &mut self.stdout {
            Some(stdout) => stdout,
            None => defect!("standard output stream requested but it is not open"),
        }
    }

    fn close(&mut self) -> DescioResult<()> {
        let Some(mut stdout) = self.stdout.take() else {
            defect!("standard output closed but it is not open");
        };
        stdout
            .flush()
            .map_err(|e| Box::new(DescioError::message(format!("error flushing standard output: {}", e))))
    }
}

/// Feeds a spawned shell command; the descriptor minus its leading `|`
/// is the command line.
#[derive(Debug, Default)]
struct PipeOutputBackend {
    writer: Option<PipeWriter>,
}

impl OutputBackend for PipeOutputBackend {
    fn open(&mut self, descriptor: &str, _binary: bool) -> DescioResult<()> {
        if self.writer.is_some() {
            defect!("pipe output opened while already open: {}", descriptor);
        }
        let Some(command) = descriptor.strip_prefix('|') else {
            defect!("pipe output descriptor without leading '|': {}", descriptor);
        };
        match PipeWriter::spawn(command) {
            Ok(writer) => {
                self.writer = Some(writer);
                Ok(())
            }
            Err(e) => {
                warn!(command, error = %e, "failed opening pipe for writing");
                Err(Box::new(DescioError::new(ErrorKind::ProcessError {
                    command: command.to_string(),
                    source: e,
                })))
            }
        }
    }

    fn stream(&mut self) -> &mut dyn Write {
        match &mut self.writer {
            Some(writer) => writer,
            None => defect!("pipe output stream requested but the pipe is not open"),
        }
    }

    fn close(&mut self) -> DescioResult<()> {
        let Some(mut writer) = self.writer.take() else {
            defect!("pipe output closed but the pipe is not open");
        };
        // A nonzero exit status has already been logged by finish() and
        // is not a stream failure.
        writer
            .finish()
            .map(|_| ())
            .map_err(|e| Box::new(DescioError::message(format!("error closing write pipeline: {}", e))))
    }
}

/// Write-side facade: owns at most one backend, selected by classifying
/// the descriptor at open time, and presents one stream handle.
#[derive(Debug, Default)]
pub struct Output {
    backend: Option<Box<dyn OutputBackend>>,
    descriptor: String,
    hook: HeaderHookHandle,
}

impl Output {
    /// Create a closed facade with the default header hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a closed facade with a custom header hook.
    pub fn with_hook(hook: HeaderHookHandle) -> Self {
        Self {
            backend: None,
            descriptor: String::new(),
            hook,
        }
    }

    /// Open the resource named by `descriptor` for writing.
    ///
    /// When `write_header` is set, the header hook runs against the
    /// fresh stream and its failure counts as open failure.
    ///
    /// Calling this while the facade is already open is a defect: close
    /// first.
    ///
    /// # Errors
    /// Invalid descriptors and backend open failures (file creation,
    /// process spawn, path mapping) are reported as errors with a logged
    /// warning; no backend is retained.
    #[instrument(skip(self))]
    pub fn open(&mut self, descriptor: &str, binary: bool, write_header: bool) -> DescioResult<()> {
        if self.backend.is_some() {
            defect!(
                "Output::open() called while {} is still open; close it first",
                printable_write_descriptor(&self.descriptor)
            );
        }
        let mut backend: Box<dyn OutputBackend> = match classify_write_descriptor(descriptor) {
            WriteDescriptorKind::File => Box::new(FileOutputBackend::default()),
            WriteDescriptorKind::Standard => Box::new(StandardOutputBackend::default()),
            WriteDescriptorKind::Pipe => Box::new(PipeOutputBackend::default()),
            WriteDescriptorKind::Invalid => {
                let printable = printable_write_descriptor(descriptor);
                warn!("invalid write descriptor format: {}", printable);
                return Err(Box::new(DescioError::new(ErrorKind::InvalidDescriptor {
                    descriptor: printable,
                })));
            }
        };
        backend.open(descriptor, binary)?;
        if write_header {
            if let Err(error) = self.hook.write_header(backend.stream(), binary) {
                // The backend (and its native resource) is released here.
                return Err(Box::new(DescioError::message(format!(
                    "error writing stream header to {}: {}",
                    printable_write_descriptor(descriptor),
                    error
                ))));
            }
        }
        self.descriptor = descriptor.to_string();
        self.backend = Some(backend);
        Ok(())
    }

    /// True when a backend is owned and its stream is available.
    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// The descriptor this facade was last opened with.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The stream payload bytes are written to.
    /// Calling this before a successful `open` is a defect.
    pub fn stream(&mut self) -> &mut dyn Write {
        match &mut self.backend {
            Some(backend) => backend.stream(),
            None => defect!("Output::stream() called but no output is open"),
        }
    }

    /// Flush and release the backend, reporting stream health.
    /// Calling this before a successful `open` is a defect.
    ///
    /// # Errors
    /// A failure to flush written bytes is handed to the caller. A
    /// nonzero pipeline exit status is not a failure; it has already
    /// been logged.
    #[instrument(skip(self))]
    pub fn close(&mut self) -> DescioResult<()> {
        let Some(mut backend) = self.backend.take() else {
            defect!("Output::close() called but no output is open");
        };
        backend.close()
    }
}

impl Drop for Output {
    /// Losing written bytes silently is never acceptable: a close
    /// failure discovered during scoped destruction escalates to a
    /// defect, unless the thread is already panicking.
    fn drop(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            if let Err(error) = backend.close() {
                if std::thread::panicking() {
                    warn!(
                        "error closing output {} during unwind: {}",
                        printable_write_descriptor(&self.descriptor),
                        error
                    );
                } else {
                    defect!(
                        "error closing output {}: {}",
                        printable_write_descriptor(&self.descriptor),
                        error
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HeaderHook, HeaderHookHandle};
    use std::io::BufRead;
    use tempfile::TempDir;

    #[test]
    fn file_output_writes_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        let descriptor = path.to_str().unwrap().to_string();

        let mut output = Output::new();
        output.open(&descriptor, true, false).unwrap();
        assert!(output.is_open());
        output.stream().write_all(b"payload").unwrap();
        output.close().unwrap();
        assert!(!output.is_open());

        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn binary_header_is_written_when_requested() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        let descriptor = path.to_str().unwrap().to_string();

        let mut output = Output::new();
        output.open(&descriptor, true, true).unwrap();
        output.stream().write_all(b"rest").unwrap();
        output.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"\0Brest");
    }

    #[test]
    fn text_mode_writes_no_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let descriptor = path.to_str().unwrap().to_string();

        let mut output = Output::new();
        output.open(&descriptor, false, true).unwrap();
        output.stream().write_all(b"rest").unwrap();
        output.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"rest");
    }

    #[test]
    fn standard_output_descriptor_opens_and_closes() {
        let mut output = Output::new();
        output.open("-", false, false).unwrap();
        output.stream().write_all(b"").unwrap();
        output.close().unwrap();
    }

    #[test]
    fn invalid_descriptor_is_a_graceful_failure() {
        let mut output = Output::new();
        assert!(output.open("foo|bar", true, false).is_err());
        assert!(!output.is_open());
        assert!(output.open(" leading-space", true, false).is_err());
        assert!(output.open("t,1:2", true, false).is_err());
    }

    #[test]
    fn unwritable_path_is_a_graceful_failure() {
        let mut output = Output::new();
        let result = output.open("/definitely/not/a/dir/out.bin", true, false);
        assert!(result.is_err());
        assert!(!output.is_open());
    }

    #[test]
    #[should_panic(expected = "close it first")]
    fn double_open_is_a_defect() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a").to_str().unwrap().to_string();
        let b = dir.path().join("b").to_str().unwrap().to_string();

        let mut output = Output::new();
        output.open(&a, true, false).unwrap();
        let _ = output.open(&b, true, false);
    }

    #[test]
    #[should_panic(expected = "no output is open")]
    fn stream_before_open_is_a_defect() {
        let mut output = Output::new();
        let _ = output.stream();
    }

    #[test]
    #[should_panic(expected = "no output is open")]
    fn close_before_open_is_a_defect() {
        let mut output = Output::new();
        let _ = output.close();
    }

    #[derive(Debug)]
    struct FailingHook;

    impl HeaderHook for FailingHook {
        fn write_header(&self, _stream: &mut dyn Write, _binary: bool) -> std::io::Result<()> {
            Err(std::io::Error::other("hook rejected the stream"))
        }

        fn read_header(&self, _stream: &mut dyn BufRead) -> std::io::Result<bool> {
            Err(std::io::Error::other("hook rejected the stream"))
        }
    }

    #[test]
    fn header_hook_failure_is_open_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        let descriptor = path.to_str().unwrap().to_string();

        let mut output = Output::with_hook(HeaderHookHandle::new(FailingHook));
        assert!(output.open(&descriptor, true, true).is_err());
        assert!(!output.is_open());
    }

    #[cfg(unix)]
    #[test]
    fn pipe_output_feeds_the_command() {
        let dir = TempDir::new().unwrap();
        let sink = dir.path().join("sink.txt");
        let descriptor = format!("|cat > {}", sink.display());

        let mut output = Output::new();
        output.open(&descriptor, true, false).unwrap();
        output.stream().write_all(b"piped bytes").unwrap();
        output.close().unwrap();

        assert_eq!(std::fs::read(&sink).unwrap(), b"piped bytes");
    }

    #[cfg(unix)]
    #[test]
    fn pipe_nonzero_exit_still_closes_successfully() {
        let mut output = Output::new();
        output.open("|cat > /dev/null; exit 3", true, false).unwrap();
        output.stream().write_all(b"ignored").unwrap();
        // The nonzero status is logged, not surfaced as a failure.
        assert!(output.close().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn explicit_close_hands_failure_to_the_caller() {
        let mut output = Output::new();
        output.open("|true", true, false).unwrap();
        // Give the child time to exit. The write below stays in the
        // local buffer, so the broken pipe only surfaces at close time.
        std::thread::sleep(std::time::Duration::from_millis(300));
        output.stream().write_all(b"lost bytes").unwrap();
        assert!(output.close().is_err());
    }

    #[cfg(unix)]
    #[test]
    #[should_panic(expected = "error closing output")]
    fn drop_escalates_close_failure() {
        let mut output = Output::new();
        output.open("|true", true, false).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(300));
        output.stream().write_all(b"lost bytes").unwrap();
        // Never closed: scoped destruction discovers the unflushable
        // bytes and escalates.
        drop(output);
    }
}
