//! Read-side backends and the [`Input`] facade.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, StdinLock};
use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use descio_base::error::ErrorKind;
use descio_base::{DescioError, DescioResult, defect, path_mapper};

use crate::classify::{
    ReadDescriptorKind, classify_read_descriptor, printable_read_descriptor,
};
use crate::header::HeaderHookHandle;
use crate::process::PipeReader;

/// How far ahead of the current position a requested offset may be for
/// the backend to read forward instead of issuing a native seek.
const SEEK_READ_AHEAD_LIMIT: u64 = 100;

/// Contract shared by the concrete read-side resources.
///
/// Instances are created by [`Input`] after classification, own exactly
/// one native resource, and never outlive the facade's current open
/// session. Only the offset-file backend may be opened again while
/// already open; it reuses the handle (see [`OffsetFileInputBackend`]).
trait InputBackend: fmt::Debug {
    /// Open the resource.
    fn open(&mut self, descriptor: &str, binary: bool) -> DescioResult<()>;

    /// The stream payload bytes are read from. Defect if not open.
    fn stream(&mut self) -> &mut dyn BufRead;

    /// Release the resource. Close failures on the read side are never
    /// reported: once a reader is done with a source, they change
    /// nothing.
    fn close(&mut self);

    /// The descriptor kind this backend serves.
    fn kind(&self) -> ReadDescriptorKind;
}

/// Reads a regular file at the mapper-translated path.
#[derive(Debug, Default)]
struct FileInputBackend {
    reader: Option<BufReader<File>>,
}

impl InputBackend for FileInputBackend {
    fn open(&mut self, descriptor: &str, _binary: bool) -> DescioResult<()> {
        if self.reader.is_some() {
            defect!("file input opened while already open: {}", descriptor);
        }
        let path = path_mapper().map(descriptor)?;
        let file = File::open(&path).map_err(|e| {
            Box::new(DescioError::new(ErrorKind::FileError {
                path: path.clone(),
                source: e,
            }))
        })?;
        debug!(path = %path.display(), "opened file for reading");
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    fn stream(&mut self) -> &mut dyn BufRead {
        match &mut self.reader {
            Some(reader) => reader,
            None => defect!("file input stream requested but the file is not open"),
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_none() {
            defect!("file input closed but the file is not open");
        }
    }

    fn kind(&self) -> ReadDescriptorKind {
        ReadDescriptorKind::File
    }
}

/// Wraps the process's standard input.
#[derive(Debug, Default)]
struct StandardInputBackend {
    stdin: Option<StdinLock<'static>>,
}

impl InputBackend for StandardInputBackend {
    fn open(&mut self, _descriptor: &str, _binary: bool) -> DescioResult<()> {
        if self.stdin.is_some() {
            defect!("standard input opened while already open");
        }
        // No readiness probe: an exhausted standard input is still valid
        // input.
        self.stdin = Some(io::stdin().lock());
        Ok(())
    }

    fn stream(&mut self) -> &mut dyn BufRead {
        match &mut self.stdin {
            Some(stdin) => stdin,
            None => defect!("standard input stream requested but it is not open"),
        }
    }

    fn close(&mut self) {
        if self.stdin.take().is_none() {
            defect!("standard input closed but it is not open");
        }
    }

    fn kind(&self) -> ReadDescriptorKind {
        ReadDescriptorKind::Standard
    }
}

/// Drains a spawned shell command; the descriptor minus its trailing `|`
/// is the command line.
#[derive(Debug, Default)]
struct PipeInputBackend {
    reader: Option<PipeReader>,
}

impl InputBackend for PipeInputBackend {
    fn open(&mut self, descriptor: &str, _binary: bool) -> DescioResult<()> {
        if self.reader.is_some() {
            defect!("pipe input opened while already open: {}", descriptor);
        }
        let Some(command) = descriptor.strip_suffix('|') else {
            defect!("pipe input descriptor without trailing '|': {}", descriptor);
        };
        match PipeReader::spawn(command) {
            Ok(reader) => {
                self.reader = Some(reader);
                Ok(())
            }
            Err(e) => {
                warn!(command, error = %e, "failed opening pipe for reading");
                Err(Box::new(DescioError::new(ErrorKind::ProcessError {
                    command: command.to_string(),
                    source: e,
                })))
            }
        }
    }

    fn stream(&mut self) -> &mut dyn BufRead {
        match &mut self.reader {
            Some(reader) => reader,
            None => defect!("pipe input stream requested but the pipe is not open"),
        }
    }

    fn close(&mut self) {
        let Some(mut reader) = self.reader.take() else {
            defect!("pipe input closed but the pipe is not open");
        };
        if let Err(error) = reader.finish() {
            warn!(%error, "error closing read pipeline");
        }
    }

    fn kind(&self) -> ReadDescriptorKind {
        ReadDescriptorKind::Pipe
    }
}

/// Split `"path:N"` at the last `:` into the path and the byte offset.
///
/// The classifier guarantees the shape, so a parse failure means the
/// offset does not fit the platform's integer range — a defect, reported
/// distinctly.
fn split_offset_descriptor(descriptor: &str) -> (&str, u64) {
    let Some(pos) = descriptor.rfind(':') else {
        defect!("offset descriptor without ':' separator: {}", descriptor);
    };
    let (path, digits) = (&descriptor[..pos], &descriptor[pos + 1..]);
    match digits.parse::<u64>() {
        Ok(offset) => (path, offset),
        Err(_) => defect!(
            "cannot read byte offset from {}: the value does not fit in 64 bits",
            descriptor
        ),
    }
}

fn seek_failed(path: &str, offset: u64, source: io::Error) -> Box<DescioError> {
    Box::new(
        DescioError::new(ErrorKind::FileError {
            path: PathBuf::from(path),
            source,
        })
        .with_context(|| format!("seeking to byte offset {}", offset)),
    )
}

/// Reads a regular file starting at a byte offset (`"path:N"`).
///
/// Unlike the other backends this one supports being opened again while
/// open: when the new descriptor names the same file in the same mode,
/// the open handle is kept and only the cursor moves. The retained path
/// and mode exist purely for that comparison and are meaningless once
/// the backend closes.
#[derive(Debug, Default)]
struct OffsetFileInputBackend {
    path: String,
    binary: bool,
    reader: Option<BufReader<File>>,
}

impl OffsetFileInputBackend {
    fn open_file(&mut self) -> DescioResult<()> {
        let mapped = path_mapper().map(&self.path)?;
        let file = File::open(&mapped).map_err(|e| {
            Box::new(DescioError::new(ErrorKind::FileError {
                path: mapped.clone(),
                source: e,
            }))
        })?;
        debug!(path = %mapped.display(), "opened file for offset reading");
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    /// Position the cursor at `offset`. A failed seek releases the file.
    fn seek_to(&mut self, offset: u64) -> DescioResult<()> {
        let result = self.try_seek(offset);
        if result.is_err() {
            self.reader = None;
        }
        result
    }

    fn try_seek(&mut self, offset: u64) -> DescioResult<()> {
        let Some(reader) = &mut self.reader else {
            defect!("seek requested but the offset file is not open");
        };
        let current = reader
            .stream_position()
            .map_err(|e| seek_failed(&self.path, offset, e))?;
        if current == offset {
            return Ok(());
        }
        if current < offset && offset - current < SEEK_READ_AHEAD_LIMIT {
            // Close enough that reading the intervening bytes beats a
            // syscall-level seek; common when consecutive records are
            // fetched in order.
            let mut byte = [0u8; 1];
            for _ in current..offset {
                reader
                    .read_exact(&mut byte)
                    .map_err(|e| seek_failed(&self.path, offset, e))?;
            }
            return Ok(());
        }
        reader
            .seek(SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(|e| seek_failed(&self.path, offset, e))
    }
}

impl InputBackend for OffsetFileInputBackend {
    fn open(&mut self, descriptor: &str, binary: bool) -> DescioResult<()> {
        let (path, offset) = split_offset_descriptor(descriptor);
        if self.reader.is_some() {
            if path == self.path && binary == self.binary {
                return self.seek_to(offset);
            }
            // Different file or mode: start over with a fresh handle.
            self.reader = None;
        }
        self.path = path.to_string();
        self.binary = binary;
        self.open_file()?;
        self.seek_to(offset)
    }

    fn stream(&mut self) -> &mut dyn BufRead {
        match &mut self.reader {
            Some(reader) => reader,
            None => defect!("offset file stream requested but the file is not open"),
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_none() {
            defect!("offset file closed but the file is not open");
        }
        self.path.clear();
    }

    fn kind(&self) -> ReadDescriptorKind {
        ReadDescriptorKind::OffsetFile
    }
}

/// Read-side facade: owns at most one backend, selected by classifying
/// the descriptor at open time, and presents one stream handle.
#[derive(Debug, Default)]
pub struct Input {
    backend: Option<Box<dyn InputBackend>>,
    descriptor: String,
    hook: HeaderHookHandle,
}

impl Input {
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

    /// Open the resource named by `descriptor` in binary mode, without
    /// inspecting the payload header.
    ///
    /// Calling this while the facade is already open is a defect, with
    /// one exception: an offset-file descriptor opened over an owned
    /// offset-file backend reuses the backend in place (seeking instead
    /// of reopening when the underlying file and mode match).
    ///
    /// # Errors
    /// Invalid descriptors and backend open failures are reported as
    /// errors with a warning logged; the facade is left closed.
    #[instrument(skip(self))]
    pub fn open(&mut self, descriptor: &str) -> DescioResult<()> {
        self.open_internal(descriptor, true, false).map(|_| ())
    }

    /// Like [`open`](Self::open), but also reads the payload header
    /// through the hook and reports whether the payload is binary.
    #[instrument(skip(self))]
    pub fn open_with_header(&mut self, descriptor: &str) -> DescioResult<bool> {
        self.open_internal(descriptor, true, true)
            .map(|binary| binary.unwrap_or(false))
    }

    /// Open in text mode; no header interaction.
    #[instrument(skip(self))]
    pub fn open_text(&mut self, descriptor: &str) -> DescioResult<()> {
        self.open_internal(descriptor, false, false).map(|_| ())
    }

    fn open_internal(
        &mut self,
        descriptor: &str,
        binary: bool,
        read_header: bool,
    ) -> DescioResult<Option<bool>> {
        let kind = classify_read_descriptor(descriptor);
        if let Some(current) = self.backend.as_mut() {
            if kind == ReadDescriptorKind::OffsetFile
                && current.kind() == ReadDescriptorKind::OffsetFile
            {
                if let Err(error) = current.open(descriptor, binary) {
                    self.backend = None;
                    return Err(error);
                }
                self.descriptor = descriptor.to_string();
                return self.finish_open(read_header);
            }
            defect!(
                "Input::open() called while {} is still open; close it first",
                printable_read_descriptor(&self.descriptor)
            );
        }
        let mut backend: Box<dyn InputBackend> = match kind {
            ReadDescriptorKind::File => Box::new(FileInputBackend::default()),
            ReadDescriptorKind::Standard => Box::new(StandardInputBackend::default()),
            ReadDescriptorKind::Pipe => Box::new(PipeInputBackend::default()),
            ReadDescriptorKind::OffsetFile => Box::new(OffsetFileInputBackend::default()),
            ReadDescriptorKind::Invalid => {
                let printable = printable_read_descriptor(descriptor);
                warn!("invalid read descriptor format: {}", printable);
                return Err(Box::new(DescioError::new(ErrorKind::InvalidDescriptor {
                    descriptor: printable,
                })));
            }
        };
        backend.open(descriptor, binary)?;
        self.descriptor = descriptor.to_string();
        self.backend = Some(backend);
        self.finish_open(read_header)
    }

    fn finish_open(&mut self, read_header: bool) -> DescioResult<Option<bool>> {
        if !read_header {
            return Ok(None);
        }
        let Some(backend) = self.backend.as_mut() else {
            defect!("header read requested but no input is open");
        };
        match self.hook.read_header(backend.stream()) {
            Ok(contents_binary) => Ok(Some(contents_binary)),
            Err(error) => {
                let error = Box::new(DescioError::message(format!(
                    "error reading stream header from {}: {}",
                    printable_read_descriptor(&self.descriptor),
                    error
                )));
                self.backend = None;
                Err(error)
            }
        }
    }

    /// True when a backend is owned and its stream is available.
    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// The descriptor this facade was last opened with.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The stream payload bytes are read from.
    /// Calling this before a successful `open` is a defect.
    pub fn stream(&mut self) -> &mut dyn BufRead {
        match &mut self.backend {
            Some(backend) => backend.stream(),
            None => defect!("Input::stream() called but no input is open"),
        }
    }

    /// Release the backend. Close failures on the read side are never
    /// escalated; at most a warning is logged.
    /// Calling this before a successful `open` is a defect.
    #[instrument(skip(self))]
    pub fn close(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            defect!("Input::close() called but no input is open");
        };
        backend.close();
    }
}

impl Drop for Input {
    fn drop(&mut self) {
        // Unlike the write side, a close failure on a source the caller
        // is done with changes nothing; close silently.
        if let Some(mut backend) = self.backend.take() {
            backend.close();
        }
    }
}
