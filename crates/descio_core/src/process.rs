//! Process-and-pipe adapters.
//!
//! A pipe descriptor names a shell command; these adapters bind the
//! spawned child to a standard stream interface and keep the whole
//! teardown sequence (flush, close the pipe, wait, collect the exit
//! status) in one place so it runs deterministically on every path.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

use tracing::{debug, warn};

/// Builds the platform shell invocation for a pipeline command line.
fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(command_line);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        command
    }
}

/// A spawned child process whose standard input is exposed as a
/// [`Write`] stream.
#[derive(Debug)]
pub struct PipeWriter {
    command: String,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
}

impl PipeWriter {
    /// Spawn `command_line` through the shell with its standard input
    /// piped. Blocks until the process is launched, not until it
    /// finishes.
    pub fn spawn(command_line: &str) -> io::Result<Self> {
        let mut child = shell_command(command_line).stdin(Stdio::piped()).spawn()?;
        let stdin = child.stdin.take().map(BufWriter::new);
        debug!(command = command_line, "spawned pipeline for writing");
        Ok(Self {
            command: command_line.to_string(),
            child,
            stdin,
        })
    }

    /// Flush and close the pipe (end-of-input for the child), wait for
    /// it to exit, and return the exit status. A nonzero status is an
    /// operational fact, logged as a warning; only flush and wait
    /// failures are errors. The child is reaped even when the flush
    /// fails.
    pub fn finish(&mut self) -> io::Result<ExitStatus> {
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };
        let status = self.child.wait()?;
        if !status.success() {
            warn!(command = %self.command, %status, "pipeline command had nonzero exit status");
        }
        flushed?;
        Ok(status)
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stdin {
            Some(stdin) => stdin.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe already closed",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stdin {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            if let Err(error) = self.finish() {
                warn!(command = %self.command, %error, "error tearing down write pipeline");
            }
        }
    }
}

/// A spawned child process whose standard output is exposed as a
/// [`BufRead`] stream.
#[derive(Debug)]
pub struct PipeReader {
    command: String,
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
}

impl PipeReader {
    /// Spawn `command_line` through the shell with its standard output
    /// piped. Blocks until the process is launched, not until it
    /// finishes.
    pub fn spawn(command_line: &str) -> io::Result<Self> {
        let mut child = shell_command(command_line).stdout(Stdio::piped()).spawn()?;
        let stdout = child.stdout.take().map(BufReader::new);
        debug!(command = command_line, "spawned pipeline for reading");
        let mut reader = Self {
            command: command_line.to_string(),
            child,
            stdout,
        };
        reader.warn_if_already_empty();
        Ok(reader)
    }

    // An empty result can be legitimate, so it only rates a warning, and
    // only the already-exited case can be checked without blocking on a
    // still-running child.
    fn warn_if_already_empty(&mut self) {
        let Ok(Some(_)) = self.child.try_wait() else {
            return;
        };
        let Some(stdout) = &mut self.stdout else {
            return;
        };
        if matches!(stdout.fill_buf(), Ok(buf) if buf.is_empty()) {
            warn!(command = %self.command, "pipeline opened for reading produced no output");
        }
    }

    /// Close the pipe, wait for the child to exit, and return the exit
    /// status. A nonzero status is logged as a warning, not an error.
    pub fn finish(&mut self) -> io::Result<ExitStatus> {
        drop(self.stdout.take());
        let status = self.child.wait()?;
        if !status.success() {
            warn!(command = %self.command, %status, "pipeline command had nonzero exit status");
        }
        Ok(status)
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stdout {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl BufRead for PipeReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match &mut self.stdout {
            Some(stdout) => stdout.fill_buf(),
            None => Ok(&[]),
        }
    }

    fn consume(&mut self, amt: usize) {
        if let Some(stdout) = &mut self.stdout {
            stdout.consume(amt);
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        if self.stdout.is_some() {
            if let Err(error) = self.finish() {
                warn!(command = %self.command, %error, "error tearing down read pipeline");
            }
        }
    }
}
