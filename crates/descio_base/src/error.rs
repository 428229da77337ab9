use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing_error::{SpanTrace, SpanTraceStatus};

/// Error variants that can occur in descio operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// File system operation failed
    FileError { path: PathBuf, source: io::Error },

    /// Spawning or reaping a pipeline command failed
    ProcessError { command: String, source: io::Error },

    /// Descriptor string could not be classified for the requested direction
    InvalidDescriptor { descriptor: String },

    /// Catch-all for other errors with a message
    Message { message: String },
}

/// Error type wrapping an [`ErrorKind`] with optional context, an optional
/// cause chain, and the span trace captured at construction time.
pub struct DescioError {
    kind: ErrorKind,
    context: Vec<String>,
    cause: Option<Box<DescioError>>,
    span_trace: SpanTrace,
}

impl DescioError {
    /// Creates a new error from an ErrorKind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            cause: None,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a new `Message` error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    /// Attaches context to an error.
    /// Context is displayed before the error message.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    /// Useful to avoid expensive string construction for successful paths.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Records another error as the cause of this one.
    pub fn caused_by(mut self, cause: DescioError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    /// Allows pattern matching on specific error variants.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the attached context strings, in attachment order.
    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    /// Returns the innermost error in the chain.
    /// Traverses the error source chain to find the root cause.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn fmt_kind(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::FileError { path, source } => {
                write!(f, "File error at {}: {}", path.display(), source)
            }
            ErrorKind::ProcessError { command, source } => {
                write!(f, "Failed running command '{}': {}", command, source)
            }
            ErrorKind::InvalidDescriptor { descriptor } => {
                write!(f, "Invalid descriptor: {}", descriptor)
            }
            ErrorKind::Message { message } => {
                write!(f, "{}", message)
            }
        }
    }

    /// Renders the message line plus a tree of contexts and causes.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        self.fmt_kind(f)?;
        writeln!(f)?;
        let branch_count = self.context.len() + usize::from(self.cause.is_some());
        for (i, ctx) in self.context.iter().enumerate() {
            let glyph = if i + 1 == branch_count { "└─" } else { "├─" };
            writeln!(f, "{}{} {}", indent, glyph, ctx)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, "{}└─ cause: ", indent)?;
            cause.fmt_tree(f, &format!("{}   ", indent))?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for DescioError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl StdError for DescioError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        if let Some(cause) = &self.cause {
            return Some(cause.as_ref());
        }
        match &self.kind {
            ErrorKind::FileError { source, .. } => Some(source),
            ErrorKind::ProcessError { source, .. } => Some(source),
            ErrorKind::InvalidDescriptor { .. } => None,
            ErrorKind::Message { .. } => None,
        }
    }
}

impl fmt::Display for DescioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            write!(f, "{}: ", ctx)?;
        }
        self.fmt_kind(f)
    }
}

impl fmt::Debug for DescioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, "")?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            writeln!(f, "Trace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/// Standard result type for descio operations.
pub type DescioResult<T> = std::result::Result<T, Box<DescioError>>;

/// Extension trait for attaching context to Results.
/// Provides ergonomic error context attachment during error propagation.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    /// Eager evaluation: context is evaluated immediately.
    fn context(self, context: impl Into<String>) -> DescioResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    /// Prefer this to avoid expensive string formatting in the success path.
    fn with_context<F>(self, f: F) -> DescioResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for DescioResult<T> {
    fn context(self, context: impl Into<String>) -> DescioResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> DescioResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

/// Builds a boxed `Message` error from format arguments.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::error::DescioError::message(format!($($arg)*)))
    };
}

/// Reports a programmer defect: logs at error level and panics.
///
/// Reserved for broken invariants that no caller can recover from at
/// runtime (double open, stream access before open, a malformed offset
/// split that classification should have rejected).
#[macro_export]
macro_rules! defect {
    ($($arg:tt)*) => {{
        $crate::tracing::error!($($arg)*);
        panic!($($arg)*)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_from_file_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let path = PathBuf::from("test.txt");
        let kind = ErrorKind::FileError {
            path: path.clone(),
            source: io_err,
        };
        let error = DescioError::new(kind);

        match error.kind() {
            ErrorKind::FileError { path: p, .. } => {
                assert_eq!(p, &path);
            }
            _ => panic!("Expected FileError variant"),
        }
    }

    #[test]
    fn error_from_kind_impl() {
        let kind = ErrorKind::Message {
            message: "test".to_string(),
        };
        let error: DescioError = kind.into();
        match error.kind() {
            ErrorKind::Message { message } => {
                assert_eq!(message, "test");
            }
            _ => panic!("Expected Message variant"),
        }
    }

    #[test]
    fn error_source_process_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let kind = ErrorKind::ProcessError {
            command: "sort".to_string(),
            source: io_err,
        };
        let error = DescioError::new(kind);
        assert!(error.source().is_some());
    }

    #[test]
    fn error_source_invalid_descriptor() {
        let kind = ErrorKind::InvalidDescriptor {
            descriptor: "foo|bar".to_string(),
        };
        let error = DescioError::new(kind);
        assert!(error.source().is_none());
    }

    #[test]
    fn root_cause_traverses_io_source() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let kind = ErrorKind::FileError {
            path: PathBuf::from("test.txt"),
            source: io_err,
        };
        let error = DescioError::new(kind);
        assert_eq!(error.root_cause().to_string(), "not found");
    }

    #[test]
    fn err_macro_builds_boxed_message() {
        let error: Box<DescioError> = err!("offset {} out of range", 42);
        assert_eq!(error.to_string(), "offset 42 out of range");
    }

    #[test]
    #[should_panic(expected = "invariant broken")]
    fn defect_macro_panics() {
        defect!("invariant broken: {}", "double open");
    }
}
