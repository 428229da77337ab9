//! The header hook: the seam between this layer and the payload format.
//!
//! The I/O layer does not define what marks a payload as binary; it only
//! promises to invoke the hook at the very start of a freshly opened
//! stream and to treat hook failure as open failure. [`BinaryMarker`] is
//! the toolkit's default implementation.

use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

/// Reads or writes a small format marker at the start of a stream.
pub trait HeaderHook: fmt::Debug + Send + Sync + 'static {
    /// Write the marker appropriate for `binary` at the start of an
    /// output stream.
    fn write_header(&self, stream: &mut dyn Write, binary: bool) -> io::Result<()>;

    /// Inspect the start of an input stream and report whether the
    /// payload is binary. Consumes exactly the marker if one is present,
    /// and nothing otherwise.
    fn read_header(&self, stream: &mut dyn BufRead) -> io::Result<bool>;
}

/// Handle to a header hook, enabling shared ownership across facades.
#[derive(Debug, Clone)]
pub struct HeaderHookHandle(Arc<dyn HeaderHook>);

impl HeaderHookHandle {
    /// Create a new HeaderHookHandle from a HeaderHook implementation.
    pub fn new(hook: impl HeaderHook + 'static) -> Self {
        Self(Arc::new(hook))
    }
}

impl Default for HeaderHookHandle {
    fn default() -> Self {
        Self::new(BinaryMarker)
    }
}

impl std::ops::Deref for HeaderHookHandle {
    type Target = dyn HeaderHook;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

/// Default hook: binary payloads begin with the two bytes `\0B`, text
/// payloads carry no marker at all.
#[derive(Debug, Clone, Copy)]
pub struct BinaryMarker;

const MARKER: [u8; 2] = [0, b'B'];

impl HeaderHook for BinaryMarker {
    fn write_header(&self, stream: &mut dyn Write, binary: bool) -> io::Result<()> {
        if binary {
            stream.write_all(&MARKER)?;
        }
        Ok(())
    }

    fn read_header(&self, stream: &mut dyn BufRead) -> io::Result<bool> {
        let buf = stream.fill_buf()?;
        if buf.first() != Some(&MARKER[0]) {
            // Text payload, or an empty stream (which reads as text).
            // Nothing is consumed.
            return Ok(false);
        }
        if buf.len() >= 2 {
            if buf[1] != MARKER[1] {
                return Err(malformed_marker(buf[1]));
            }
            stream.consume(2);
            return Ok(true);
        }
        // The marker straddles a buffer boundary: take the NUL, then
        // demand the second byte.
        stream.consume(1);
        let mut second = [0u8; 1];
        stream.read_exact(&mut second)?;
        if second[0] != MARKER[1] {
            return Err(malformed_marker(second[0]));
        }
        Ok(true)
    }
}

fn malformed_marker(found: u8) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!(
            "stream starts with NUL but the marker byte is {:#04x}, not 'B'",
            found
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    #[test]
    fn writes_marker_in_binary_mode_only() {
        let mut binary = Vec::new();
        BinaryMarker.write_header(&mut binary, true).unwrap();
        assert_eq!(binary, b"\0B");

        let mut text = Vec::new();
        BinaryMarker.write_header(&mut text, false).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn reads_binary_marker_and_consumes_it() {
        let mut stream = Cursor::new(b"\0Bpayload".to_vec());
        assert!(BinaryMarker.read_header(&mut stream).unwrap());
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"payload");
    }

    #[test]
    fn text_stream_is_left_untouched() {
        let mut stream = Cursor::new(b"plain text".to_vec());
        assert!(!BinaryMarker.read_header(&mut stream).unwrap());
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"plain text");
    }

    #[test]
    fn empty_stream_reads_as_text() {
        let mut stream = Cursor::new(Vec::new());
        assert!(!BinaryMarker.read_header(&mut stream).unwrap());
    }

    #[test]
    fn malformed_marker_is_an_error() {
        let mut stream = Cursor::new(b"\0Xdata".to_vec());
        assert!(BinaryMarker.read_header(&mut stream).is_err());
    }

    #[test]
    fn marker_split_across_buffer_fills() {
        // A one-byte buffer forces the NUL and the 'B' into separate
        // fills, exercising the straddling path.
        let mut stream = BufReader::with_capacity(1, Cursor::new(b"\0Bpayload".to_vec()));
        assert!(BinaryMarker.read_header(&mut stream).unwrap());
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"payload");
    }

    #[test]
    fn write_then_read_round_trip() {
        let mut bytes = Vec::new();
        BinaryMarker.write_header(&mut bytes, true).unwrap();
        bytes.extend_from_slice(b"body");
        let mut stream = Cursor::new(bytes);
        assert!(BinaryMarker.read_header(&mut stream).unwrap());
    }
}
