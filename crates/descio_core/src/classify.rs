//! Descriptor classification.
//!
//! An extended descriptor is a single string naming an I/O resource:
//!
//! | pattern | writing | reading |
//! |---|---|---|
//! | `""` or `"-"` | standard output | standard input |
//! | `"\|cmd"` | pipe into `cmd` | invalid |
//! | `"cmd\|"` | invalid | pipe from `cmd` |
//! | `"path:N"` (digits after the last `:`) | invalid | file at byte offset N |
//! | anything else | file | file |
//!
//! Descriptors with leading/trailing whitespace, with the reserved `t,`
//! or `b,` table prefix, or with a pipe symbol in a position that matches
//! no pipe rule are invalid. Classification is pure and reparses the
//! string on every call; nothing is cached.

use tracing::warn;

/// Classification of a descriptor for the write direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDescriptorKind {
    /// The process's standard output (`""` or `"-"`).
    Standard,
    /// A shell pipeline we feed (`"|cmd"`).
    Pipe,
    /// A regular file.
    File,
    /// Not usable for writing.
    Invalid,
}

/// Classification of a descriptor for the read direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDescriptorKind {
    /// The process's standard input (`""` or `"-"`).
    Standard,
    /// A shell pipeline we drain (`"cmd|"`).
    Pipe,
    /// A regular file.
    File,
    /// A byte offset into a regular file (`"path:12345"`).
    OffsetFile,
    /// Not usable for reading.
    Invalid,
}

/// Classify a descriptor for the write direction.
pub fn classify_write_descriptor(descriptor: &str) -> WriteDescriptorKind {
    if descriptor.is_empty() || descriptor == "-" {
        return WriteDescriptorKind::Standard;
    }
    let bytes = descriptor.as_bytes();
    if bytes[0] == b'|' {
        return WriteDescriptorKind::Pipe;
    }
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    if first.is_ascii_whitespace() || last.is_ascii_whitespace() {
        // Leading or trailing space: cannot be interpreted safely.
        return WriteDescriptorKind::Invalid;
    }
    if (first == b't' || first == b'b') && bytes.get(1) == Some(&b',') {
        // Reserved table-descriptor prefix supplied where a plain write
        // descriptor was needed; refusing it here beats opening a file
        // that is almost certainly a caller mistake.
        return WriteDescriptorKind::Invalid;
    }
    if last == b'|' {
        // A read-side pipe marker is not valid in this direction.
        return WriteDescriptorKind::Invalid;
    }
    if last.is_ascii_digit() {
        // "path:12345" is an offset into a file, which cannot be written
        // to; accepting it as a literal filename would also make the
        // reading side misinterpret it later.
        let mut i = bytes.len() - 1;
        while i > 0 && bytes[i].is_ascii_digit() {
            i -= 1;
        }
        if bytes[i] == b':' {
            return WriteDescriptorKind::Invalid;
        }
        return WriteDescriptorKind::File;
    }
    if descriptor.contains('|') {
        warn!(
            "pipe symbol in the wrong place in write descriptor (pipe without | at the beginning?): {}",
            descriptor
        );
        return WriteDescriptorKind::Invalid;
    }
    WriteDescriptorKind::File
}

/// Classify a descriptor for the read direction.
pub fn classify_read_descriptor(descriptor: &str) -> ReadDescriptorKind {
    if descriptor.is_empty() || descriptor == "-" {
        return ReadDescriptorKind::Standard;
    }
    let bytes = descriptor.as_bytes();
    if bytes[0] == b'|' {
        // A write-side pipe marker is not valid in this direction.
        return ReadDescriptorKind::Invalid;
    }
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    if first.is_ascii_whitespace() || last.is_ascii_whitespace() {
        return ReadDescriptorKind::Invalid;
    }
    if (first == b't' || first == b'b') && bytes.get(1) == Some(&b',') {
        return ReadDescriptorKind::Invalid;
    }
    if last == b'|' {
        return ReadDescriptorKind::Pipe;
    }
    if last.is_ascii_digit() {
        let mut i = bytes.len() - 1;
        while i > 0 && bytes[i].is_ascii_digit() {
            i -= 1;
        }
        if bytes[i] == b':' {
            return ReadDescriptorKind::OffsetFile;
        }
        return ReadDescriptorKind::File;
    }
    if descriptor.contains('|') {
        warn!(
            "pipe symbol in the wrong place in read descriptor (pipe without | at the end?): {}",
            descriptor
        );
        return ReadDescriptorKind::Invalid;
    }
    ReadDescriptorKind::File
}

/// Render a read descriptor for diagnostics.
pub fn printable_read_descriptor(descriptor: &str) -> String {
    if descriptor.is_empty() || descriptor == "-" {
        "standard input".to_string()
    } else {
        escape(descriptor)
    }
}

/// Render a write descriptor for diagnostics.
pub fn printable_write_descriptor(descriptor: &str) -> String {
    if descriptor.is_empty() || descriptor == "-" {
        "standard output".to_string()
    } else {
        escape(descriptor)
    }
}

/// Quote a string for unambiguous display in log messages.
/// Strings without whitespace or quote characters render as-is.
pub fn escape(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .bytes()
            .all(|b| !b.is_ascii_whitespace() && b != b'"' && b != b'\'');
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn standard_descriptors() {
        assert_eq!(classify_write_descriptor(""), WriteDescriptorKind::Standard);
        assert_eq!(classify_write_descriptor("-"), WriteDescriptorKind::Standard);
        assert_eq!(classify_read_descriptor(""), ReadDescriptorKind::Standard);
        assert_eq!(classify_read_descriptor("-"), ReadDescriptorKind::Standard);
    }

    #[test]
    fn pipe_markers_are_direction_specific() {
        assert_eq!(classify_write_descriptor("|sort"), WriteDescriptorKind::Pipe);
        assert_eq!(classify_read_descriptor("|sort"), ReadDescriptorKind::Invalid);
        assert_eq!(classify_read_descriptor("sort|"), ReadDescriptorKind::Pipe);
        assert_eq!(classify_write_descriptor("sort|"), WriteDescriptorKind::Invalid);
    }

    #[test]
    fn offset_form_reads_only() {
        assert_eq!(
            classify_read_descriptor("/data/feats.ark:4096"),
            ReadDescriptorKind::OffsetFile
        );
        assert_eq!(
            classify_write_descriptor("/data/feats.ark:4096"),
            WriteDescriptorKind::Invalid
        );
    }

    #[test]
    fn trailing_digits_without_colon_are_a_filename() {
        assert_eq!(classify_read_descriptor("file123"), ReadDescriptorKind::File);
        assert_eq!(classify_write_descriptor("file123"), WriteDescriptorKind::File);
        // All digits: no colon anywhere, still a filename.
        assert_eq!(classify_read_descriptor("12345"), ReadDescriptorKind::File);
    }

    #[test]
    fn offset_split_uses_last_colon() {
        assert_eq!(
            classify_read_descriptor("archive:0:99"),
            ReadDescriptorKind::OffsetFile
        );
        // Degenerate but well-formed: empty path before the colon.
        assert_eq!(classify_read_descriptor(":123"), ReadDescriptorKind::OffsetFile);
    }

    #[test]
    fn surrounding_whitespace_is_invalid() {
        assert_eq!(classify_write_descriptor(" /tmp/x"), WriteDescriptorKind::Invalid);
        assert_eq!(classify_read_descriptor(" /tmp/x"), ReadDescriptorKind::Invalid);
        assert_eq!(classify_write_descriptor("/tmp/x "), WriteDescriptorKind::Invalid);
        assert_eq!(classify_read_descriptor("/tmp/x\t"), ReadDescriptorKind::Invalid);
    }

    #[test]
    fn reserved_table_prefix_is_invalid() {
        assert_eq!(classify_write_descriptor("t,1:2"), WriteDescriptorKind::Invalid);
        assert_eq!(classify_read_descriptor("b,foo"), ReadDescriptorKind::Invalid);
        // Only the two-character prefix is reserved.
        assert_eq!(classify_read_descriptor("table"), ReadDescriptorKind::File);
        assert_eq!(classify_write_descriptor("bar"), WriteDescriptorKind::File);
    }

    #[test]
    fn embedded_pipe_is_invalid() {
        assert_eq!(classify_write_descriptor("foo|bar"), WriteDescriptorKind::Invalid);
        assert_eq!(classify_read_descriptor("foo|bar"), ReadDescriptorKind::Invalid);
    }

    #[test]
    fn plain_filenames() {
        assert_eq!(classify_write_descriptor("out.bin"), WriteDescriptorKind::File);
        assert_eq!(classify_read_descriptor("/a/b/c.txt"), ReadDescriptorKind::File);
    }

    #[test]
    fn classification_is_deterministic() {
        for descriptor in ["", "-", "|sort", "sort|", "x:12", " y", "t,z", "foo|bar", "plain"] {
            assert_eq!(
                classify_read_descriptor(descriptor),
                classify_read_descriptor(descriptor)
            );
            assert_eq!(
                classify_write_descriptor(descriptor),
                classify_write_descriptor(descriptor)
            );
        }
    }

    #[test]
    fn printable_standard_streams() {
        expect![["standard input"]].assert_eq(&printable_read_descriptor("-"));
        expect![["standard input"]].assert_eq(&printable_read_descriptor(""));
        expect![["standard output"]].assert_eq(&printable_write_descriptor("-"));
    }

    #[test]
    fn printable_escapes_awkward_literals() {
        expect![["/data/feats.ark:4096"]].assert_eq(&printable_read_descriptor("/data/feats.ark:4096"));
        expect![["'my file'"]].assert_eq(&printable_write_descriptor("my file"));
        expect![[r#"'it'\''s'"#]].assert_eq(&printable_read_descriptor("it's"));
    }
}
