use serde::{Deserialize, Serialize};

use crate::core::SequenceSpan;

/// Header fields that can be located in a canonicalized header buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderField {
    From,
    Subject,
    DkimSignature,
}

impl HeaderField {
    /// Field name without the trailing colon, first letter lowercase.
    fn name(&self) -> &'static [u8] {
        match self {
            Self::From => b"from",
            Self::Subject => b"subject",
            Self::DkimSignature => b"dkim-signature",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::From => "from",
            Self::Subject => "subject",
            Self::DkimSignature => "dkim_header_sequence",
        }
    }

    fn name_matches(&self, candidate: &[u8]) -> bool {
        let name = self.name();
        if candidate.len() < name.len() {
            return false;
        }
        let candidate = &candidate[.. name.len()];
        match self {
            // only the first letter may be capitalized
            Self::From | Self::Subject => {
                candidate[0].to_ascii_lowercase() == name[0] && candidate[1 ..] == name[1 ..]
            }
            Self::DkimSignature => candidate.eq_ignore_ascii_case(name),
        }
    }
}

/// End of the line that starts at `from`.
///
/// Returns `(content_end, line_end)` where `line_end` is one past the `\n`.
/// A `\r` not followed by `\n` ends the content without a valid line break.
fn line_break(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let offset = buf[from ..].iter().position(|b| *b == b'\r' || *b == b'\n')?;
    let content_end = from + offset;
    match buf[content_end] {
        b'\n' => Some((content_end, content_end + 1)),
        _ if buf.get(content_end + 1) == Some(&b'\n') => Some((content_end, content_end + 2)),
        _ => None,
    }
}

/// `From` accepts `Name <addr>` lines and bare lines containing `@`.
fn from_line_matches(content: &[u8]) -> bool {
    let angle = match content.split_last() {
        Some((b'>', rest)) => rest.contains(&b'<'),
        _ => false,
    };
    let at_sign = content
        .iter()
        .position(|b| *b == b'@')
        .is_some_and(|pos| pos + 1 < content.len());
    angle || at_sign
}

/// `DKIM-Signature` must start a line; its span excludes the line break and
/// may run to the end of the buffer, where canonicalization leaves it.
fn locate_signature_line(header: &[u8]) -> Option<SequenceSpan> {
    let field = HeaderField::DkimSignature;
    let name_len = field.name().len();
    for start in 0 .. header.len() {
        let at_line_start = start == 0 || header[start - 1] == b'\n';
        if !at_line_start || !field.name_matches(&header[start ..]) {
            continue;
        }
        if header.get(start + name_len) != Some(&b':') {
            continue;
        }
        let content_start = start + name_len + 1;
        let content_end = header[content_start ..]
            .iter()
            .position(|b| *b == b'\r' || *b == b'\n')
            .map_or(header.len(), |pos| content_start + pos);
        let has_value = header[content_start .. content_end]
            .iter()
            .any(|b| !b.is_ascii_whitespace());
        if has_value {
            return Some(SequenceSpan {
                index: start,
                length: content_end - start,
            });
        }
    }
    None
}

/// Locates the first occurrence of `field` in `header`.
///
/// The span runs from the field name through the terminating line break.
/// The field name is not required to start a line.
pub fn locate_header_field(header: &[u8], field: HeaderField) -> Option<SequenceSpan> {
    if field == HeaderField::DkimSignature {
        return locate_signature_line(header);
    }
    let name_len = field.name().len();
    for start in 0 .. header.len() {
        if !field.name_matches(&header[start ..]) {
            continue;
        }
        let value_start = start + name_len;
        if header.get(value_start) != Some(&b':') {
            continue;
        }
        let Some((content_end, line_end)) = line_break(header, value_start + 1) else {
            continue;
        };
        let content = &header[value_start + 1 .. content_end];
        if field == HeaderField::From && !from_line_matches(content) {
            continue;
        }
        return Some(SequenceSpan {
            index: start,
            length: line_end - start,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[u8] = b"to:alice@example.com\r\n\
subject:Linode.com: Payment Receipt [12345]\r\n\
from:Linode <billing@linode.com>\r\n\
date:Sun, 1 Sep 2024 10:00:00 +0000\r\n\
dkim-signature:v=1; a=rsa-sha256; d=linode.com; bh=abc=; b=";

    #[test]
    fn test_locate_subject() {
        let span = locate_header_field(HEADER, HeaderField::Subject).unwrap();
        assert_eq!(
            span.slice(HEADER),
            b"subject:Linode.com: Payment Receipt [12345]\r\n"
        );
    }

    #[test]
    fn test_locate_from_with_display_name() {
        let span = locate_header_field(HEADER, HeaderField::From).unwrap();
        assert_eq!(span.slice(HEADER), b"from:Linode <billing@linode.com>\r\n");
    }

    #[test]
    fn test_locate_from_bare_address() {
        let header = b"From: billing@linode.com\n";
        let span = locate_header_field(header, HeaderField::From).unwrap();
        assert_eq!(span, SequenceSpan { index: 0, length: header.len() });
    }

    #[test]
    fn test_from_requires_address_shape() {
        assert!(locate_header_field(b"from:nobody\r\nsubject:x\r\n", HeaderField::From).is_none());
        // `@` must be followed by at least one character
        assert!(locate_header_field(b"from:nobody@\r\n", HeaderField::From).is_none());
    }

    #[test]
    fn test_from_skips_non_matching_occurrence() {
        let header = b"x-from:nobody\r\nFrom: a@b.c\r\n";
        let span = locate_header_field(header, HeaderField::From).unwrap();
        assert_eq!(span.slice(header), b"From: a@b.c\r\n");
    }

    #[test]
    fn test_field_requires_line_break() {
        assert!(locate_header_field(b"subject:no newline", HeaderField::Subject).is_none());
        assert!(locate_header_field(b"subject:bare\rcr\n", HeaderField::Subject).is_none());
    }

    #[test]
    fn test_only_first_letter_case_insensitive() {
        assert!(locate_header_field(b"SUBJECT:x\r\n", HeaderField::Subject).is_none());
        assert!(locate_header_field(b"Subject:x\r\n", HeaderField::Subject).is_some());
    }

    #[test]
    fn test_dkim_signature_ignores_case() {
        let header = b"DKIM-Signature: v=1; bh=x;\r\n";
        let span = locate_header_field(header, HeaderField::DkimSignature).unwrap();
        assert_eq!(span.index, 0);
        assert_eq!(span.length, header.len() - 2);
    }

    #[test]
    fn test_dkim_signature_at_buffer_end() {
        let span = locate_header_field(HEADER, HeaderField::DkimSignature).unwrap();
        assert_eq!(
            span.slice(HEADER),
            b"dkim-signature:v=1; a=rsa-sha256; d=linode.com; bh=abc=; b="
        );
    }

    #[test]
    fn test_dkim_signature_must_start_line() {
        let header = b"x-dkim-signature:v=1\r\n";
        assert!(locate_header_field(header, HeaderField::DkimSignature).is_none());
    }
}
