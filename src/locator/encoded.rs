use crate::core::SequenceSpan;

/// Quoted-printable soft line break.
pub const SOFT_BREAK: &[u8] = b"=\r\n";

fn is_soft_break(encoded: &[u8], pos: usize) -> bool {
    encoded.get(pos .. pos + SOFT_BREAK.len()) == Some(SOFT_BREAK)
}

/// Finds `pattern` in `encoded` as if every `=\r\n` were absent.
///
/// Returns the span in the encoded buffer from the first to the last
/// matched byte, including any soft breaks inside the match.
pub fn locate_encoded(encoded: &[u8], pattern: &[u8], start: usize) -> Option<SequenceSpan> {
    if pattern.is_empty() {
        return None;
    }
    let mut pos = start;
    let mut match_start = 0;
    let mut matched = 0;

    while pos < encoded.len() {
        if is_soft_break(encoded, pos) {
            pos += SOFT_BREAK.len();
            continue;
        }

        if encoded[pos] == pattern[matched] {
            if matched == 0 {
                match_start = pos;
            }
            matched += 1;
            if matched == pattern.len() {
                return Some(SequenceSpan {
                    index: match_start,
                    length: pos + 1 - match_start,
                });
            }
        } else if matched > 0 {
            // retry from the byte after this candidate so overlapping
            // candidates are not skipped
            pos = match_start + 1;
            matched = 0;
            continue;
        }

        pos += 1;
    }

    None
}

/// Start offset of `pattern` in `encoded`, ignoring soft line breaks.
pub fn find_encoded(encoded: &[u8], pattern: &[u8], start: usize) -> Option<usize> {
    locate_encoded(encoded, pattern, start).map(|span| span.index)
}

/// Removes every soft line break.
pub fn strip_soft_breaks(encoded: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut pos = 0;
    while pos < encoded.len() {
        if encoded[pos ..].starts_with(SOFT_BREAK) {
            pos += SOFT_BREAK.len();
        } else {
            out.push(encoded[pos]);
            pos += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_match_across_soft_break() {
        let body = b"<td>Tot=\r\nal: 171.785 USD</td>";
        let span = locate_encoded(body, b"Total:", 0).unwrap();
        assert_eq!(span.index, 4);
        assert_eq!(span.slice(body), b"Tot=\r\nal:");
        assert_eq!(strip_soft_breaks(span.slice(body)), b"Total:");
    }

    #[test]
    fn test_overlapping_candidate_is_found() {
        // a naive scanner resumes after "aab" and misses the match at 1
        let span = locate_encoded(b"aaab", b"aab", 0).unwrap();
        assert_eq!(span, SequenceSpan { index: 1, length: 3 });
    }

    #[test]
    fn test_start_offset_and_absence() {
        let body = b"<br/>x<br/>";
        assert_eq!(find_encoded(body, b"<br/>", 0), Some(0));
        assert_eq!(find_encoded(body, b"<br/>", 1), Some(6));
        assert_eq!(find_encoded(body, b"<br/>", 7), None);
        assert_eq!(find_encoded(body, b"", 0), None);
        assert_eq!(find_encoded(body, b"<br/>", 100), None);
    }

    #[test]
    fn test_soft_break_before_match() {
        let body = b"=\r\nUSD";
        assert_eq!(find_encoded(body, b"USD", 0), Some(3));
    }

    #[test]
    fn test_trailing_equals_is_literal() {
        // "=\r" at the very end is not a complete soft break
        assert_eq!(find_encoded(b"ab=\r", b"b=\r", 0), Some(1));
    }

    /// Inserts soft breaks into `text` before each listed position.
    fn encode_with_breaks(text: &[u8], mut positions: Vec<usize>) -> Vec<u8> {
        positions.sort_unstable();
        let mut out = Vec::new();
        let mut next = positions.into_iter().peekable();
        for (i, byte) in text.iter().enumerate() {
            while next.peek() == Some(&i) {
                out.extend_from_slice(SOFT_BREAK);
                next.next();
            }
            out.push(*byte);
        }
        out
    }

    proptest! {
        #[test]
        fn prop_soft_breaks_are_transparent(
            text in "[a-zA-Z0-9<>/ ]{1,120}",
            start in 0usize..120,
            len in 1usize..16,
            breaks in prop::collection::vec(0usize..120, 0..12),
        ) {
            let text = text.as_bytes();
            let start = start % text.len();
            let end = (start + len).min(text.len());
            let pattern = &text[start .. end];

            let encoded = encode_with_breaks(text, breaks);
            let span = locate_encoded(&encoded, pattern, 0).expect("pattern is present");
            prop_assert_eq!(strip_soft_breaks(span.slice(&encoded)), pattern.to_vec());
            prop_assert!(span.end() <= encoded.len());
        }
    }
}
