//! Byte span location in headers and bodies.
//!
//! Two modes are provided:
//! - direct search over already-decoded text ([`header`] fields and the
//!   literal helpers in this module)
//! - search that sees through quoted-printable soft line breaks
//!   ([`encoded`]), reporting offsets in the encoded buffer

pub mod encoded;
pub mod header;

pub use encoded::{find_encoded, locate_encoded, strip_soft_breaks};
pub use header::{HeaderField, locate_header_field};

/// First occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    find_from(haystack, needle, 0)
}

/// First occurrence of `needle` starting at or after `from`.
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from ..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Last occurrence of `needle` that starts at or before `at`.
pub fn rfind_at_or_before(haystack: &[u8], needle: &[u8], at: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    let last_start = at.min(haystack.len() - needle.len());
    (0 ..= last_start)
        .rev()
        .find(|&start| &haystack[start .. start + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_from() {
        let text = b"<td>a</td><td>b</td>";
        assert_eq!(find(text, b"<td>"), Some(0));
        assert_eq!(find_from(text, b"<td>", 1), Some(10));
        assert_eq!(find_from(text, b"<td>", 11), None);
        assert_eq!(find_from(text, b"x", 100), None);
    }

    #[test]
    fn test_rfind_at_or_before() {
        let text = b"<tr><td>x</td></tr><tr><td>Total cost";
        let anchor = find(text, b"Total cost").unwrap();
        assert_eq!(rfind_at_or_before(text, b"<tr>", anchor), Some(19));
        assert_eq!(rfind_at_or_before(text, b"<tr>", 18), Some(0));
        assert_eq!(rfind_at_or_before(text, b"<tr>", 0), Some(0));
        assert_eq!(rfind_at_or_before(b"ab", b"abc", 5), None);
    }
}
