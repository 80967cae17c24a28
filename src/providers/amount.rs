use serde::{Deserialize, Serialize};

use crate::core::SequenceSpan;

/// A dollar amount located in a body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Covers the `$` and every digit of the match
    pub span: SequenceSpan,
    pub text: String,
    /// Value in cents
    pub minor_units: u64,
}

fn digits(text: &[u8], from: usize, max: usize) -> usize {
    text[from.min(text.len()) ..]
        .iter()
        .take(max)
        .take_while(|b| b.is_ascii_digit())
        .count()
}

/// Length of the currency match starting at `pos`, if any.
///
/// Shape: `$`, one to three digits, any number of `,ddd` groups, then an
/// optional `.` with one or two digits.
fn match_at(text: &[u8], pos: usize) -> Option<usize> {
    if text.get(pos) != Some(&b'$') {
        return None;
    }
    let mut end = pos + 1;
    let lead = digits(text, end, 3);
    if lead == 0 {
        return None;
    }
    end += lead;

    while text.get(end) == Some(&b',') && digits(text, end + 1, 3) == 3 {
        end += 4;
    }

    if text.get(end) == Some(&b'.') {
        let cents = digits(text, end + 1, 2);
        if cents > 0 {
            end += 1 + cents;
        }
    }
    Some(end - pos)
}

/// First currency-shaped match in `text`.
pub fn find_currency(text: &[u8]) -> Option<Amount> {
    (0 .. text.len()).find_map(|pos| {
        let length = match_at(text, pos)?;
        let span = SequenceSpan { index: pos, length };
        let raw = span.slice(text);
        Some(Amount {
            span,
            text: String::from_utf8_lossy(raw).into_owned(),
            minor_units: parse_minor_units(raw)?,
        })
    })
}

/// Unsigned decimal without a currency sign: digits, optional `,ddd`
/// groups, optional `.` followed by digits. `171.785` qualifies.
pub fn is_plain_number(text: &str) -> bool {
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    let mut groups = whole.split(',');
    let lead = groups.next().is_some_and(all_digits);
    lead && groups.all(|group| group.len() == 3 && all_digits(group))
        && fraction.is_none_or(all_digits)
}

/// Parses `$1,234.5` style text into cents.
pub fn parse_minor_units(text: &[u8]) -> Option<u64> {
    let text = text.strip_prefix(b"$").unwrap_or(text);
    let (whole, fraction) = match text.iter().position(|b| *b == b'.') {
        Some(dot) => (&text[.. dot], &text[dot + 1 ..]),
        None => (text, &b""[..]),
    };
    if fraction.len() > 2 || !fraction.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let mut dollars: u64 = 0;
    for byte in whole.iter().filter(|b| **b != b',') {
        if !byte.is_ascii_digit() {
            return None;
        }
        dollars = dollars.checked_mul(10)?.checked_add(u64::from(byte - b'0'))?;
    }
    let cents = match fraction {
        [] => 0,
        [tens] => u64::from(tens - b'0') * 10,
        [tens, ones] => u64::from(tens - b'0') * 10 + u64::from(ones - b'0'),
        _ => return None,
    };
    dollars.checked_mul(100)?.checked_add(cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let amount = find_currency(b"Total $22.00 then $5").unwrap();
        assert_eq!(amount.span, SequenceSpan { index: 6, length: 6 });
        assert_eq!(amount.text, "$22.00");
        assert_eq!(amount.minor_units, 2200);
    }

    #[test]
    fn test_thousands_groups() {
        let amount = find_currency(b"<b>$1,234,567.8</b>").unwrap();
        assert_eq!(amount.text, "$1,234,567.8");
        assert_eq!(amount.minor_units, 123_456_780);
    }

    #[test]
    fn test_greedy_prefix_only() {
        // four leading digits match only the first three
        assert_eq!(find_currency(b"$1234").unwrap().text, "$123");
        // an incomplete group is left out
        assert_eq!(find_currency(b"$12,34").unwrap().text, "$12");
        // a dot without digits is left out
        assert_eq!(find_currency(b"$7.").unwrap().text, "$7");
        assert_eq!(find_currency(b"$7.999").unwrap().text, "$7.99");
    }

    #[test]
    fn test_no_match() {
        assert!(find_currency(b"171.785 USD").is_none());
        assert!(find_currency(b"$ 12").is_none());
        assert!(find_currency(b"").is_none());
    }

    #[test]
    fn test_plain_number_shape() {
        assert!(is_plain_number("171.785"));
        assert!(is_plain_number("1,234.56"));
        assert!(is_plain_number("42"));
        assert!(!is_plain_number("call our agent"));
        assert!(!is_plain_number(""));
        assert!(!is_plain_number("12,34"));
        assert!(!is_plain_number("7."));
        assert!(!is_plain_number("$7.00"));
        assert!(!is_plain_number("1.2.3"));
    }

    #[test]
    fn test_parse_minor_units() {
        assert_eq!(parse_minor_units(b"$0.05"), Some(5));
        assert_eq!(parse_minor_units(b"12"), Some(1200));
        assert_eq!(parse_minor_units(b"$1.234"), None);
        assert_eq!(parse_minor_units(b"$1a"), None);
    }
}
