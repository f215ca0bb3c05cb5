//! Delimiter dialects and message boundaries
//!
//! Three field-delimiter conventions show up in FIX logs: the SOH byte, a pipe,
//! and the literal two-character `^A` that many loggers print for SOH. CR and LF
//! are treated as delimiters as well so that line-oriented logs tokenize the
//! same way as concatenated ones.

/// Canonical FIX field delimiter
pub const SOH: u8 = 0x01;

/// Literal that opens every FIX message (tag 8, BeginString)
pub const BEGIN_STRING: &[u8] = b"8=FIX";

/// Width in bytes of the delimiter starting at `pos`, or `None` if `bytes[pos]` is not one
#[inline]
pub fn delimiter_width(bytes: &[u8], pos: usize) -> Option<usize> {
    match bytes[pos] {
        SOH | b'|' | b'\r' | b'\n' => Some(1),
        b'^' if bytes.get(pos + 1) == Some(&b'A') => Some(2),
        _ => None,
    }
}

/// Position of the first `8=FIX` at or after `from`
pub fn find_begin_string(haystack: &[u8], from: usize) -> Option<usize> {
    let width = BEGIN_STRING.len();
    if haystack.len() < from + width {
        return None;
    }
    haystack[from..]
        .windows(width)
        .position(|window| window == BEGIN_STRING)
        .map(|offset| from + offset)
}

/// Find the next `8=FIX` at or after `from` that starts a message in a log.
///
/// An occurrence preceded by an ASCII digit is part of another tag
/// (`58=FIXED`, `108=FIX...`) and is not a message boundary.
pub fn find_message_start(haystack: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(found) = find_begin_string(haystack, pos) {
        if found == 0 || !haystack[found - 1].is_ascii_digit() {
            return Some(found);
        }
        pos = found + 1;
    }
    None
}

/// The FIX payload of a raw message: everything from the first `8=FIX`.
///
/// Log prefixes such as `"<timestamp> parse: "` are discarded. Returns `None`
/// when the input holds no FIX message at all.
pub fn fix_payload(raw: &[u8]) -> Option<&[u8]> {
    find_begin_string(raw, 0).map(|start| &raw[start..])
}

/// Rewrite every delimiter dialect to SOH
pub fn normalize_delimiters(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match delimiter_width(raw, i) {
            Some(width) => {
                out.push(SOH);
                i += width;
            }
            None => {
                out.push(raw[i]);
                i += 1;
            }
        }
    }

    match String::from_utf8(out) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Strip trailing delimiters and ASCII whitespace from a message segment
pub fn trim_segment(mut bytes: &[u8]) -> &[u8] {
    loop {
        match bytes {
            [rest @ .., b'^', b'A'] => bytes = rest,
            [rest @ .., last] if *last == SOH || *last == b'|' || last.is_ascii_whitespace() => {
                bytes = rest
            }
            _ => return bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_width() {
        let bytes = b"a\x01b|c^Ad\ne^";
        assert_eq!(delimiter_width(bytes, 1), Some(1));
        assert_eq!(delimiter_width(bytes, 3), Some(1));
        assert_eq!(delimiter_width(bytes, 5), Some(2));
        assert_eq!(delimiter_width(bytes, 8), Some(1));
        assert_eq!(delimiter_width(bytes, 0), None);
        // A lone caret at the end is data
        assert_eq!(delimiter_width(bytes, 10), None);
    }

    #[test]
    fn test_find_begin_string_skips_prefix() {
        let line = b"2025-01-01 10:00:00 parse: 8=FIX.4.2|35=D|";
        assert_eq!(find_begin_string(line, 0), Some(27));
        assert_eq!(fix_payload(line), Some(&b"8=FIX.4.2|35=D|"[..]));
    }

    #[test]
    fn test_message_start_ignores_embedded_occurrence() {
        let msg = b"8=FIX.4.2|58=FIXED INCOME|8=FIX.4.4|";
        assert_eq!(find_message_start(msg, 0), Some(0));
        assert_eq!(find_message_start(msg, 1), Some(26));
        assert_eq!(find_begin_string(msg, 1), Some(11));
    }

    #[test]
    fn test_payload_starts_at_first_occurrence() {
        let line = b"audit #128=FIX.4.2|35=D|55=A|";
        assert_eq!(fix_payload(line), Some(&b"8=FIX.4.2|35=D|55=A|"[..]));
        assert_eq!(find_message_start(line, 0), None);
    }

    #[test]
    fn test_no_fix_payload() {
        assert_eq!(fix_payload(b""), None);
        assert_eq!(fix_payload(b"heartbeat ok"), None);
        assert_eq!(fix_payload(b"8=FI"), None);
    }

    #[test]
    fn test_normalize_all_dialects() {
        let normalized = normalize_delimiters(b"8=FIX.4.2^A35=D|55=VOD.L\x0138=100\r\n");
        assert_eq!(normalized, "8=FIX.4.2\u{1}35=D\u{1}55=VOD.L\u{1}38=100\u{1}\u{1}");
    }

    #[test]
    fn test_trim_segment() {
        assert_eq!(trim_segment(b"8=FIX|10=1|\n"), b"8=FIX|10=1");
        assert_eq!(trim_segment(b"8=FIX^A10=1^A \r\n"), b"8=FIX^A10=1");
        assert_eq!(trim_segment(b"\x01\x01"), b"");
    }
}
