//! Logging helpers that keep radio and broker traffic on a single log line.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Truncates very long strings (over `MAX_PREVIEW` chars) with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Space-separated uppercase hex of at most `max` bytes, e.g. `10 00 64 7C`.
pub fn hex_frame(data: &[u8], max: usize) -> String {
    let mut out = data
        .iter()
        .take(max)
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > max {
        out.push_str(" …");
    }
    out
}

/// Parse a hex frame as typed on the command line: `10 00 64 7c`, `1000647C`,
/// or `0x10,0x00,0x64,0x7C`.
pub fn parse_hex_frame(input: &str) -> Option<Vec<u8>> {
    let cleaned: String = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|tok| tok.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if cleaned.is_empty() || cleaned.len() % 2 != 0 {
        return None;
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(cleaned.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines_and_truncates() {
        let s = "Line1\nLine2\r\tEnd";
        assert_eq!(escape_log(s), "Line1\\nLine2\\r\\tEnd");
        let long = "x".repeat(400);
        assert!(escape_log(&long).ends_with('…'));
    }

    #[test]
    fn hex_frame_caps_length() {
        assert_eq!(hex_frame(&[0x10, 0x00, 0x64, 0x7C], 16), "10 00 64 7C");
        assert_eq!(hex_frame(&[1, 2, 3], 2), "01 02 …");
    }

    #[test]
    fn parses_common_hex_spellings() {
        let expected = Some(vec![0x10, 0x00, 0x64, 0x7C]);
        assert_eq!(parse_hex_frame("10 00 64 7c"), expected);
        assert_eq!(parse_hex_frame("1000647C"), expected);
        assert_eq!(parse_hex_frame("0x10,0x00,0x64,0x7C"), expected);
        assert_eq!(parse_hex_frame("abc"), None);
        assert_eq!(parse_hex_frame("zz"), None);
        assert_eq!(parse_hex_frame(""), None);
    }
}
