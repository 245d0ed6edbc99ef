//! Logging helpers that keep operator-supplied text on one line and keep secrets out of logs.

use std::fmt::Write;

/// Default cap on how much operator text is echoed into a log line.
const MAX_PREVIEW: usize = 200;

/// Escape a string for single-line logging, truncating after [`MAX_PREVIEW`] chars.
pub fn escape_log(s: &str) -> String {
    escape_log_with(s, MAX_PREVIEW)
}

/// Escape newlines, tabs, backslashes and other control characters; truncate
/// with an ellipsis after `max` characters.
pub fn escape_log_with(s: &str, max: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Show only the first four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_log("Line1\nLine2\r\tEnd"), "Line1\\nLine2\\r\\tEnd");
        assert_eq!(escape_log("a\u{7}b"), "a\\x07b");
    }

    #[test]
    fn truncates_long_input() {
        let esc = escape_log_with("abcdef", 3);
        assert_eq!(esc, "abc…");
    }

    #[test]
    fn masks_secrets() {
        assert_eq!(mask_secret("MTAxMjM0.secret"), "MTAx****");
        assert_eq!(mask_secret(""), "<unset>");
    }
}
