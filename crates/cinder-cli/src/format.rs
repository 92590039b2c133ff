//! Pretty-printing for RESP2 values.
//!
//! Converts server replies into colorized, human-readable output
//! matching the style familiar to redis-cli users.

use cinder::Value;
use colored::Colorize;

/// Formats a reply value for terminal display.
///
/// - simple strings: green
/// - errors: red with `(error)` prefix
/// - integers: yellow with `(integer)` prefix
/// - bulk strings: green, quoted (binary data as hex)
/// - nil: dim `(nil)`
/// - arrays: numbered list
pub fn format_response(value: &Value) -> String {
    format_value(value, 0)
}

/// Formats a pushed Pub/Sub message.
pub fn format_message(channel: &str, payload: &[u8]) -> String {
    format!(
        "{} {} {}",
        "(message)".cyan(),
        sanitize(channel).cyan(),
        sanitize(&String::from_utf8_lossy(payload)).green()
    )
}

/// Strips ANSI escape sequences and other control characters from
/// server-supplied strings to prevent terminal manipulation attacks.
/// Retains printable characters, tabs, and newlines.
fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            // skip the ESC and the rest of the ANSI sequence
            if let Some(next) = chars.next() {
                if next == '[' {
                    // CSI sequence — consume until a letter
                    for c in chars.by_ref() {
                        if c.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
            }
        } else if ch == '\t' || ch == '\n' || ch == '\r' || !ch.is_control() {
            out.push(ch);
        }
    }
    out
}

fn format_value(value: &Value, indent: usize) -> String {
    let prefix = " ".repeat(indent);

    match value {
        Value::Simple(s) => format!("{prefix}{}", sanitize(s).green()),

        Value::Error(e) => format!("{prefix}{} {}", "(error)".red(), sanitize(e).red()),

        Value::Integer(n) => format!(
            "{prefix}{} {}",
            "(integer)".yellow(),
            n.to_string().yellow()
        ),

        Value::Bulk(Some(data)) => match std::str::from_utf8(data) {
            Ok(s) if s.contains('\n') => {
                // multiline output (like INFO) — print unquoted
                format!("{prefix}{}", sanitize(s).green())
            }
            Ok(s) => format!("{prefix}{}", format!("\"{}\"", sanitize(s)).green()),
            Err(_) => {
                // binary data — show as hex
                let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
                format!("{prefix}{}", hex.green())
            }
        },

        Value::Bulk(None) | Value::Array(None) | Value::Null => {
            format!("{prefix}{}", "(nil)".dimmed())
        }

        Value::Array(Some(items)) if items.is_empty() => {
            format!("{prefix}{}", "(empty array)".dimmed())
        }

        Value::Array(Some(items)) => {
            let mut lines = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let num = format!("{})", i + 1);
                lines.push(format!("{prefix}{} {}", num, format_value(item, 0)));
            }
            lines.join("\n")
        }
    }
}
