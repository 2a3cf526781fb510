//! The deterministic text encoding used as the signing payload.
//!
//! Two logically-equal values must encode to identical bytes; the entire
//! signature scheme rests on this.  The layout: mapping keys in sorted
//! (code point) order, 4-space indentation, `","` + newline between items,
//! `":"` with no space after keys, UTF-8 passed through unescaped.  The
//! output is hashed and signed, never parsed back for equality.
//!
//! Byte-strings never appear raw; callers pre-render them (base64 or hex),
//! and types with their own deterministic string form (Duration,
//! Timestamp) render through that form via their `Serialize` impls.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

use crate::Error;

const INDENT: &str = "    ";

/// Canonical-encodes any serializable value.
///
/// # Errors
///
/// Returns [`Error::Serialization`] when the value cannot be represented
/// as a JSON tree (eg. a map with non-string keys).
pub fn to_canonical<T: Serialize>(value: &T) -> Result<String, Error> {
    Ok(encode(&serde_json::to_value(value)?))
}

/// Canonical-encodes a JSON value tree.
#[must_use]
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, level: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => {
            let _ = write!(out, "{number}");
        }
        Value::String(text) => write_string(out, text),
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push('\n');
                push_indent(out, level + 1);
                write_value(out, item, level + 1);
            }
            out.push('\n');
            push_indent(out, level);
            out.push(']');
        }
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (index, (key, item)) in entries.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push('\n');
                push_indent(out, level + 1);
                write_string(out, key);
                out.push(':');
                write_value(out, item, level + 1);
            }
            out.push('\n');
            push_indent(out, level);
            out.push('}');
        }
    }
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

/// JSON string escaping; non-ASCII passes through as UTF-8.
fn write_string(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
