//! Canonical JSON encoding for configuration hashing.
//!
//! The generated timeline records a hash of the studio configuration it
//! was produced against, so a later generation can tell "configuration
//! changed" from "configuration identical" without diffing documents.
//! Hash input must therefore be byte-stable across processes and
//! releases:
//!
//! - Object keys emitted in lexicographic (UTF-8 byte) order
//! - Compact output, no whitespace
//! - Integers only; floats are rejected so the encoding never depends
//!   on float formatting (timing values are integral milliseconds)

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{Error, Result};

/// Encodes `value` as canonical JSON bytes.
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be represented as
/// JSON or contains a non-integer number.
#[must_use = "canonical bytes should be used for hashing"]
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    let mut out = Vec::new();
    encode(&value, &mut out)?;
    Ok(out)
}

/// Encodes `value` as a canonical JSON string.
///
/// # Errors
///
/// Returns `Error::Serialization` under the same conditions as
/// [`to_canonical_bytes`].
#[must_use = "canonical string should be used for hashing"]
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::serialization("canonical JSON produced invalid UTF-8"))
}

fn encode(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(flag) => out.extend_from_slice(if *flag { b"true" } else { b"false" }),
        Value::Number(number) => encode_integer(number, out)?,
        Value::String(text) => {
            // serde_json emits the quoted, escaped form; its escaping
            // rules are part of the canonical format.
            serde_json::to_writer(&mut *out, text)?;
        }
        Value::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                encode(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(fields) => {
            let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (index, (key, field)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                encode(field, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn encode_integer(number: &Number, out: &mut Vec<u8>) -> Result<()> {
    use std::io::Write as _;

    if let Some(signed) = number.as_i64() {
        write!(out, "{signed}").map_err(|e| Error::serialization(e.to_string()))?;
    } else if let Some(unsigned) = number.as_u64() {
        write!(out, "{unsigned}").map_err(|e| Error::serialization(e.to_string()))?;
    } else {
        // serde_json::Number only falls through to f64 when the value
        // fits neither integer range.
        return Err(Error::serialization(
            "non-integer number in canonical JSON; encode timing values as integral milliseconds",
        ));
    }
    Ok(())
}
