//! Scalar coercion between caller values and wire representations.
//!
//! Numeric and temporal semantics are fixed across all protocols:
//!
//! - integers and floats parse with locale-independent decimal parsing;
//! - booleans accept only literal `true`/`false` (the strings `"true"` /
//!   `"false"` in textual protocols);
//! - timestamps support three textual formats, auto-detected by pattern:
//!   digits-only means Unix seconds, a leading four-digit year means
//!   ISO-8601, a leading weekday abbreviation means RFC-1123;
//! - binary values round-trip through base64 in textual protocols and as
//!   raw bytes in literal payloads.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::{Shape, TimestampFormat};

/// Parses a timestamp from its textual wire form, auto-detecting the
/// format.
///
/// Detection is by leading pattern: digits-only (optionally fractional) is
/// Unix seconds; a string starting with four digits is ISO-8601; a string
/// starting with a weekday abbreviation is RFC-1123.
///
/// # Example
///
/// ```rust
/// use nimbus_client::schema::coerce::parse_timestamp;
///
/// let a = parse_timestamp("1357684549").unwrap();
/// let b = parse_timestamp("2013-01-08T22:35:49Z").unwrap();
/// let c = parse_timestamp("Tue, 08 Jan 2013 22:35:49 GMT").unwrap();
/// assert_eq!(a.timestamp(), 1_357_684_549);
/// assert_eq!(b, c);
/// ```
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // Digits (with optional fraction) are Unix seconds.
    if text
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.')
    {
        return parse_unix_seconds(text);
    }

    // A four-digit year prefix is ISO-8601.
    if text.len() >= 4 && text[..4].chars().all(|c| c.is_ascii_digit()) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(parsed.with_timezone(&Utc));
        }
        // Compact basic format without separators.
        if let Ok(naive) =
            chrono::NaiveDateTime::parse_from_str(text, "%Y%m%dT%H%M%SZ")
        {
            return Some(Utc.from_utc_datetime(&naive));
        }
        return None;
    }

    // A weekday abbreviation prefix is an RFC-1123-style date.
    const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    if WEEKDAYS.iter().any(|day| text.starts_with(day)) {
        return DateTime::parse_from_rfc2822(text)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc));
    }

    None
}

fn parse_unix_seconds(text: &str) -> Option<DateTime<Utc>> {
    let seconds: f64 = text.parse().ok()?;
    let whole = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

/// Converts a caller-supplied value into a timestamp.
///
/// Accepts JSON numbers (Unix seconds) and strings in any of the three
/// wire formats.
#[must_use]
pub fn value_to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let seconds = n.as_f64()?;
            let whole = seconds.trunc() as i64;
            let nanos = (seconds.fract() * 1_000_000_000.0).round() as u32;
            Utc.timestamp_opt(whole, nanos).single()
        }
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Formats a timestamp in the given wire format.
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>, format: TimestampFormat) -> String {
    match format {
        TimestampFormat::UnixSeconds => time.timestamp().to_string(),
        TimestampFormat::Iso8601 => time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        TimestampFormat::Rfc1123 => time.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    }
}

/// Encodes binary data for a textual protocol.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes base64 text received from a textual protocol.
#[must_use]
pub fn decode_base64(text: &str) -> Option<Vec<u8>> {
    BASE64.decode(text.trim()).ok()
}

/// Converts a scalar value to its textual wire form.
///
/// `timestamp_format` supplies the protocol default when the shape does
/// not declare one. Returns `None` when the value cannot represent the
/// shape's kind (the validator rejects such trees before any codec runs).
#[must_use]
pub fn scalar_to_string(
    shape: &Shape,
    value: &Value,
    timestamp_format: TimestampFormat,
) -> Option<String> {
    match shape {
        Shape::String => value.as_str().map(ToString::to_string),
        Shape::Integer => value.as_i64().map(|n| n.to_string()),
        Shape::Float => value.as_f64().map(|n| n.to_string()),
        Shape::Boolean => value.as_bool().map(|b| b.to_string()),
        Shape::Timestamp(declared) => {
            let format = declared.unwrap_or(timestamp_format);
            value_to_timestamp(value).map(|t| format_timestamp(t, format))
        }
        Shape::Binary => value.as_str().map(|s| encode_base64(s.as_bytes())),
        Shape::Structure(_) | Shape::List(_) | Shape::Map(_) => None,
    }
}

/// Converts a textual wire value back into a typed value.
///
/// Unparseable input falls back to the raw string so response data is
/// never silently dropped.
#[must_use]
pub fn scalar_from_string(shape: &Shape, text: &str) -> Value {
    match shape {
        Shape::Integer => text
            .trim()
            .parse::<i64>()
            .map_or_else(|_| Value::String(text.to_string()), Value::from),
        Shape::Float => text
            .trim()
            .parse::<f64>()
            .map_or_else(|_| Value::String(text.to_string()), Value::from),
        Shape::Boolean => match text.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        Shape::Timestamp(_) => parse_timestamp(text).map_or_else(
            || Value::String(text.to_string()),
            |t| Value::String(format_timestamp(t, TimestampFormat::Iso8601)),
        ),
        Shape::Binary => decode_base64(text).map_or_else(
            || Value::String(text.to_string()),
            |bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        ),
        _ => Value::String(text.to_string()),
    }
}

/// Converts a scalar value to its JSON-protocol form.
///
/// Timestamps become Unix-second numbers and binary becomes base64 text;
/// everything else passes through unchanged.
#[must_use]
pub fn scalar_to_json(shape: &Shape, value: &Value) -> Value {
    match shape {
        Shape::Timestamp(declared) => match declared {
            Some(TimestampFormat::Iso8601) => value_to_timestamp(value).map_or_else(
                || value.clone(),
                |t| Value::String(format_timestamp(t, TimestampFormat::Iso8601)),
            ),
            Some(TimestampFormat::Rfc1123) => value_to_timestamp(value).map_or_else(
                || value.clone(),
                |t| Value::String(format_timestamp(t, TimestampFormat::Rfc1123)),
            ),
            _ => value_to_timestamp(value)
                .map_or_else(|| value.clone(), |t| Value::from(t.timestamp())),
        },
        Shape::Binary => value
            .as_str()
            .map_or_else(|| value.clone(), |s| Value::String(encode_base64(s.as_bytes()))),
        _ => value.clone(),
    }
}

/// Converts a JSON-protocol scalar back into a typed value.
#[must_use]
pub fn scalar_from_json(shape: &Shape, value: &Value) -> Value {
    match shape {
        Shape::Timestamp(_) => value_to_timestamp(value).map_or_else(
            || value.clone(),
            |t| Value::String(format_timestamp(t, TimestampFormat::Iso8601)),
        ),
        Shape::Binary => value.as_str().map_or_else(
            || value.clone(),
            |s| {
                decode_base64(s).map_or_else(
                    || value.clone(),
                    |bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                )
            },
        ),
        _ => value.clone(),
    }
}
