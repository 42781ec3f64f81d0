//! Canonical literal value representation shared across the compiler,
//! predicate model, and store backends.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// SRID assumed when a geometry literal does not carry one.
pub const DEFAULT_SRID: u32 = 4326;

/// Typed literal tagged with explicit type information so the wire format
/// remains unambiguous across process boundaries.
///
/// Exactly one tag is set. `Range` does not enforce `start <= end`; inverted
/// ranges pass through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// 64-bit floating point literal.
    Number(f64),
    /// UTF-8 string literal.
    Text(String),
    /// Boolean literal.
    Bool(bool),
    /// Single instant in UTC.
    Instant(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// Interval between two instants.
    Range {
        /// Interval start.
        #[serde(with = "time::serde::rfc3339")]
        start: OffsetDateTime,
        /// Interval end.
        #[serde(with = "time::serde::rfc3339")]
        end: OffsetDateTime,
    },
    /// Well-known-text geometry with a spatial reference id.
    Geometry(Geometry),
}

/// WKT geometry plus the SRID it is expressed in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Well-known-text body, e.g. `POINT (7.2 52.9)`.
    pub wkt: String,
    /// Spatial reference id, [`DEFAULT_SRID`] unless the literal named one.
    pub srid: u32,
}

impl Value {
    /// Short kind tag used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Instant(_) => "instant",
            Value::Range { .. } => "range",
            Value::Geometry(_) => "geometry",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Instant(t) => match t.format(&Rfc3339) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{t:?}"),
            },
            Value::Range { start, end } => {
                match (start.format(&Rfc3339), end.format(&Rfc3339)) {
                    (Ok(a), Ok(b)) => write!(f, "{a}/{b}"),
                    _ => write!(f, "{start:?}/{end:?}"),
                }
            }
            Value::Geometry(g) => write!(f, "SRID={};{}", g.srid, g.wkt),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::Instant(value)
    }
}

/// Raised when a raw literal cannot be decoded into any [`Value`] tag.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("literal '{text}' is not a string, boolean, timestamp, timespan, geometry, or number")]
pub struct ValueParseError {
    /// The literal as written in the filter expression.
    pub text: String,
}

/// Decodes the raw text of a protocol literal.
///
/// Decoding order: quoted string, boolean, geometry, timespan, timestamp,
/// and finally a bare numeric double. Anything else fails.
pub fn decode_literal(text: &str) -> Result<Value, ValueParseError> {
    if let Some(inner) = unquote(text) {
        return Ok(Value::Text(inner));
    }
    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Some(geom) = decode_geometry(text) {
        return Ok(Value::Geometry(geom));
    }
    if let Some((start, end)) = text.split_once('/') {
        if let (Ok(start), Ok(end)) = (
            OffsetDateTime::parse(start, &Rfc3339),
            OffsetDateTime::parse(end, &Rfc3339),
        ) {
            return Ok(Value::Range { start, end });
        }
    }
    if let Ok(instant) = OffsetDateTime::parse(text, &Rfc3339) {
        return Ok(Value::Instant(instant));
    }
    text.parse::<f64>()
        .map(Value::Number)
        .map_err(|_| ValueParseError {
            text: text.to_owned(),
        })
}

/// Strips the outer single quotes of a string literal and collapses the
/// doubled-quote escape.
fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// Parses `geography'...'` / `geometry'...'` literals, honoring an optional
/// `SRID=n;` prefix inside the quotes.
fn decode_geometry(text: &str) -> Option<Geometry> {
    let lower = text.to_ascii_lowercase();
    let body = if let Some(rest) = lower.strip_prefix("geography") {
        rest
    } else if let Some(rest) = lower.strip_prefix("geometry") {
        rest
    } else {
        return None;
    };
    if !(body.starts_with('\'') && body.ends_with('\'') && body.len() >= 2) {
        return None;
    }
    let start = text.len() - body.len() + 1;
    let inner = text[start..text.len() - 1].trim();

    let (srid, wkt) = match inner.split_once(';') {
        Some((head, tail)) if head.to_ascii_uppercase().starts_with("SRID=") => {
            let srid = head[5..].parse::<u32>().ok()?;
            (srid, tail.trim())
        }
        _ => (DEFAULT_SRID, inner),
    };
    if wkt.is_empty() {
        return None;
    }
    Some(Geometry {
        wkt: wkt.to_owned(),
        srid,
    })
}
