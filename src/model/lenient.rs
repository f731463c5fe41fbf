//! Tolerant deserializers for fields whose stored/wire shape has drifted.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, IgnoredAny};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    fn to_i64(&self) -> Option<i64> {
        match self {
            Numeric::Int(n) => Some(*n),
            Numeric::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Numeric::Float(_) => None,
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Integer stored as int, integral double, or numeric text.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Numeric::deserialize(deserializer)?;
    raw.to_i64()
        .ok_or_else(|| de::Error::custom("expected an integer"))
}

/// Like [`lenient_i64`], narrowed to `i32`.
pub fn lenient_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_i64(deserializer)?;
    i32::try_from(value).map_err(|_| de::Error::custom("integer out of range"))
}

/// Optional integer; null, blank or non-numeric text become `None`.
pub fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Numeric>::deserialize(deserializer)?;
    Ok(raw.and_then(|n| n.to_i64()))
}

/// Like [`lenient_opt_i64`], narrowed to `i32`.
pub fn lenient_opt_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Numeric>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|n| n.to_i64())
        .and_then(|n| i32::try_from(n).ok()))
}

/// Optional identifier sent either as text or as a number.
pub fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Numeric>::deserialize(deserializer)?;
    Ok(raw.map(|n| match n {
        Numeric::Int(i) => i.to_string(),
        Numeric::Float(f) => f.to_string(),
        Numeric::Text(s) => s,
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Instant {
    Millis(i64),
    FractionalMillis(f64),
    Text(String),
    #[allow(dead_code)]
    Other(IgnoredAny),
}

impl Instant {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Instant::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            Instant::FractionalMillis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(ms.trunc() as i64)
            }
            Instant::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// Optional instant sent as RFC 3339 text or epoch milliseconds. Any other
/// shape, or a value that does not parse, becomes `None`.
pub fn lenient_opt_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Instant>::deserialize(deserializer)?;
    Ok(raw.and_then(|t| t.to_utc()))
}

/// A single string or an array of strings, always read as an array.
pub fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(match raw {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}
