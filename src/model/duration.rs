//! Mesh duration strings
//!
//! Routing resources carry durations in the mesh's string form
//! (`"5s"`, `"500ms"`, `"2m"`, `"0.5s"`). These helpers convert between
//! that form and [`std::time::Duration`] and plug into serde via `#[serde(with)]`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Error parsing a duration string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,

    #[error("invalid number in duration: '{0}'")]
    InvalidNumber(String),

    #[error("unknown duration unit in '{0}' (expected ms, s, m or h)")]
    UnknownUnit(String),

    #[error("duration out of range: '{0}'")]
    Overflow(String),
}

/// Parse a duration such as `"30s"`, `"500ms"`, `"5m"`, `"1h"` or `"0.25s"`
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let s = s.trim().to_lowercase();

    if s.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let (num_str, unit_millis) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000u64)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1000u64)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60 * 1000u64)
    } else {
        return Err(DurationParseError::UnknownUnit(s));
    };

    let num_str = num_str.trim();

    // Fractional values only make sense for whole units of a second or more
    if num_str.contains('.') && unit_millis >= 1000 {
        let value: f64 = num_str
            .parse()
            .map_err(|_| DurationParseError::InvalidNumber(num_str.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(DurationParseError::InvalidNumber(num_str.to_string()));
        }
        return Duration::try_from_secs_f64(value * (unit_millis / 1000) as f64)
            .map_err(|_| DurationParseError::Overflow(s.clone()));
    }

    let num: u64 = num_str
        .parse()
        .map_err(|_| DurationParseError::InvalidNumber(num_str.to_string()))?;

    let millis = num
        .checked_mul(unit_millis)
        .ok_or_else(|| DurationParseError::Overflow(s.clone()))?;
    Ok(Duration::from_millis(millis))
}

/// Render a duration in the shortest exact mesh form
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if d.subsec_nanos() % 1_000_000 != 0 {
        format!("{}s", d.as_secs_f64())
    } else if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*d))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Same conversion for optional fields
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => serializer.serialize_str(&format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
