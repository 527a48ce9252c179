use std::time::Duration;

use thiserror::Error;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;
const SECONDS_PER_DAY: u64 = 86400;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration string")]
    Empty,

    #[error("invalid duration format: {0:?}")]
    InvalidFormat(String),

    #[error("unknown duration unit: {0:?}")]
    UnknownUnit(char),
}

/// Parses a duration of the form `<n>{s,m,h,d}` (case-insensitive).
/// Plain numbers without a unit are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut chars = trimmed.chars();
    let unit = chars
        .next_back()
        .ok_or_else(|| DurationError::InvalidFormat(trimmed.to_string()))?;
    let digits = chars.as_str();

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DurationError::InvalidFormat(trimmed.to_string()));
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| DurationError::InvalidFormat(trimmed.to_string()))?;

    let multiplier = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => SECONDS_PER_MINUTE,
        'h' => SECONDS_PER_HOUR,
        'd' => SECONDS_PER_DAY,
        other if other.is_ascii_digit() => {
            return Err(DurationError::InvalidFormat(trimmed.to_string()))
        }
        other => return Err(DurationError::UnknownUnit(other)),
    };

    Ok(Duration::from_secs(value * multiplier))
}

/// Formats a duration using the largest unit that divides it evenly, so
/// `format_duration(parse_duration("120s")?)` yields `"2m"`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    if secs % SECONDS_PER_DAY == 0 {
        return format!("{}d", secs / SECONDS_PER_DAY);
    }
    if secs % SECONDS_PER_HOUR == 0 {
        return format!("{}h", secs / SECONDS_PER_HOUR);
    }
    if secs % SECONDS_PER_MINUTE == 0 {
        return format!("{}m", secs / SECONDS_PER_MINUTE);
    }
    format!("{secs}s")
}

/// Serde adapter for `Duration` fields carried as duration strings.
pub mod string {
    use std::time::Duration;

    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<Duration>` fields carried as duration strings.
pub mod option_string {
    use std::time::Duration;

    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&super::format_duration(*duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(text) => super::parse_duration(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
