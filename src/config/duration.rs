//! Human-readable durations for tool timeouts.
//!
//! Accepts strings like "500ms", "90s", "30m", "1h" or a bare number of
//! seconds, and formats durations back into the shortest exact form.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Parse a duration string like "500ms", "90s", "30m", "1h".
///
/// A bare number is read as seconds. Returns `None` for anything else.
///
/// # Examples
///
/// ```
/// use db_provisioner::config::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("90s"), Some(Duration::from_secs(90)));
/// assert_eq!(parse_duration_string("30m"), Some(Duration::from_secs(1800)));
/// assert_eq!(parse_duration_string("2h"), Some(Duration::from_secs(7200)));
/// assert_eq!(parse_duration_string("250ms"), Some(Duration::from_millis(250)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (digits, scale_ms): (&str, u64) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (s, 1_000)
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(scale_ms))
        .map(Duration::from_millis)
}

/// Render a duration using the largest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms == 0 {
        "0s".to_string()
    } else if ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{}ms", ms)
    }
}

/// Serde adapter so config fields can be written as `"30m"`.
pub mod serde_duration {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Seconds(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse_duration_string(&text).ok_or_else(|| {
                serde::de::Error::custom(format!(
                    "invalid duration '{}' (expected e.g. \"90s\", \"30m\", \"500ms\")",
                    text
                ))
            }),
        }
    }
}
