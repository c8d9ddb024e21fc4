//! Unit-suffixed duration strings such as `720h`, `30days`, `1h30m` or `1.5h`.
//!
//! Parsing and formatting are done by `humantime`. On top of it, fractional
//! components (`1.5h`, `2m3.5s`) and the `µs` spelling are accepted, so values
//! written for the previous Go-based tooling keep loading.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::errors::{CertforgotError, Result};

/// One `<number><unit>` component, the number possibly fractional
static COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.(\d+))?([a-zA-Z]+)").expect("static regex is valid"));

static FRACTIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:\.\d+)?[a-zA-Z]+)+$").expect("static regex is valid"));

fn invalid(input: &str, reason: impl std::fmt::Display) -> CertforgotError {
    CertforgotError::validation_field(format!("invalid duration '{}': {}", input, reason), "duration")
}

/// Parse a duration string. `"0"` is the only unitless value; negative values are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let normalized = input.trim().replace(['µ', 'μ'], "u");
    if normalized == "0" {
        return Ok(Duration::ZERO);
    }
    if !normalized.contains('.') {
        return humantime::parse_duration(&normalized).map_err(|e| invalid(input, e));
    }

    if !FRACTIONAL.is_match(&normalized) {
        return Err(invalid(input, "malformed fractional component"));
    }
    let mut total = Duration::ZERO;
    for component in COMPONENT.captures_iter(&normalized) {
        let unit = &component[3];
        let whole = humantime::parse_duration(&format!("{}{}", &component[1], unit)).map_err(|e| invalid(input, e))?;
        total += whole;
        if let Some(fraction) = component.get(2) {
            let scale: f64 = format!("0.{}", fraction.as_str()).parse().map_err(|e| invalid(input, e))?;
            let one = humantime::parse_duration(&format!("1{}", unit)).map_err(|e| invalid(input, e))?;
            total += one.mul_f64(scale);
        }
    }
    Ok(total)
}

/// Human-readable rendering at whole-second precision (`30days`, `1h 30m`)
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        return humantime::format_duration(duration).to_string();
    }
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

/// Serde adapter for `Duration` fields written as duration strings
pub mod serde_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        humantime_serde::serialize(duration, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
