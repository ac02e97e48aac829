//! Go-style duration strings (e.g. "1h", "30m", "15s", "1h30m0s")
//!
//! Step timeouts and grace periods are written in the format the job
//! configuration uses, so they are parsed here rather than with a generic
//! duration syntax.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A duration written as a Go-style string
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StepDuration(pub Duration);

impl StepDuration {
    /// Build from whole seconds
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// The wrapped duration
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

/// Parse a duration string made of `<number><unit>` pairs.
///
/// Units are hours (h), minutes (m), and seconds (s); values are
/// non-negative integers.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    if s.is_empty() {
        return Err("duration cannot be empty".to_string());
    }

    let mut remaining = s;
    let mut total: u64 = 0;

    while !remaining.is_empty() {
        let num_end = remaining
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(remaining.len());
        if num_end == 0 {
            return Err(format!(
                "expected a number at position {} in '{}'",
                s.len() - remaining.len(),
                s
            ));
        }
        let num: u64 = remaining[..num_end]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", s))?;

        remaining = &remaining[num_end..];

        let mut chars = remaining.chars();
        let multiplier = match chars.next() {
            Some('h') => 3600,
            Some('m') => 60,
            Some('s') => 1,
            Some(unit) => {
                return Err(format!(
                    "invalid duration unit '{}' in '{}' (expected h, m, or s)",
                    unit, s
                ))
            }
            None => return Err(format!("missing unit suffix (h/m/s) in duration '{}'", s)),
        };
        remaining = chars.as_str();

        total = num
            .checked_mul(multiplier)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| format!("duration '{}' overflows", s))?;
    }

    Ok(Duration::from_secs(total))
}

impl FromStr for StepDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(StepDuration)
    }
}

impl fmt::Display for StepDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        write!(f, "{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

impl Serialize for StepDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StepDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for StepDuration {
    fn schema_name() -> String {
        "StepDuration".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}
