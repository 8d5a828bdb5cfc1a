use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical timeframe tags and their duration in seconds.
///
/// `M` (month) is nominal: 30 days, not a calendar month. It is the only
/// tag whose letter case carries meaning — `1m` is one minute, `1M` is
/// one (nominal) month.
const CANONICAL_SECONDS: &[(&str, i64)] = &[
    ("1m", 60),
    ("3m", 180),
    ("5m", 300),
    ("15m", 900),
    ("30m", 1_800),
    ("1h", 3_600),
    ("2h", 7_200),
    ("4h", 14_400),
    ("6h", 21_600),
    ("8h", 28_800),
    ("12h", 43_200),
    ("1d", 86_400),
    ("3d", 259_200),
    ("1w", 604_800),
    ("1M", 2_592_000),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid timeframe: {0}")]
pub struct TimeframeError(pub String);

/// A validated, canonical timeframe tag (e.g. `"1m"`, `"4h"`, `"1M"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeframe(String);

impl Timeframe {
    /// Parses and normalizes a timeframe string, accepting common aliases
    /// (`1min`→`1m`, `1hour`→`1h`, `1day`→`1d`, `1week`→`1w`, `1month`→`1M`)
    /// in addition to the canonical tags themselves.
    pub fn parse(raw: &str) -> Result<Self, TimeframeError> {
        let canonical = normalize(raw).ok_or_else(|| TimeframeError(raw.to_string()))?;
        if CANONICAL_SECONDS.iter().any(|(tag, _)| *tag == canonical) {
            Ok(Timeframe(canonical))
        } else {
            Err(TimeframeError(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn seconds(&self) -> i64 {
        CANONICAL_SECONDS
            .iter()
            .find(|(tag, _)| *tag == self.0)
            .map(|(_, secs)| *secs)
            .expect("Timeframe is always constructed from the canonical table")
    }

    pub fn duration_ms(&self) -> i64 {
        self.seconds() * 1_000
    }

    pub fn all() -> Vec<Timeframe> {
        CANONICAL_SECONDS
            .iter()
            .map(|(tag, _)| Timeframe(tag.to_string()))
            .collect()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::parse(s)
    }
}

/// Normalizes aliases to a canonical tag string without validating it
/// against the canonical table (callers do that check separately).
fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (digits, suffix) = split_leading_digits(trimmed)?;
    if digits.is_empty() {
        return None;
    }

    // "M" is checked in its exact case before anything gets lowercased —
    // lowercasing first would collapse it onto "m" (minute).
    let unit = if suffix == "M" {
        'M'
    } else {
        match suffix.to_lowercase().as_str() {
            "m" | "min" | "mins" | "minute" | "minutes" => 'm',
            "h" | "hr" | "hrs" | "hour" | "hours" => 'h',
            "d" | "day" | "days" => 'd',
            "w" | "wk" | "wks" | "week" | "weeks" => 'w',
            "mo" | "mon" | "month" | "months" => 'M',
            _ => return None,
        }
    };

    Some(format!("{digits}{unit}"))
}

fn split_leading_digits(s: &str) -> Option<(&str, &str)> {
    let split_at = s.find(|c: char| !c.is_ascii_digit())?;
    Some((&s[..split_at], &s[split_at..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_tags() {
        for (tag, secs) in CANONICAL_SECONDS {
            let tf = Timeframe::parse(tag).unwrap();
            assert_eq!(tf.as_str(), *tag);
            assert_eq!(tf.seconds(), *secs);
        }
    }

    #[test]
    fn normalizes_aliases() {
        assert_eq!(Timeframe::parse("1min").unwrap().as_str(), "1m");
        assert_eq!(Timeframe::parse("1hour").unwrap().as_str(), "1h");
        assert_eq!(Timeframe::parse("1day").unwrap().as_str(), "1d");
        assert_eq!(Timeframe::parse("4hours").unwrap().as_str(), "4h");
        assert_eq!(Timeframe::parse("1week").unwrap().as_str(), "1w");
        assert_eq!(Timeframe::parse("1month").unwrap().as_str(), "1M");
    }

    #[test]
    fn rejects_unknown_or_unsupported_ratios() {
        assert!(Timeframe::parse("7m").is_err());
        assert!(Timeframe::parse("").is_err());
        assert!(Timeframe::parse("bogus").is_err());
    }

    #[test]
    fn month_seconds_are_nominal_thirty_days() {
        let tf = Timeframe::parse("1M").unwrap();
        assert_eq!(tf.seconds(), 30 * 86_400);
    }
}
