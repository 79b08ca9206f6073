//! Human-entered time spans such as `15m`, `3 minutes` or `1 day`.

use std::{fmt, str::FromStr, time::Duration};

/// Unit a duration literal was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    /// Length of one unit in seconds.
    pub fn seconds(self) -> u64 {
        match self {
            DurationUnit::Seconds => 1,
            DurationUnit::Minutes => 60,
            DurationUnit::Hours => 60 * 60,
            DurationUnit::Days => 24 * 60 * 60,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            DurationUnit::Seconds => "s",
            DurationUnit::Minutes => "m",
            DurationUnit::Hours => "h",
            DurationUnit::Days => "d",
        }
    }

    /// Looks up a unit by any of its accepted spellings, ignoring case.
    pub fn from_name(name: &str) -> Option<DurationUnit> {
        let unit = match name.to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => DurationUnit::Seconds,
            "m" | "min" | "mins" | "minute" | "minutes" => DurationUnit::Minutes,
            "h" | "hr" | "hrs" | "hour" | "hours" => DurationUnit::Hours,
            "d" | "day" | "days" => DurationUnit::Days,
            _ => return None,
        };
        Some(unit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration {0:?}: expected a whole number followed by an optional unit")]
    InvalidNumber(String),
    #[error("unknown duration unit {0:?}")]
    UnknownUnit(String),
    #[error("duration {0:?} is too large")]
    Overflow(String),
}

/// A parsed duration literal: total seconds plus the unit it was written in.
///
/// Equality only looks at the number of seconds, so `15m` equals `900`.
#[derive(Debug, Clone, Copy)]
pub struct DurationValue {
    seconds: u64,
    unit: DurationUnit,
}

impl DurationValue {
    pub fn new(count: u64, unit: DurationUnit) -> Option<DurationValue> {
        count
            .checked_mul(unit.seconds())
            .map(|seconds| DurationValue { seconds, unit })
    }

    pub fn from_secs(seconds: u64) -> DurationValue {
        DurationValue {
            seconds,
            unit: DurationUnit::Seconds,
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.seconds
    }

    pub fn unit(&self) -> DurationUnit {
        self.unit
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl PartialEq for DurationValue {
    fn eq(&self, other: &Self) -> bool {
        self.seconds == other.seconds
    }
}

impl Eq for DurationValue {}

impl FromStr for DurationValue {
    type Err = ParseDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseDurationError::Empty);
        }

        let digits_end = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, rest) = s.split_at(digits_end);
        if digits.is_empty() {
            return Err(ParseDurationError::InvalidNumber(s.to_owned()));
        }
        let count: u64 = digits
            .parse()
            .map_err(|_| ParseDurationError::Overflow(s.to_owned()))?;

        let unit_name = rest.trim_start();
        let unit = if unit_name.is_empty() {
            DurationUnit::Seconds
        } else if unit_name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            DurationUnit::from_name(unit_name)
                .ok_or_else(|| ParseDurationError::UnknownUnit(unit_name.to_owned()))?
        } else {
            // Signs, fractions and the like.
            return Err(ParseDurationError::InvalidNumber(s.to_owned()));
        };

        DurationValue::new(count, unit).ok_or_else(|| ParseDurationError::Overflow(s.to_owned()))
    }
}

impl TryFrom<&str> for DurationValue {
    type Error = ParseDurationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.seconds / self.unit.seconds(), self.unit.suffix())
    }
}

impl From<DurationValue> for Duration {
    fn from(value: DurationValue) -> Duration {
        value.as_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_literals() {
        let cases = [
            ("15m", 900, DurationUnit::Minutes),
            ("3 minutes", 180, DurationUnit::Minutes),
            ("100hrs", 360_000, DurationUnit::Hours),
            ("1 day", 86_400, DurationUnit::Days),
            ("1s", 1, DurationUnit::Seconds),
            ("30", 30, DurationUnit::Seconds),
            ("2 HOURS", 7_200, DurationUnit::Hours),
            ("  5 sec  ", 5, DurationUnit::Seconds),
            ("10mins", 600, DurationUnit::Minutes),
        ];
        for (literal, seconds, unit) in cases {
            let value: DurationValue = literal.parse().expect(literal);
            assert_eq!(value.as_secs(), seconds, "{}", literal);
            assert_eq!(value.unit(), unit, "{}", literal);
        }
    }

    #[test]
    fn test_matches_explicit_seconds() {
        for literal in ["15m", "3 minutes", "100hrs", "1 day", "1s", "30"] {
            let value: DurationValue = literal.parse().unwrap();
            let explicit: DurationValue = format!("{}s", value.as_secs()).parse().unwrap();
            assert_eq!(value, explicit, "{}", literal);
            assert_eq!(value.as_duration(), explicit.as_duration());
        }
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!("".parse::<DurationValue>(), Err(ParseDurationError::Empty));
        assert_eq!("   ".parse::<DurationValue>(), Err(ParseDurationError::Empty));
        assert!(matches!(
            "m".parse::<DurationValue>(),
            Err(ParseDurationError::InvalidNumber(_))
        ));
        assert!(matches!(
            "-5s".parse::<DurationValue>(),
            Err(ParseDurationError::InvalidNumber(_))
        ));
        assert!(matches!(
            "1.5h".parse::<DurationValue>(),
            Err(ParseDurationError::InvalidNumber(_))
        ));
        assert!(matches!(
            "3 fortnights".parse::<DurationValue>(),
            Err(ParseDurationError::UnknownUnit(unit)) if unit == "fortnights"
        ));
        assert!(matches!(
            "5 m s".parse::<DurationValue>(),
            Err(ParseDurationError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(matches!(
            "99999999999999999999".parse::<DurationValue>(),
            Err(ParseDurationError::Overflow(_))
        ));
        assert!(matches!(
            format!("{}d", u64::MAX / 2).parse::<DurationValue>(),
            Err(ParseDurationError::Overflow(_))
        ));
    }

    #[test]
    fn test_display_uses_entered_unit() {
        assert_eq!("15 minutes".parse::<DurationValue>().unwrap().to_string(), "15m");
        assert_eq!("1 day".parse::<DurationValue>().unwrap().to_string(), "1d");
        assert_eq!("30".parse::<DurationValue>().unwrap().to_string(), "30s");
        assert_eq!(DurationValue::from_secs(90).to_string(), "90s");
    }
}
