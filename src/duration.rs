//! ISO-8601 durations (the `xs:duration` lexical form).
//!
//! Year and month components are calendar units and are applied with
//! month arithmetic; day and time components are exact spans.

use crate::error::{Result, SubscriptionError};
use chrono::{DateTime, Months, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed `PnYnMnDTnHnMnS` duration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IsoDuration {
    negative: bool,
    years: u32,
    months: u32,
    days: u32,
    hours: u32,
    minutes: u32,
    seconds: u64,
    nanos: u32,
}

impl IsoDuration {
    /// The zero-length duration (`PT0S`).
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn years(years: u32) -> Self {
        Self {
            years,
            ..Self::default()
        }
    }

    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn hours(hours: u32) -> Self {
        Self {
            hours,
            ..Self::default()
        }
    }

    pub fn minutes(minutes: u32) -> Self {
        Self {
            minutes,
            ..Self::default()
        }
    }

    pub fn seconds(seconds: u64) -> Self {
        Self {
            seconds,
            ..Self::default()
        }
    }

    /// Same magnitude, opposite sign.
    pub fn negated(self) -> Self {
        Self {
            negative: !self.negative,
            ..self
        }
    }

    /// True when every component is zero, regardless of sign.
    pub fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
            && self.nanos == 0
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    /// Apply this duration to a timestamp.
    ///
    /// Month arithmetic clamps to the end of the month (Jan 31 + P1M is the
    /// last day of February). Overflow of the calendar range is an error.
    pub fn add_to<Tz: TimeZone>(&self, at: DateTime<Tz>) -> Result<DateTime<Tz>> {
        let overflow = || SubscriptionError::ExpirationOverflow(format!("{} + {}", at_text(&at), self));

        let months = self
            .years
            .checked_mul(12)
            .and_then(|m| m.checked_add(self.months))
            .ok_or_else(overflow)?;
        let span = self.span().ok_or_else(overflow)?;

        let shifted = if self.negative {
            at.clone()
                .checked_sub_months(Months::new(months))
                .and_then(|t| t.checked_sub_signed(span))
        } else {
            at.clone()
                .checked_add_months(Months::new(months))
                .and_then(|t| t.checked_add_signed(span))
        };

        shifted.ok_or_else(overflow)
    }

    /// The exact (non-calendar) part: days and time components.
    fn span(&self) -> Option<TimeDelta> {
        TimeDelta::try_days(i64::from(self.days))?
            .checked_add(&TimeDelta::try_hours(i64::from(self.hours))?)?
            .checked_add(&TimeDelta::try_minutes(i64::from(self.minutes))?)?
            .checked_add(&TimeDelta::try_seconds(i64::try_from(self.seconds).ok()?)?)?
            .checked_add(&TimeDelta::nanoseconds(i64::from(self.nanos)))
    }
}

fn at_text<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.naive_utc().to_string()
}

/// Split `3Y2M` into `[("3", 'Y'), ("2", 'M')]`.
fn components(part: &str) -> std::result::Result<Vec<(&str, char)>, &'static str> {
    let mut out = Vec::new();
    let mut start = 0;

    for (i, c) in part.char_indices() {
        if c.is_ascii_digit() || c == '.' {
            continue;
        }
        if !c.is_ascii_alphabetic() {
            return Err("unexpected character");
        }
        let number = &part[start..i];
        if number.is_empty() {
            return Err("designator without a value");
        }
        out.push((number, c));
        start = i + c.len_utf8();
    }

    if start != part.len() {
        return Err("value without a designator");
    }

    Ok(out)
}

fn parse_whole(number: &str) -> std::result::Result<u32, &'static str> {
    if number.contains('.') {
        return Err("only seconds may be fractional");
    }
    number.parse().map_err(|_| "component out of range")
}

/// Parse `S` values like `12.5` into whole seconds and nanoseconds.
fn parse_seconds(number: &str) -> std::result::Result<(u64, u32), &'static str> {
    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() || (number.contains('.') && fraction.is_empty()) {
        return Err("malformed seconds");
    }
    if fraction.contains('.') {
        return Err("malformed seconds");
    }

    let seconds = whole.parse().map_err(|_| "component out of range")?;

    // Nanosecond precision; extra digits are truncated.
    let mut nanos: u32 = 0;
    for (i, digit) in fraction.bytes().take(9).enumerate() {
        nanos += u32::from(digit - b'0') * 10u32.pow(8 - i as u32);
    }

    Ok((seconds, nanos))
}

impl FromStr for IsoDuration {
    type Err = SubscriptionError;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = |reason: &str| SubscriptionError::invalid_expiration(text, reason);

        let s = text.trim();
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let rest = rest
            .strip_prefix('P')
            .ok_or_else(|| invalid("duration must start with 'P'"))?;

        let (date_part, time_part) = match rest.split_once('T') {
            Some((_, "")) => return Err(invalid("'T' must be followed by a time component")),
            Some((date, time)) => (date, Some(time)),
            None => (rest, None),
        };

        let mut duration = IsoDuration {
            negative,
            ..Self::default()
        };
        let mut seen = 0;

        let mut last = None;
        for (number, designator) in components(date_part).map_err(invalid)? {
            let position = "YMD"
                .find(designator)
                .ok_or_else(|| invalid("unexpected date designator"))?;
            if last.is_some_and(|l| l >= position) {
                return Err(invalid("date components out of order"));
            }
            last = Some(position);

            let value = parse_whole(number).map_err(invalid)?;
            match designator {
                'Y' => duration.years = value,
                'M' => duration.months = value,
                _ => duration.days = value,
            }
            seen += 1;
        }

        if let Some(time_part) = time_part {
            let mut last = None;
            for (number, designator) in components(time_part).map_err(invalid)? {
                let position = "HMS"
                    .find(designator)
                    .ok_or_else(|| invalid("unexpected time designator"))?;
                if last.is_some_and(|l| l >= position) {
                    return Err(invalid("time components out of order"));
                }
                last = Some(position);

                match designator {
                    'H' => duration.hours = parse_whole(number).map_err(invalid)?,
                    'M' => duration.minutes = parse_whole(number).map_err(invalid)?,
                    _ => {
                        let (seconds, nanos) = parse_seconds(number).map_err(invalid)?;
                        duration.seconds = seconds;
                        duration.nanos = nanos;
                    }
                }
                seen += 1;
            }
        }

        if seen == 0 {
            return Err(invalid("duration has no components"));
        }

        Ok(duration)
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "PT0S");
        }
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 || self.nanos > 0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.nanos > 0 {
                let fraction = format!("{:09}", self.nanos);
                write!(f, "{}.{}S", self.seconds, fraction.trim_end_matches('0'))?;
            } else if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IsoDuration({})", self)
    }
}

impl TryFrom<String> for IsoDuration {
    type Error = SubscriptionError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IsoDuration> for String {
    fn from(value: IsoDuration) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn utc(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_full_form() {
        let d: IsoDuration = "P1Y2M3DT4H5M6.5S".parse().unwrap();
        assert_eq!(d.years, 1);
        assert_eq!(d.months, 2);
        assert_eq!(d.days, 3);
        assert_eq!(d.hours, 4);
        assert_eq!(d.minutes, 5);
        assert_eq!(d.seconds, 6);
        assert_eq!(d.nanos, 500_000_000);
        assert!(!d.is_negative());
    }

    #[test]
    fn test_zero_forms() {
        for text in ["PT0S", "P0D", "P0Y0M0DT0H0M0S", "-PT0S", "PT0.000S"] {
            let d: IsoDuration = text.parse().unwrap();
            assert!(d.is_zero(), "{text} should be zero");
            assert!(!d.is_negative());
        }
        assert_eq!(IsoDuration::zero().to_string(), "PT0S");
    }

    #[test]
    fn test_minutes_vs_months() {
        let months: IsoDuration = "P10M".parse().unwrap();
        let minutes: IsoDuration = "PT10M".parse().unwrap();
        assert_eq!(months.months, 10);
        assert_eq!(minutes.minutes, 10);
        assert_ne!(months, minutes);
    }

    #[test]
    fn test_malformed_rejected() {
        for text in [
            "", "P", "PT", "10M", "P1H", "PT1D", "P1M1Y", "PT1S1M", "P1.5Y", "PT1.S", "PT.5S",
            "P-1D", "P1YT", "P 1D", "PT1.2.3S", "P99999999999Y",
        ] {
            let err = text.parse::<IsoDuration>().unwrap_err();
            assert!(
                matches!(err, SubscriptionError::InvalidExpiration { .. }),
                "{text:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_negative() {
        let d: IsoDuration = "-PT1H".parse().unwrap();
        assert!(d.is_negative());
        let at = utc("2030-01-01T12:00:00Z");
        assert_eq!(d.add_to(at).unwrap(), utc("2030-01-01T11:00:00Z"));
    }

    #[test]
    fn test_month_arithmetic_clamps() {
        let at = utc("2028-01-31T00:00:00Z");
        let d: IsoDuration = "P1M".parse().unwrap();
        assert_eq!(d.add_to(at).unwrap(), utc("2028-02-29T00:00:00Z"));
    }

    #[test]
    fn test_years_are_calendar_years() {
        let at = utc("2026-03-01T08:30:00Z");
        assert_eq!(
            IsoDuration::years(2).add_to(at).unwrap(),
            utc("2028-03-01T08:30:00Z")
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let at = utc("2026-01-01T00:00:00Z");
        let err = IsoDuration::years(4_000_000).add_to(at).unwrap_err();
        assert!(matches!(err, SubscriptionError::ExpirationOverflow(_)));
    }

    #[test]
    fn test_display_canonical() {
        let d: IsoDuration = "P0Y1DT0H30M".parse().unwrap();
        assert_eq!(d.to_string(), "P1DT30M");
        let d: IsoDuration = "PT1.250S".parse().unwrap();
        assert_eq!(d.to_string(), "PT1.25S");
        assert_eq!(IsoDuration::hours(2).negated().to_string(), "-PT2H");
    }

    #[test]
    fn test_serde_as_text() {
        let json = serde_json::to_string(&IsoDuration::years(5)).unwrap();
        assert_eq!(json, "\"P5Y\"");
        let back: IsoDuration = serde_json::from_str("\"PT10M\"").unwrap();
        assert_eq!(back, IsoDuration::minutes(10));
        assert!(serde_json::from_str::<IsoDuration>("\"ten minutes\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_time_components_are_exact(h in 0u32..10_000, m in 0u32..10_000, s in 0u64..100_000) {
            let at = utc("2026-10-17T00:00:00Z");
            let d: IsoDuration = format!("PT{h}H{m}M{s}S").parse().unwrap();
            let expected = at
                + TimeDelta::hours(i64::from(h))
                + TimeDelta::minutes(i64::from(m))
                + TimeDelta::seconds(s as i64);
            prop_assert_eq!(d.add_to(at).unwrap(), expected);
        }

        #[test]
        fn prop_negation_inverts_exact_spans(days in 0u32..10_000, s in 0u64..86_400) {
            let at = utc("2026-10-17T00:00:00Z");
            let d: IsoDuration = format!("P{days}DT{s}S").parse().unwrap();
            let there = d.add_to(at).unwrap();
            prop_assert_eq!(d.negated().add_to(there).unwrap(), at);
        }
    }
}
