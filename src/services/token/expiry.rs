/*
 * Responsibility
 * - Resolve flexible expiry input to an absolute instant in whole seconds
 * - Duration string parsing
 */
//! Expiry input resolution.
//!
//! An expiry may be given as a duration offset from now (`"10 seconds"`,
//! `"1 hour 30 minutes"`), as absolute Unix seconds, or as an instant. Every
//! form resolves to an absolute instant strictly after now.

use chrono::{DateTime, Duration as ChronoDuration, Months, Utc};

use crate::error::ExpiryError;

/// Largest accepted numeric expiry. Anything above is taken to be milliseconds.
pub const MAX_EXPIRY_SECONDS: i64 = 9_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    Duration(String),
    Timestamp(i64),
    Instant(DateTime<Utc>),
}

impl From<&str> for Expiry {
    fn from(value: &str) -> Self {
        Self::Duration(value.to_string())
    }
}

impl From<String> for Expiry {
    fn from(value: String) -> Self {
        Self::Duration(value)
    }
}

impl From<i64> for Expiry {
    fn from(value: i64) -> Self {
        Self::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Instant(value)
    }
}

impl TryFrom<serde_json::Value> for Expiry {
    type Error = ExpiryError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::String(s) => Ok(Self::Duration(s)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Timestamp)
                .ok_or_else(|| ExpiryError::UnsupportedType(n.to_string())),
            other => Err(ExpiryError::UnsupportedType(other.to_string())),
        }
    }
}

/// Resolve `expiry` against `now`.
pub fn resolve_expiry(expiry: &Expiry, now: DateTime<Utc>) -> Result<DateTime<Utc>, ExpiryError> {
    let expires = match expiry {
        Expiry::Duration(text) => add_duration(now, text)?,
        Expiry::Timestamp(seconds) => {
            if *seconds > MAX_EXPIRY_SECONDS {
                return Err(ExpiryError::NotInSeconds { value: *seconds });
            }
            DateTime::from_timestamp(*seconds, 0).ok_or(ExpiryError::OutOfRange)?
        }
        Expiry::Instant(at) => *at,
    };

    // `exp` is signed in whole seconds
    let expires =
        DateTime::from_timestamp(expires.timestamp(), 0).ok_or(ExpiryError::OutOfRange)?;
    if expires.timestamp() <= now.timestamp() {
        return Err(ExpiryError::BeforeNow { expires, now });
    }

    Ok(expires)
}

/// Parse a duration string into a fixed length of time.
///
/// Months count as 30 days and years as 365 days here; `resolve_expiry` adds
/// them on the calendar instead.
pub fn parse_duration(text: &str) -> Result<ChronoDuration, ExpiryError> {
    let offset = parse_offset(text)?;
    let month_days = i64::from(offset.months)
        .checked_mul(30)
        .ok_or(ExpiryError::OutOfRange)?;
    let months = ChronoDuration::try_days(month_days).ok_or(ExpiryError::OutOfRange)?;

    offset
        .delta
        .checked_add(&months)
        .ok_or(ExpiryError::OutOfRange)
}

fn add_duration(now: DateTime<Utc>, text: &str) -> Result<DateTime<Utc>, ExpiryError> {
    let offset = parse_offset(text)?;

    now.checked_add_months(Months::new(offset.months))
        .and_then(|at| at.checked_add_signed(offset.delta))
        .ok_or(ExpiryError::OutOfRange)
}

#[derive(Debug, Default)]
struct Offset {
    months: u32,
    delta: ChronoDuration,
}

enum Unit {
    Seconds(i64),
    Months(u32),
}

fn unit(name: &str) -> Option<Unit> {
    let unit = match name {
        "s" | "sec" | "secs" | "second" | "seconds" => Unit::Seconds(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Unit::Seconds(60),
        "h" | "hr" | "hrs" | "hour" | "hours" => Unit::Seconds(3_600),
        "d" | "day" | "days" => Unit::Seconds(86_400),
        "w" | "week" | "weeks" => Unit::Seconds(604_800),
        "mo" | "month" | "months" => Unit::Months(1),
        "y" | "yr" | "yrs" | "year" | "years" => Unit::Months(12),
        _ => return None,
    };
    Some(unit)
}

fn parse_offset(text: &str) -> Result<Offset, ExpiryError> {
    let invalid = || ExpiryError::InvalidDuration(text.to_string());
    let lowered = text.to_ascii_lowercase();
    let mut rest = lowered.trim();
    let mut offset = Offset::default();
    let mut pairs = 0usize;

    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: i64 = rest[..digits].parse().map_err(|_| ExpiryError::OutOfRange)?;
        rest = rest[digits..].trim_start();

        let letters = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let name = &rest[..letters];
        rest = rest[letters..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');

        match unit(name).ok_or_else(invalid)? {
            Unit::Seconds(factor) => {
                let seconds = amount.checked_mul(factor).ok_or(ExpiryError::OutOfRange)?;
                let delta = ChronoDuration::try_seconds(seconds).ok_or(ExpiryError::OutOfRange)?;
                offset.delta = offset
                    .delta
                    .checked_add(&delta)
                    .ok_or(ExpiryError::OutOfRange)?;
            }
            Unit::Months(factor) => {
                let months = u32::try_from(amount)
                    .ok()
                    .and_then(|n| n.checked_mul(factor))
                    .and_then(|n| offset.months.checked_add(n))
                    .ok_or(ExpiryError::OutOfRange)?;
                offset.months = months;
            }
        }
        pairs += 1;
    }

    if pairs == 0 {
        return Err(invalid());
    }

    Ok(offset)
}
