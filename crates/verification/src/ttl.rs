//! Time-to-live handling for stored assets.
//!
//! A TTL is resolved to an absolute expiry once, at write time. Three forms
//! are accepted:
//!
//! ```text
//! Ttl::Never                      → never expires
//! Ttl::Seconds(900)               → now + 900s
//! Ttl::Expression("15 minutes")   → "+15 minutes" from now
//! Ttl::Expression("+1 day 2 hours")
//! ```

use chrono::{DateTime, Months, TimeDelta, Utc};
use thiserror::Error;

/// Lifetime requested for a new asset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Ttl {
    #[default]
    Never,
    Seconds(i64),
    /// Relative expression such as `"15 minutes"` or `"+1 day 2 hours"`.
    Expression(String),
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Ttl::Seconds(secs)
    }
}

impl From<&str> for Ttl {
    fn from(expr: &str) -> Self {
        Ttl::Expression(expr.to_string())
    }
}

impl From<String> for Ttl {
    fn from(expr: String) -> Self {
        Ttl::Expression(expr)
    }
}

impl<T: Into<Ttl>> From<Option<T>> for Ttl {
    fn from(ttl: Option<T>) -> Self {
        ttl.map(Into::into).unwrap_or(Ttl::Never)
    }
}

/// Reason a TTL was declined.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TtlError {
    #[error("ttl must be positive, got {0}")]
    NotPositive(i64),

    #[error("ttl expression is empty")]
    Empty,

    #[error("ttl expression must not be negative: {0:?}")]
    Negative(String),

    #[error("unrecognised ttl expression: {0:?}")]
    Unparseable(String),

    #[error("ttl resolves to an unrepresentable time")]
    OutOfRange,

    #[error("ttl resolves to a time in the past")]
    InPast,
}

impl Ttl {
    /// Resolve to an absolute expiry relative to `now`. `Ok(None)` means the
    /// asset never expires.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, TtlError> {
        match self {
            Ttl::Never => Ok(None),
            Ttl::Seconds(secs) => after_seconds(now, *secs).map(Some),
            Ttl::Expression(expr) => resolve_expression(expr, now).map(Some),
        }
    }
}

fn after_seconds(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, TtlError> {
    if secs <= 0 {
        return Err(TtlError::NotPositive(secs));
    }
    let delta = TimeDelta::try_seconds(secs).ok_or(TtlError::OutOfRange)?;
    now.checked_add_signed(delta).ok_or(TtlError::OutOfRange)
}

fn resolve_expression(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TtlError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TtlError::Empty);
    }
    if expr.starts_with('-') {
        return Err(TtlError::Negative(expr.to_string()));
    }

    // An unsigned expression always means "from now".
    let unsigned = expr.strip_prefix('+').unwrap_or(expr).trim_start();

    // Bare numbers are seconds
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        let secs = unsigned
            .parse::<i64>()
            .map_err(|_| TtlError::OutOfRange)?;
        return after_seconds(now, secs);
    }

    let mut at = now;
    for (amount, unit) in parse_groups(unsigned)? {
        at = unit.apply(at, amount).ok_or(TtlError::OutOfRange)?;
    }

    if at.timestamp() <= 0 {
        return Err(TtlError::OutOfRange);
    }
    if at <= now {
        return Err(TtlError::InPast);
    }
    Ok(at)
}

/// Split an expression into signed `(amount, unit)` groups.
fn parse_groups(expr: &str) -> Result<Vec<(i64, Unit)>, TtlError> {
    let unparseable = || TtlError::Unparseable(expr.to_string());

    let mut groups = Vec::new();
    let mut rest = expr.trim_start();

    while !rest.is_empty() {
        let (sign, tail) = if let Some(tail) = rest.strip_prefix('+') {
            (1, tail)
        } else if let Some(tail) = rest.strip_prefix('-') {
            (-1, tail)
        } else {
            (1, rest)
        };

        let tail = tail.trim_start();
        let digits = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return Err(unparseable());
        }
        let (number, tail) = tail.split_at(digits);
        let amount: i64 = number.parse().map_err(|_| TtlError::OutOfRange)?;

        let tail = tail.trim_start();
        let letters = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_alphabetic()).len();
        let (word, tail) = tail.split_at(letters);
        let unit = Unit::parse(word).ok_or_else(unparseable)?;

        groups.push((sign * amount, unit));
        rest = tail.trim_start();
    }

    if groups.is_empty() {
        return Err(unparseable());
    }
    Ok(groups)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

impl Unit {
    fn parse(word: &str) -> Option<Self> {
        let unit = match word.to_ascii_lowercase().as_str() {
            "sec" | "secs" | "second" | "seconds" => Unit::Second,
            "min" | "mins" | "minute" | "minutes" => Unit::Minute,
            "hour" | "hours" => Unit::Hour,
            "day" | "days" => Unit::Day,
            "week" | "weeks" => Unit::Week,
            "fortnight" | "fortnights" => Unit::Fortnight,
            "month" | "months" => Unit::Month,
            "year" | "years" => Unit::Year,
            _ => return None,
        };
        Some(unit)
    }

    fn apply(self, at: DateTime<Utc>, amount: i64) -> Option<DateTime<Utc>> {
        let delta = match self {
            Unit::Second => TimeDelta::try_seconds(amount)?,
            Unit::Minute => TimeDelta::try_minutes(amount)?,
            Unit::Hour => TimeDelta::try_hours(amount)?,
            Unit::Day => TimeDelta::try_days(amount)?,
            Unit::Week => TimeDelta::try_weeks(amount)?,
            Unit::Fortnight => TimeDelta::try_weeks(amount.checked_mul(2)?)?,
            Unit::Month => return add_months(at, amount),
            Unit::Year => return add_months(at, amount.checked_mul(12)?),
        };
        at.checked_add_signed(delta)
    }
}

/// Calendar month arithmetic; the day is clamped to the end of shorter months.
fn add_months(at: DateTime<Utc>, amount: i64) -> Option<DateTime<Utc>> {
    let months = Months::new(u32::try_from(amount.unsigned_abs()).ok()?);
    if amount >= 0 {
        at.checked_add_months(months)
    } else {
        at.checked_sub_months(months)
    }
}
