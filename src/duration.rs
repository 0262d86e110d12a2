//! Textual durations and the `validAfter`/`validBefore` time values.
//!
//! Durations use the compact unit notation found in CA configuration files:
//! an optional sign followed by one or more `<number><unit>` groups, such as
//! `"300ms"`, `"-1.5h"` or `"2h45m"`. Valid units are `ns`, `us` (or `µs`),
//! `ms`, `s`, `m` and `h`.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {0:?}")]
pub struct DurationError(pub String);

/// Parses a duration string like `"1h30m"` or `"-250ms"`.
pub fn parse_duration(text: &str) -> Result<TimeDelta, DurationError> {
    let invalid = || DurationError(text.to_string());

    let (negative, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    if rest == "0" {
        return Ok(TimeDelta::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => NANOS_PER_MINUTE,
            "h" => NANOS_PER_HOUR,
            _ => return Err(invalid()),
        } as u128;
        rest = &rest[unit_len..];

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        total = whole
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;

        // Digits beyond nanosecond precision cannot contribute.
        let frac_part = &frac_part[..frac_part.len().min(18)];
        if !frac_part.is_empty() {
            let numerator: u128 = frac_part.parse().map_err(|_| invalid())?;
            let scale = 10u128.pow(frac_part.len() as u32);
            total = total
                .checked_add(numerator * unit / scale)
                .ok_or_else(invalid)?;
        }
    }

    let nanos = i64::try_from(total).map_err(|_| invalid())?;
    Ok(TimeDelta::nanoseconds(if negative { -nanos } else { nanos }))
}

/// Formats a duration in its canonical form, e.g. `"5m0s"`, `"24h0m0s"`,
/// `"1.5s"` or `"300ms"`.
pub fn format_duration(duration: TimeDelta) -> String {
    let nanos = duration.num_nanoseconds().unwrap_or(i64::MAX);
    if nanos == 0 {
        return "0s".to_string();
    }

    let magnitude = nanos.unsigned_abs();
    let mut out = String::new();
    if nanos < 0 {
        out.push('-');
    }

    if magnitude < NANOS_PER_SECOND {
        let (unit, divisor) = if magnitude < NANOS_PER_MICRO {
            ("ns", 1)
        } else if magnitude < NANOS_PER_MILLI {
            ("µs", NANOS_PER_MICRO)
        } else {
            ("ms", NANOS_PER_MILLI)
        };
        out.push_str(&format_fraction(magnitude, divisor));
        out.push_str(unit);
        return out;
    }

    let hours = magnitude / NANOS_PER_HOUR;
    let minutes = magnitude % NANOS_PER_HOUR / NANOS_PER_MINUTE;
    let seconds = magnitude % NANOS_PER_MINUTE;
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format_fraction(seconds, NANOS_PER_SECOND));
    out.push('s');
    out
}

fn format_fraction(value: u64, divisor: u64) -> String {
    let whole = value / divisor;
    let frac = value % divisor;
    if frac == 0 {
        return whole.to_string();
    }
    let width = divisor.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// A point in time given either absolutely (RFC 3339) or relative to the
/// moment a certificate is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeDuration {
    #[default]
    Unset,
    Time(DateTime<Utc>),
    Relative(TimeDelta),
}

impl TimeDuration {
    pub fn parse(text: &str) -> Result<Self, DurationError> {
        if text.is_empty() {
            return Ok(TimeDuration::Unset);
        }
        if let Ok(time) = DateTime::parse_from_rfc3339(text) {
            return Ok(TimeDuration::Time(time.with_timezone(&Utc)));
        }
        parse_duration(text).map(TimeDuration::Relative)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, TimeDuration::Unset)
    }

    /// Resolves the value against `now`. Unset values resolve to `None`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeDuration::Unset => None,
            TimeDuration::Time(time) => Some(*time),
            TimeDuration::Relative(delta) => Some(now + *delta),
        }
    }
}

impl fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeDuration::Unset => Ok(()),
            TimeDuration::Time(time) => {
                f.write_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            TimeDuration::Relative(delta) => f.write_str(&format_duration(*delta)),
        }
    }
}

impl Serialize for TimeDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        TimeDuration::parse(&text).map_err(de::Error::custom)
    }
}
