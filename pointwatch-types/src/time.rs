//! Source timestamps and their normalization to UTC.
//!
//! The telemetry cache stamps samples in ACS time: a count of 100 ns ticks
//! since the start of the Gregorian calendar. Converting to Unix seconds is
//! `(ticks - 122192928000000000) / 10000000`.

use chrono::{DateTime, TimeZone, Utc};

/// ACS ticks at the Unix epoch.
pub const ACS_EPOCH_OFFSET_TICKS: i64 = 122_192_928_000_000_000;

/// ACS ticks per second.
pub const ACS_TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: i64 = 100;

/// A sample timestamp in the source's native epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceTimestamp {
    /// 100 ns ticks in the ACS epoch.
    AcsTicks(i64),
    /// Already a UTC instant.
    Utc(DateTime<Utc>),
}

impl SourceTimestamp {
    /// Normalize to a UTC instant.
    ///
    /// Returns `None` if the tick count is outside the representable range.
    pub fn normalize(&self) -> Option<DateTime<Utc>> {
        match self {
            SourceTimestamp::AcsTicks(ticks) => acs_ticks_to_utc(*ticks),
            SourceTimestamp::Utc(instant) => Some(*instant),
        }
    }
}

impl From<DateTime<Utc>> for SourceTimestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        SourceTimestamp::Utc(instant)
    }
}

/// Convert ACS ticks to fractional Unix seconds.
pub fn acs_ticks_to_unix_seconds(ticks: i64) -> f64 {
    (ticks - ACS_EPOCH_OFFSET_TICKS) as f64 / ACS_TICKS_PER_SECOND as f64
}

/// Convert ACS ticks to a UTC instant, keeping the full 100 ns precision.
pub fn acs_ticks_to_utc(ticks: i64) -> Option<DateTime<Utc>> {
    let since_unix = ticks.checked_sub(ACS_EPOCH_OFFSET_TICKS)?;
    let secs = since_unix.div_euclid(ACS_TICKS_PER_SECOND);
    let sub_ticks = since_unix.rem_euclid(ACS_TICKS_PER_SECOND);
    let nanos = u32::try_from(sub_ticks * NANOS_PER_TICK).ok()?;
    Utc.timestamp_opt(secs, nanos).single()
}

/// Convert a UTC instant to ACS ticks.
///
/// Sub-tick precision is truncated. `None` when the instant is outside the
/// range ACS ticks can represent.
pub fn utc_to_acs_ticks(instant: DateTime<Utc>) -> Option<i64> {
    let secs = instant.timestamp();
    let sub_ticks = i64::from(instant.timestamp_subsec_nanos()) / NANOS_PER_TICK;
    secs.checked_mul(ACS_TICKS_PER_SECOND)?
        .checked_add(sub_ticks)?
        .checked_add(ACS_EPOCH_OFFSET_TICKS)
}

/// Parse a tick count that may be written as an integer or a float.
pub fn parse_acs_ticks(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(ticks) = text.parse::<i64>() {
        return Some(ticks);
    }
    let ticks = text.parse::<f64>().ok()?;
    if ticks.is_finite() {
        Some(ticks as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_is_offset() {
        assert_eq!(acs_ticks_to_unix_seconds(ACS_EPOCH_OFFSET_TICKS), 0.0);
        assert_eq!(
            acs_ticks_to_utc(ACS_EPOCH_OFFSET_TICKS),
            Utc.timestamp_opt(0, 0).single()
        );
    }

    #[test]
    fn seconds_formula() {
        let ticks = ACS_EPOCH_OFFSET_TICKS + 1_000 * ACS_TICKS_PER_SECOND + 5_000_000;
        assert_eq!(acs_ticks_to_unix_seconds(ticks), 1_000.5);
    }

    #[test]
    fn normalize_denormalize_roundtrip() {
        let instants = [
            Utc.timestamp_opt(0, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 123_456_700).unwrap(),
            Utc.timestamp_opt(1_234_567_890, 100).unwrap(),
            Utc.timestamp_opt(-86_400, 999_999_900).unwrap(),
        ];
        for t in instants {
            let ticks = utc_to_acs_ticks(t).unwrap();
            assert_eq!(SourceTimestamp::AcsTicks(ticks).normalize(), Some(t));
        }
    }

    #[test]
    fn denormalize_out_of_range() {
        assert_eq!(utc_to_acs_ticks(DateTime::<Utc>::MAX_UTC), None);
        assert_eq!(utc_to_acs_ticks(DateTime::<Utc>::MIN_UTC), None);
    }

    #[test]
    fn denormalize_truncates_sub_tick() {
        let t = Utc.timestamp_opt(10, 150).unwrap();
        let back = acs_ticks_to_utc(utc_to_acs_ticks(t).unwrap()).unwrap();
        assert_eq!(back, Utc.timestamp_opt(10, 100).unwrap());
    }

    #[test]
    fn parse_ticks_integer_and_float() {
        assert_eq!(parse_acs_ticks("138000000000000000"), Some(138_000_000_000_000_000));
        assert_eq!(parse_acs_ticks(" 1.5e3 "), Some(1500));
        assert_eq!(parse_acs_ticks("abc"), None);
        assert_eq!(parse_acs_ticks("inf"), None);
    }

    #[test]
    fn utc_timestamp_passthrough() {
        let t = Utc.timestamp_opt(42, 0).unwrap();
        assert_eq!(SourceTimestamp::from(t).normalize(), Some(t));
    }
}
