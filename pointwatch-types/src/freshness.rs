//! Freshness filtering of timestamped samples.
//!
//! A sample is fresh when `|now - normalize(ts)| <= tolerance`. Samples
//! without a timestamp are never filtered.
//!
//! What happens to a stale or missing field depends on its [`FieldPolicy`]:
//!
//! | policy     | missing       | stale                     |
//! |------------|---------------|---------------------------|
//! | `Required` | abort unit    | abort unit                |
//! | `Optional` | skip field    | skip field                |
//! | `Sentinel` | skip field    | publish [`STALE_SENTINEL`] |

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{ErrorKind, RawSample};

/// Value published in place of a stale sample under [`FieldPolicy::Sentinel`].
pub const STALE_SENTINEL: &str = "nan";

/// Outcome of checking one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    /// The sample can be trusted.
    Fresh(String),
    /// The sample is too far from `now`, in either direction.
    Stale { age: Duration },
}

impl Freshness {
    /// Check if the sample was fresh.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh(_))
    }
}

/// How to treat a field that is stale or missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldPolicy {
    /// The field is load-bearing: without it nothing is published for the unit.
    Required,
    /// The field is a leaf measurement: skip it silently.
    #[default]
    Optional,
    /// Like `Optional` for missing fields, but a stale value is published as
    /// the NaN sentinel.
    Sentinel,
}

impl fmt::Display for FieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldPolicy::Required => "required",
            FieldPolicy::Optional => "optional",
            FieldPolicy::Sentinel => "sentinel",
        };
        f.write_str(name)
    }
}

/// A required field could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FreshnessError {
    #[error("required field '{field}' is missing")]
    Missing { field: String },

    #[error("required field '{field}' is stale by {age:?}")]
    Stale { field: String, age: Duration },
}

impl FreshnessError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FreshnessError::Missing { .. } => ErrorKind::KeyNotFound,
            FreshnessError::Stale { .. } => ErrorKind::StaleData,
        }
    }
}

/// Checks sample timestamps against a tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessFilter {
    tolerance: Duration,
}

impl FreshnessFilter {
    /// Create a filter with the given tolerance.
    pub const fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// The configured tolerance.
    pub const fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Decide whether a sample is fresh at `now`.
    pub fn evaluate(&self, sample: &RawSample, now: DateTime<Utc>) -> Freshness {
        let Some(timestamp) = sample.timestamp else {
            return Freshness::Fresh(sample.value.clone());
        };
        let Some(produced) = timestamp.normalize() else {
            return Freshness::Stale { age: Duration::MAX };
        };
        let skew = now - produced;
        let skew = if skew < chrono::Duration::zero() { -skew } else { skew };
        let age = skew.to_std().unwrap_or(Duration::MAX);
        if age <= self.tolerance {
            Freshness::Fresh(sample.value.clone())
        } else {
            Freshness::Stale { age }
        }
    }

    /// Apply a field policy to a possibly missing sample.
    ///
    /// Returns `Ok(Some(value))` when a record should be emitted, `Ok(None)`
    /// when the field is skipped and `Err` when a required field is unusable.
    pub fn resolve(
        &self,
        policy: FieldPolicy,
        field: &str,
        sample: Option<&RawSample>,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, FreshnessError> {
        let Some(sample) = sample else {
            return match policy {
                FieldPolicy::Required => Err(FreshnessError::Missing {
                    field: field.to_string(),
                }),
                FieldPolicy::Optional | FieldPolicy::Sentinel => Ok(None),
            };
        };

        match (self.evaluate(sample, now), policy) {
            (Freshness::Fresh(value), _) => Ok(Some(value)),
            (Freshness::Stale { age }, FieldPolicy::Required) => Err(FreshnessError::Stale {
                field: field.to_string(),
                age,
            }),
            (Freshness::Stale { .. }, FieldPolicy::Optional) => Ok(None),
            (Freshness::Stale { .. }, FieldPolicy::Sentinel) => Ok(Some(STALE_SENTINEL.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::time::utc_to_acs_ticks;
    use crate::SourceTimestamp;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn sample_aged(secs: i64) -> RawSample {
        let produced = now() - chrono::Duration::seconds(secs);
        RawSample::stamped("1.0", SourceTimestamp::AcsTicks(utc_to_acs_ticks(produced).unwrap()))
    }

    #[test]
    fn within_tolerance_is_fresh() {
        let filter = FreshnessFilter::new(Duration::from_secs(100));
        for age in [0, 1, 50, 99, 100] {
            assert_eq!(
                filter.evaluate(&sample_aged(age), now()),
                Freshness::Fresh("1.0".to_string()),
                "age {age}"
            );
        }
    }

    #[test]
    fn outside_tolerance_is_stale() {
        let filter = FreshnessFilter::new(Duration::from_secs(100));
        for age in [101, 1_000, 86_400] {
            let decision = filter.evaluate(&sample_aged(age), now());
            assert_eq!(
                decision,
                Freshness::Stale {
                    age: Duration::from_secs(age as u64)
                }
            );
        }
    }

    #[test]
    fn future_samples_use_absolute_skew() {
        let filter = FreshnessFilter::new(Duration::from_secs(10));
        assert!(filter.evaluate(&sample_aged(-5), now()).is_fresh());
        assert!(!filter.evaluate(&sample_aged(-11), now()).is_fresh());
    }

    #[test]
    fn unstamped_samples_are_fresh() {
        let filter = FreshnessFilter::new(Duration::ZERO);
        assert!(filter.evaluate(&RawSample::new("x"), now()).is_fresh());
    }

    #[test]
    fn unrepresentable_timestamp_is_stale() {
        let filter = FreshnessFilter::new(Duration::from_secs(100));
        let sample = RawSample::stamped("1.0", SourceTimestamp::AcsTicks(i64::MIN));
        assert!(!filter.evaluate(&sample, now()).is_fresh());
    }

    #[test]
    fn required_policy() {
        let filter = FreshnessFilter::new(Duration::from_secs(100));

        let fresh = sample_aged(1);
        assert_eq!(
            filter.resolve(FieldPolicy::Required, "INPUT_SWITCH", Some(&fresh), now()),
            Ok(Some("1.0".to_string()))
        );

        let err = filter
            .resolve(FieldPolicy::Required, "INPUT_SWITCH", None, now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);

        let stale = sample_aged(500);
        let err = filter
            .resolve(FieldPolicy::Required, "INPUT_SWITCH", Some(&stale), now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleData);
    }

    #[test]
    fn optional_policy_skips() {
        let filter = FreshnessFilter::new(Duration::from_secs(100));
        let stale = sample_aged(500);
        assert_eq!(filter.resolve(FieldPolicy::Optional, "F", None, now()), Ok(None));
        assert_eq!(
            filter.resolve(FieldPolicy::Optional, "F", Some(&stale), now()),
            Ok(None)
        );
    }

    #[test]
    fn sentinel_policy_publishes_nan_for_stale() {
        let filter = FreshnessFilter::new(Duration::from_secs(100));
        let stale = sample_aged(500);
        assert_eq!(filter.resolve(FieldPolicy::Sentinel, "F", None, now()), Ok(None));
        assert_eq!(
            filter.resolve(FieldPolicy::Sentinel, "F", Some(&stale), now()),
            Ok(Some(STALE_SENTINEL.to_string()))
        );
    }
}
