//! Raw samples as returned by sources.

use std::collections::BTreeMap;

use crate::SourceTimestamp;

/// A single raw value as read from a source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSample {
    /// The value, still in its textual source form.
    pub value: String,

    /// When the source produced the value, if it says.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub timestamp: Option<SourceTimestamp>,
}

impl RawSample {
    /// A sample without a timestamp.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            timestamp: None,
        }
    }

    /// A sample stamped by the source.
    pub fn stamped(value: impl Into<String>, timestamp: impl Into<SourceTimestamp>) -> Self {
        Self {
            value: value.into(),
            timestamp: Some(timestamp.into()),
        }
    }
}

/// All samples returned by one fetch, keyed by field name.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SampleSet {
    samples: BTreeMap<String, RawSample>,
}

impl SampleSet {
    /// Create an empty sample set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a sample.
    pub fn insert(&mut self, field: impl Into<String>, sample: RawSample) {
        self.samples.insert(field.into(), sample);
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, sample: RawSample) -> Self {
        self.insert(field, sample);
        self
    }

    /// Look up a field.
    pub fn get(&self, field: &str) -> Option<&RawSample> {
        self.samples.get(field)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over all samples in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawSample)> {
        self.samples.iter()
    }
}

impl FromIterator<(String, RawSample)> for SampleSet {
    fn from_iter<T: IntoIterator<Item = (String, RawSample)>>(iter: T) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}
