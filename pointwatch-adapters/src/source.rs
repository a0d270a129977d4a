//! The source adapter contract.
//!
//! Every transport implements [`Source`]: fetch the raw samples for a
//! logical key, or fail with a typed [`SourceError`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use pointwatch_types::SampleSet;

use crate::SourceError;

/// A logical key understood by a source.
///
/// `path` is the component, sub-array or unit the source should look up.
/// `method` is only used by sources that invoke a named operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub path: String,
    pub method: Option<String>,
}

impl SourceKey {
    /// A key with only a path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: None,
        }
    }

    /// A key naming a method to invoke on `path`.
    pub fn method(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Some(method.into()),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{}.{}", self.path, method),
            None => f.write_str(&self.path),
        }
    }
}

/// Something that can be asked for raw samples.
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    /// Fetch the samples for `key`.
    async fn fetch(&self, key: &SourceKey) -> Result<SampleSet, SourceError>;

    /// Short human readable description, used in logs.
    fn description(&self) -> &str;
}

/// Fetch with an upper bound on how long the source may take.
///
/// An elapsed timeout is reported as [`SourceError::Timeout`].
pub async fn fetch_with_timeout(
    source: &dyn Source,
    key: &SourceKey,
    timeout: Duration,
) -> Result<SampleSet, SourceError> {
    match tokio::time::timeout(timeout, source.fetch(key)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout),
    }
}

/// The built-in transports, as one tagged union.
#[cfg(any(
    feature = "directory",
    feature = "control-bus",
    feature = "key-value",
    feature = "field-bus"
))]
#[derive(Debug, Clone)]
pub enum SourceAdapter {
    #[cfg(feature = "directory")]
    Directory(crate::directory::DirectoryAdapter),
    #[cfg(feature = "control-bus")]
    ControlBus(crate::control_bus::ControlBusAdapter),
    #[cfg(feature = "key-value")]
    KeyValue(crate::key_value::KeyValueAdapter),
    #[cfg(feature = "field-bus")]
    FieldBus(crate::field_bus::FieldBusAdapter),
}

#[cfg(any(
    feature = "directory",
    feature = "control-bus",
    feature = "key-value",
    feature = "field-bus"
))]
#[async_trait]
impl Source for SourceAdapter {
    async fn fetch(&self, key: &SourceKey) -> Result<SampleSet, SourceError> {
        match self {
            #[cfg(feature = "directory")]
            SourceAdapter::Directory(adapter) => adapter.fetch(key).await,
            #[cfg(feature = "control-bus")]
            SourceAdapter::ControlBus(adapter) => adapter.fetch(key).await,
            #[cfg(feature = "key-value")]
            SourceAdapter::KeyValue(adapter) => adapter.fetch(key).await,
            #[cfg(feature = "field-bus")]
            SourceAdapter::FieldBus(adapter) => adapter.fetch(key).await,
        }
    }

    fn description(&self) -> &str {
        match self {
            #[cfg(feature = "directory")]
            SourceAdapter::Directory(adapter) => adapter.description(),
            #[cfg(feature = "control-bus")]
            SourceAdapter::ControlBus(adapter) => adapter.description(),
            #[cfg(feature = "key-value")]
            SourceAdapter::KeyValue(adapter) => adapter.description(),
            #[cfg(feature = "field-bus")]
            SourceAdapter::FieldBus(adapter) => adapter.description(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointwatch_types::RawSample;

    #[derive(Debug)]
    struct Slow;

    #[async_trait]
    impl Source for Slow {
        async fn fetch(&self, _key: &SourceKey) -> Result<SampleSet, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SampleSet::new().with("X", RawSample::new("1")))
        }

        fn description(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn test_key_display() {
        assert_eq!(SourceKey::new("CONTROL/DA41/CMPR").to_string(), "CONTROL/DA41/CMPR");
        assert_eq!(
            SourceKey::method("CONTROL/DA41/PSA", "getHwState").to_string(),
            "CONTROL/DA41/PSA.getHwState"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_is_reported() {
        let err = fetch_with_timeout(&Slow, &SourceKey::new("X"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_within_timeout() {
        let set = fetch_with_timeout(&Slow, &SourceKey::new("X"), Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(set.get("X").map(|s| s.value.as_str()), Some("1"));
    }
}
