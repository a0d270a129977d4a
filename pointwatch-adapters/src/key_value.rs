//! Key-value adapter, reading the telemetry cache.
//!
//! Every monitor point of a component is a Redis list under
//! `{namespace}:{componentPath}:{point}`. The most recent element is a
//! record of the form
//!
//! ```text
//! <header>|<startTicks>;<endTicks>;...;<value>
//! ```
//!
//! where the value is the text after the last `;` and the end time (ACS
//! ticks) is the second `;`-separated field after the first `|`.
//!
//! Component names may be given in their underscore form
//! (`CONTROL_CentralLO_MLD_10b7c33e01080095`). Underscores become path
//! separators, except the one following a preserved token such as `MLD`,
//! so the example maps to `CONTROL/CentralLO/MLD_10b7c33e01080095`.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use pointwatch_types::time::parse_acs_ticks;
use pointwatch_types::{RawSample, SampleSet, SourceTimestamp};

use crate::{Source, SourceError, SourceKey};

const DEFAULT_URL: &str = "redis://metis.osf.alma.cl:6379/0";
const DEFAULT_NAMESPACE: &str = "TMCS";
const DEFAULT_PRESERVED: [&str; 3] = ["MLD", "ML", "ML2"];

/// Key-value telemetry cache adapter.
#[derive(Debug, Clone)]
pub struct KeyValueAdapter {
    client: redis::Client,
    namespace: String,
    preserved_tokens: Vec<String>,
    connect_timeout: Duration,
    description: String,
}

impl KeyValueAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> KeyValueAdapterBuilder {
        KeyValueAdapterBuilder::default()
    }

    /// The key pattern scanned for `component`.
    pub fn pattern_for(&self, component: &str) -> String {
        channel_pattern(&self.namespace, component, &self.preserved_tokens)
    }
}

#[async_trait]
impl Source for KeyValueAdapter {
    async fn fetch(&self, key: &SourceKey) -> Result<SampleSet, SourceError> {
        let pattern = self.pattern_for(&key.path);

        let mut conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| SourceError::Timeout)??;

        let keys: Vec<String> = conn.keys(&pattern).await?;
        if keys.is_empty() {
            return Err(SourceError::KeyNotFound(pattern));
        }

        let mut samples = SampleSet::new();
        for list_key in keys {
            let Some(point) = point_name(&list_key) else {
                continue;
            };

            let latest: Option<String> = conn.lindex(&list_key, -1).await?;
            let Some(record) = latest else {
                tracing::debug!(key = %list_key, "Empty monitor point list");
                continue;
            };

            match parse_record(&record) {
                Ok(sample) => samples.insert(point, sample),
                Err(e) => tracing::warn!(key = %list_key, error = %e, "Skipping unreadable record"),
            }
        }

        Ok(samples)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for KeyValueAdapter.
#[derive(Debug, Default)]
pub struct KeyValueAdapterBuilder {
    url: Option<String>,
    namespace: Option<String>,
    preserved_tokens: Option<Vec<String>>,
    connect_timeout: Option<Duration>,
}

impl KeyValueAdapterBuilder {
    /// Set the Redis URL (e.g., "redis://localhost:6379/0").
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the key namespace (default: "TMCS").
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the tokens whose trailing underscore is kept in component paths.
    pub fn preserved_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserved_tokens = Some(tokens.into_iter().map(Into::into).collect());
        self
    }

    /// Set the connection timeout (default: 5 seconds).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the adapter.
    ///
    /// Fails if the URL cannot be parsed. No connection is opened here.
    pub fn build(self) -> Result<KeyValueAdapter, SourceError> {
        let url = self.url.unwrap_or_else(|| DEFAULT_URL.to_string());
        let client = redis::Client::open(url.as_str())
            .map_err(|e| SourceError::Unreachable(format!("invalid redis url {url}: {e}")))?;

        Ok(KeyValueAdapter {
            client,
            namespace: self
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            preserved_tokens: self
                .preserved_tokens
                .unwrap_or_else(|| DEFAULT_PRESERVED.iter().map(|t| t.to_string()).collect()),
            connect_timeout: self.connect_timeout.unwrap_or(Duration::from_secs(5)),
            description: format!("key-value {url}"),
        })
    }
}

/// Map a component name to its path form.
///
/// `_` becomes `/`, except right after a segment equal to one of
/// `preserved`.
pub fn component_path(component: &str, preserved: &[String]) -> String {
    let mut path = String::with_capacity(component.len());
    let mut segments = component.split('_').peekable();
    while let Some(segment) = segments.next() {
        path.push_str(segment);
        if segments.peek().is_some() {
            let keep = preserved.iter().any(|t| t == segment);
            path.push(if keep { '_' } else { '/' });
        }
    }
    path
}

/// The wildcard pattern matching every point of a component.
pub fn channel_pattern(namespace: &str, component: &str, preserved: &[String]) -> String {
    format!("{}:{}:*", namespace, component_path(component, preserved))
}

fn point_name(list_key: &str) -> Option<String> {
    list_key
        .rsplit_once(':')
        .map(|(_, point)| point.to_string())
        .filter(|p| !p.is_empty())
}

/// Split a cached record into its value and end timestamp.
pub fn parse_record(record: &str) -> Result<RawSample, SourceError> {
    let value = record.rsplit(';').next().unwrap_or_default().trim();

    let time_struct = record
        .split('|')
        .nth(1)
        .ok_or_else(|| SourceError::MalformedResponse(format!("no time struct in '{record}'")))?;

    let end = time_struct
        .split(';')
        .nth(1)
        .ok_or_else(|| SourceError::MalformedResponse(format!("no end time in '{record}'")))?;

    let ticks = parse_acs_ticks(end)
        .ok_or_else(|| SourceError::MalformedResponse(format!("bad end time '{end}'")))?;

    Ok(RawSample::stamped(value, SourceTimestamp::AcsTicks(ticks)))
}
