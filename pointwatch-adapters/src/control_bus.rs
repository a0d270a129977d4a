//! Control bus adapter, invoking component methods over the REST gateway.
//!
//! Each request names a component, a method and its arguments:
//!
//! ```json
//! {"componentName": "CONTROL/DA41/PSA", "methodName": "getHwState", "arguments": {}}
//! ```
//!
//! Replies wrap the value in one or more `data` envelopes. `getHwState`
//! answers `{"data": {"data": {"_n": "Operational"}}}`, while register
//! getters answer `{"data": ["1"]}`.
//!
//! ## Errors
//!
//! - HTTP failure status: [`SourceError::Unreachable`]
//! - Body is not JSON: [`SourceError::MalformedResponse`]
//! - HTTP success with an empty payload: [`SourceError::KeyNotFound`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use pointwatch_types::{RawSample, SampleSet};

use crate::{Source, SourceError, SourceKey};

const DEFAULT_ENDPOINT: &str = "http://acse2-gas02.sco.alma.cl:9000";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Invocation<'a> {
    component_name: &'a str,
    method_name: &'a str,
    arguments: &'a serde_json::Map<String, Value>,
}

/// Control bus adapter.
#[derive(Debug, Clone)]
pub struct ControlBusAdapter {
    client: Client,
    endpoint: String,
    description: String,
}

impl ControlBusAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> ControlBusAdapterBuilder {
        ControlBusAdapterBuilder::default()
    }

    /// Invoke `method` on `component` and return the unwrapped value.
    pub async fn invoke(&self, component: &str, method: &str) -> Result<String, SourceError> {
        let arguments = serde_json::Map::new();
        let request = Invocation {
            component_name: component,
            method_name: method,
            arguments: &arguments,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Unreachable(format!(
                "control bus returned status {} for {component}.{method}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let reply: Value = serde_json::from_str(&body)?;

        unwrap_payload(&reply)
            .ok_or_else(|| SourceError::KeyNotFound(format!("{component}.{method}: empty payload")))
    }
}

#[async_trait]
impl Source for ControlBusAdapter {
    async fn fetch(&self, key: &SourceKey) -> Result<SampleSet, SourceError> {
        let method = key
            .method
            .as_deref()
            .ok_or_else(|| SourceError::KeyNotFound(format!("{}: no method given", key.path)))?;
        let value = self.invoke(&key.path, method).await?;
        Ok(SampleSet::new().with(method, RawSample::new(value)))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for ControlBusAdapter.
#[derive(Debug, Default)]
pub struct ControlBusAdapterBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl ControlBusAdapterBuilder {
    /// Set the REST gateway endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> Result<ControlBusAdapter, SourceError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(ControlBusAdapter {
            client,
            description: format!("control bus {endpoint}"),
            endpoint,
        })
    }
}

/// Unwrap the value from a control bus reply.
///
/// Descends through `data` keys, takes the first element of arrays and the
/// `_n` member of enum objects. Returns `None` when nothing is left.
pub fn unwrap_payload(reply: &Value) -> Option<String> {
    let mut current = reply;
    loop {
        current = match current {
            Value::Object(map) => map.get("data").or_else(|| map.get("_n"))?,
            Value::Array(items) => items.first()?,
            Value::String(s) if s.is_empty() => return None,
            Value::String(s) => return Some(s.clone()),
            Value::Number(n) => return Some(n.to_string()),
            Value::Bool(b) => return Some(b.to_string()),
            Value::Null => return None,
        };
    }
}
