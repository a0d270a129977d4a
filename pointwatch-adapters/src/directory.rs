//! Directory adapter, looking up which pad each antenna sits on.
//!
//! The directory is a SOAP service exposing `getAntennasInfo(subArray)`.
//! Its reply carries an XML document, usually escaped inside the SOAP
//! return element:
//!
//! ```xml
//! <antennas>
//!   <antenna pad="A001">DA41-AS-01</antenna>
//!   <antenna pad="J505">dv01-AS-01</antenna>
//! </antennas>
//! ```
//!
//! Antenna names are normalized by stripping the fixed suffix and
//! upper-casing, so the sample set above becomes `DA41 -> A001`,
//! `DV01 -> J505`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pointwatch_adapters::directory::DirectoryAdapter;
//! use pointwatch_adapters::{Source, SourceKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = DirectoryAdapter::builder()
//!         .endpoint("http://vrfs.alma.cl/getAntInfoWS.php")
//!         .build()?;
//!
//!     let pads = adapter.fetch(&SourceKey::new("APE1")).await?;
//!     for (antenna, pad) in pads.iter() {
//!         println!("{antenna} on {}", pad.value);
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use pointwatch_types::{RawSample, SampleSet};

use crate::{Source, SourceError, SourceKey};

const DEFAULT_ENDPOINT: &str = "http://vrfs.alma.cl/getAntInfoWS.php";
const DEFAULT_SUFFIX: &str = "-AS-01";

/// One antenna and the pad it is deployed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntennaPad {
    pub antenna: String,
    pub pad: String,
}

/// Directory adapter for antenna-to-pad lookups.
#[derive(Debug, Clone)]
pub struct DirectoryAdapter {
    client: Client,
    endpoint: String,
    suffix: String,
    description: String,
}

impl DirectoryAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> DirectoryAdapterBuilder {
        DirectoryAdapterBuilder::default()
    }

    /// Look up the antennas of one sub-array.
    pub async fn antennas(&self, sub_array: &str) -> Result<Vec<AntennaPad>, SourceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "\"getAntennasInfo\"")
            .body(soap_request(sub_array))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Unreachable(format!(
                "directory returned status {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_antennas_xml(&body, &self.suffix)
    }
}

#[async_trait]
impl Source for DirectoryAdapter {
    async fn fetch(&self, key: &SourceKey) -> Result<SampleSet, SourceError> {
        let antennas = self.antennas(&key.path).await?;
        tracing::debug!(sub_array = %key.path, count = antennas.len(), "Directory lookup");
        Ok(antennas
            .into_iter()
            .map(|a| (a.antenna, RawSample::new(a.pad)))
            .collect())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for DirectoryAdapter.
#[derive(Debug, Default)]
pub struct DirectoryAdapterBuilder {
    endpoint: Option<String>,
    suffix: Option<String>,
    timeout: Option<Duration>,
}

impl DirectoryAdapterBuilder {
    /// Set the SOAP endpoint (default: the VRFS service).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the suffix stripped from antenna names (default: "-AS-01").
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> Result<DirectoryAdapter, SourceError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(DirectoryAdapter {
            client,
            description: format!("directory {endpoint}"),
            endpoint,
            suffix: self.suffix.unwrap_or_else(|| DEFAULT_SUFFIX.to_string()),
        })
    }
}

fn soap_request(sub_array: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
            "<soapenv:Body><getAntennasInfo><ste>{}</ste></getAntennasInfo></soapenv:Body>",
            "</soapenv:Envelope>"
        ),
        xml_escape(sub_array)
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Normalize a directory antenna name: strip the suffix and upper-case.
pub fn normalize_antenna_name(name: &str, suffix: &str) -> String {
    name.trim().replace(suffix, "").to_uppercase()
}

/// Extract the antenna list from a directory reply.
///
/// Accepts either a document with `<antenna>` elements at any depth, or a
/// SOAP envelope whose return element carries that document as escaped text.
pub fn parse_antennas_xml(body: &str, suffix: &str) -> Result<Vec<AntennaPad>, SourceError> {
    let doc = parse_fragment(body)?;

    if doc.descendants().any(|n| n.has_tag_name("antenna")) {
        return Ok(collect_antennas(&doc, suffix));
    }

    // The payload is escaped inside the SOAP return element.
    let inner = doc
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .find(|t| t.contains("<antenna"));

    match inner {
        Some(text) => {
            let inner_doc = parse_fragment(text)?;
            Ok(collect_antennas(&inner_doc, suffix))
        }
        None => Ok(Vec::new()),
    }
}

fn parse_fragment(text: &str) -> Result<roxmltree::Document<'_>, SourceError> {
    let text = strip_declaration(text.trim());
    roxmltree::Document::parse(text).map_err(|e| SourceError::MalformedResponse(e.to_string()))
}

fn strip_declaration(text: &str) -> &str {
    if text.starts_with("<?xml") {
        if let Some(end) = text.find("?>") {
            return text[end + 2..].trim_start();
        }
    }
    text
}

fn collect_antennas(doc: &roxmltree::Document<'_>, suffix: &str) -> Vec<AntennaPad> {
    doc.descendants()
        .filter(|n| n.has_tag_name("antenna"))
        .filter_map(|n| {
            let name = n.text()?;
            Some(AntennaPad {
                antenna: normalize_antenna_name(name, suffix),
                pad: n.attribute("pad").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"<?xml version="1.0"?>
<antennas>
  <antenna pad="A001">DA41-AS-01</antenna>
  <antenna pad="J505">dv01-AS-01</antenna>
</antennas>"#;

    const ENVELOPE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <ns1:getAntennasInfoResponse xmlns:ns1="urn:vrfs">
      <return>&lt;antennas&gt;&lt;antenna pad="T704"&gt;PM03-AS-01&lt;/antenna&gt;&lt;/antennas&gt;</return>
    </ns1:getAntennasInfoResponse>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn test_builder_defaults() {
        let adapter = DirectoryAdapter::builder().build().unwrap();
        assert_eq!(adapter.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(adapter.suffix, "-AS-01");
    }

    #[test]
    fn test_builder_custom() {
        let adapter = DirectoryAdapter::builder()
            .endpoint("http://localhost:8080/ws")
            .suffix("-X")
            .build()
            .unwrap();
        assert_eq!(adapter.endpoint, "http://localhost:8080/ws");
        assert_eq!(adapter.suffix, "-X");
        assert_eq!(adapter.description(), "directory http://localhost:8080/ws");
    }

    #[test]
    fn test_normalize_antenna_name() {
        assert_eq!(normalize_antenna_name("da41-AS-01", "-AS-01"), "DA41");
        assert_eq!(normalize_antenna_name(" CM12 ", "-AS-01"), "CM12");
    }

    #[test]
    fn test_parse_plain_document() {
        let antennas = parse_antennas_xml(PLAIN, DEFAULT_SUFFIX).unwrap();
        assert_eq!(
            antennas,
            vec![
                AntennaPad {
                    antenna: "DA41".into(),
                    pad: "A001".into()
                },
                AntennaPad {
                    antenna: "DV01".into(),
                    pad: "J505".into()
                },
            ]
        );
    }

    #[test]
    fn test_parse_escaped_envelope() {
        let antennas = parse_antennas_xml(ENVELOPE, DEFAULT_SUFFIX).unwrap();
        assert_eq!(antennas.len(), 1);
        assert_eq!(antennas[0].antenna, "PM03");
        assert_eq!(antennas[0].pad, "T704");
    }

    #[test]
    fn test_parse_empty_reply() {
        let antennas = parse_antennas_xml("<antennas/>", DEFAULT_SUFFIX).unwrap();
        assert!(antennas.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let err = parse_antennas_xml("<antennas><antenna>", DEFAULT_SUFFIX).unwrap_err();
        assert!(matches!(err, SourceError::MalformedResponse(_)));
    }

    #[test]
    fn test_soap_request_escapes() {
        let body = soap_request("A<B");
        assert!(body.contains("<ste>A&lt;B</ste>"));
    }
}
