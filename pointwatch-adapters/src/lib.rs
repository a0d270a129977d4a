//! # pointwatch-adapters
//!
//! Source adapters for harvesting monitor points.
//!
//! Every adapter implements the [`Source`] contract: fetch the raw samples
//! for a logical key, or fail with a typed [`SourceError`]. The harvesting
//! pipeline only ever sees that contract.
//!
//! ## Supported Sources
//!
//! - **Directory** (`directory` feature) - Antenna-to-pad lookups through the
//!   SOAP directory service
//! - **Control bus** (`control-bus` feature) - Component method invocations
//!   through the REST gateway
//! - **Key-value** (`key-value` feature) - Timestamped monitor points from the
//!   Redis telemetry cache
//! - **Field bus** (`field-bus` feature) - Utility module discrete inputs over
//!   Modbus TCP
//!
//! ## Quick Start (control bus)
//!
//! ```rust,no_run
//! use pointwatch_adapters::control_bus::ControlBusAdapter;
//! use pointwatch_adapters::{Source, SourceKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = ControlBusAdapter::builder()
//!         .endpoint("http://localhost:9000")
//!         .build()?;
//!
//!     let samples = adapter
//!         .fetch(&SourceKey::method("CONTROL/DA41/PSA", "getHwState"))
//!         .await?;
//!
//!     println!("{:?}", samples.get("getHwState"));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod source;

#[cfg(feature = "directory")]
pub mod directory;

#[cfg(feature = "control-bus")]
pub mod control_bus;

#[cfg(feature = "key-value")]
pub mod key_value;

#[cfg(feature = "field-bus")]
pub mod field_bus;

pub use error::SourceError;
pub use source::{fetch_with_timeout, Source, SourceKey};

#[cfg(any(
    feature = "directory",
    feature = "control-bus",
    feature = "key-value",
    feature = "field-bus"
))]
pub use source::SourceAdapter;

// Re-export types for convenience
pub use pointwatch_types::{RawSample, SampleSet};
