//! # pointwatch-types
//!
//! Core types for monitor point harvesting. This crate defines the data
//! model shared by the source adapters, the harvesting pipeline and the
//! publisher: unit identifiers, canonical point names, raw samples, the
//! freshness filter and finished records.
//!
//! ## Design Goals
//!
//! - **Pure**: nothing here does I/O; every function is deterministic given its inputs
//! - **Typed errors**: every failure maps onto a shared [`ErrorKind`]
//! - **Optional serialization**: enable the `serde` feature for the JSON wire shape
//! - **Ergonomic builders**: fluent API for constructing records
//!
//! ## Features
//!
//! - `serde`: serialization via serde, including the record wire format
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use pointwatch_types::{
//!     FieldPolicy, FreshnessFilter, IasType, MonitorPointRecord, PointTemplate, RawSample,
//!     UnitId,
//! };
//!
//! let unit: UnitId = "DA41".parse().unwrap();
//! let filter = FreshnessFilter::new(Duration::from_secs(4500));
//!
//! let sample = RawSample::new("1.0");
//! let value = filter
//!     .resolve(FieldPolicy::Optional, "OPERATIONAL", Some(&sample), chrono::Utc::now())
//!     .unwrap()
//!     .unwrap();
//!
//! let id = PointTemplate::per_family("Array", "PSA", "OPERATIONAL")
//!     .render(Some(&unit))
//!     .unwrap();
//! let record = MonitorPointRecord::parse(id, &value, IasType::Boolean).unwrap();
//!
//! assert_eq!(record.id().as_str(), "Array-PSA-OPERATIONAL-DA[!#41!]");
//! ```

mod freshness;
mod kind;
mod naming;
mod record;
mod sample;
pub mod time;
mod unit;

pub use freshness::*;
pub use kind::*;
pub use naming::*;
pub use record::*;
pub use sample::*;
pub use time::SourceTimestamp;
pub use unit::*;
