//! # pointwatch
//!
//! Periodically harvests antenna monitor points from several telemetry
//! sources and publishes them to the alarm system.
//!
//! Each [`jobs::JobKind`] reads one family of instruments through an
//! adapter from `pointwatch-adapters` and submits records through the
//! `pointwatch-sdk` scheduler:
//!
//! ```text
//!   directory ──▶ PadsJob ───────────┐
//!   control bus ─▶ ControlBusJob ────┤
//!   telemetry cache ─▶ KeyValueJob ──┼──▶ Scheduler ──▶ PublisherSession ──▶ UDP sink
//!   field bus ──▶ UtilityModuleJob ──┘
//! ```
//!
//! The binary wires these together from [`config::Settings`] and the
//! command line in [`cli`].

pub mod cli;
pub mod config;
pub mod duration;
pub mod export;
pub mod jobs;

pub use cli::{Args, CliError, Mode};
pub use config::Settings;
pub use duration::{format_duration, parse_duration};
pub use export::{describe_jobs, export_to_file};
pub use jobs::{build_jobs, JobKind};
