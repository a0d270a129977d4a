//! The harvest jobs, one per family of instruments.

use std::sync::Arc;

use clap::ValueEnum;

use pointwatch_adapters::control_bus::ControlBusAdapter;
use pointwatch_adapters::directory::DirectoryAdapter;
use pointwatch_adapters::field_bus::FieldBusAdapter;
use pointwatch_adapters::key_value::KeyValueAdapter;
use pointwatch_adapters::{Source, SourceAdapter, SourceError};
use pointwatch_sdk::{FreshnessFilter, Harvester, Job};

use crate::config::Settings;

mod control_bus;
mod key_value;
mod pads;
mod utility_module;

pub use control_bus::ControlBusJob;
pub use key_value::KeyValueJob;
pub use pads::PadsJob;
pub use utility_module::UtilityModuleJob;

/// Selectable jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum JobKind {
    /// Antenna-to-pad assignments from the directory service.
    Pads,
    /// Power supply and compressor states from the control bus.
    ControlBus,
    /// Laser lock, cryostat and compressor points from the telemetry cache.
    KeyValue,
    /// Utility module status words over the field bus.
    UtilityModule,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Pads,
        JobKind::ControlBus,
        JobKind::KeyValue,
        JobKind::UtilityModule,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Pads => "pads",
            JobKind::ControlBus => "control-bus",
            JobKind::KeyValue => "key-value",
            JobKind::UtilityModule => "utility-module",
        }
    }
}

fn harvester(settings: &Settings, tolerance: std::time::Duration) -> Harvester {
    Harvester::new(FreshnessFilter::new(tolerance))
        .fetch_timeout(settings.fetch_timeout)
        .concurrency(settings.concurrency)
}

/// Build the adapter backing `kind` from settings.
pub fn build_source(kind: JobKind, settings: &Settings) -> Result<Arc<dyn Source>, SourceError> {
    let adapter = match kind {
        JobKind::Pads => SourceAdapter::Directory(
            DirectoryAdapter::builder()
                .endpoint(&settings.directory.endpoint)
                .suffix(&settings.directory.suffix)
                .timeout(settings.fetch_timeout)
                .build()?,
        ),
        JobKind::ControlBus => SourceAdapter::ControlBus(
            ControlBusAdapter::builder()
                .endpoint(&settings.control_bus.endpoint)
                .timeout(settings.fetch_timeout)
                .build()?,
        ),
        JobKind::KeyValue => SourceAdapter::KeyValue(
            KeyValueAdapter::builder()
                .url(&settings.key_value.url)
                .namespace(&settings.key_value.namespace)
                .preserved_tokens(settings.key_value.preserved_tokens.iter().cloned())
                .connect_timeout(settings.fetch_timeout)
                .build()?,
        ),
        JobKind::UtilityModule => SourceAdapter::FieldBus(
            FieldBusAdapter::builder()
                .port(settings.field_bus.port)
                .slave(settings.field_bus.slave)
                .connect_timeout(settings.field_bus.timeout)
                .build(),
        ),
    };
    tracing::debug!(job = kind.name(), source = adapter.description(), "Source ready");
    Ok(Arc::new(adapter))
}

/// Build one job reading from `source`.
pub fn build_job(kind: JobKind, source: Arc<dyn Source>, settings: &Settings) -> Arc<dyn Job> {
    match kind {
        JobKind::Pads => Arc::new(PadsJob::new(source, &settings.directory, settings.fetch_timeout)),
        JobKind::ControlBus => Arc::new(ControlBusJob::new(
            source,
            &settings.control_bus,
            harvester(settings, settings.tolerance),
        )),
        JobKind::KeyValue => Arc::new(KeyValueJob::new(
            source,
            &settings.key_value,
            harvester(settings, settings.key_value.tolerance),
        )),
        JobKind::UtilityModule => Arc::new(UtilityModuleJob::new(
            source,
            settings.field_bus.per_field_points,
            harvester(settings, settings.tolerance),
        )),
    }
}

/// Build the selected jobs, in the order given, without duplicates.
pub fn build_jobs(kinds: &[JobKind], settings: &Settings) -> Result<Vec<Arc<dyn Job>>, SourceError> {
    let mut seen = Vec::new();
    let mut jobs = Vec::new();
    for kind in kinds {
        if seen.contains(kind) {
            continue;
        }
        seen.push(*kind);
        let source = build_source(*kind, settings)?;
        jobs.push(build_job(*kind, source, settings));
    }
    Ok(jobs)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_names() {
        let names: Vec<_> = JobKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["pads", "control-bus", "key-value", "utility-module"]);
    }

    #[test]
    fn test_build_jobs_dedups_and_keeps_order() {
        let settings = Settings::default();
        let jobs = build_jobs(
            &[JobKind::UtilityModule, JobKind::Pads, JobKind::UtilityModule],
            &settings,
        )
        .unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name()).collect();
        assert_eq!(names, vec!["utility-module", "pads"]);
    }

    #[test]
    fn test_bad_key_value_url_is_rejected() {
        let mut settings = Settings::default();
        settings.key_value.url = "not a url".into();
        assert!(build_jobs(&[JobKind::KeyValue], &settings).is_err());
    }
}
