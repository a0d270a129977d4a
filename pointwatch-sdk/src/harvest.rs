//! The per-unit harvesting pipeline: fetch, filter, name, build.
//!
//! A [`Probe`] is one fetch against a source, with the fields to pick out
//! of the returned sample set. For each unit of the roster the harvester
//! runs every probe and turns each [`FieldSpec`] into at most one record.
//!
//! Failures are isolated at the smallest scope possible:
//!
//! - a failing probe skips its own fields, unless one of them is required
//! - an unusable required field abandons the whole unit
//! - a failing unit never affects the others

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use thiserror::Error;

use pointwatch_adapters::{fetch_with_timeout, Source, SourceError, SourceKey};
use pointwatch_types::{
    ErrorKind, FieldPolicy, FleetRoster, FreshnessError, FreshnessFilter, IasType,
    MonitorPointRecord, NameError, PointTemplate, RawSample, UnitId, ValueError,
};

use crate::job::{JobReport, PointDescriptor};
use crate::session::PublisherSession;

/// Placeholder replaced by the unit name in key and description templates.
pub const UNIT_PLACEHOLDER: &str = "{unit}";

/// Errors raised while harvesting one unit.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("fetching {key}: {source}")]
    Source {
        key: String,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Freshness(#[from] FreshnessError),

    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl HarvestError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarvestError::Source { source, .. } => source.kind(),
            HarvestError::Freshness(e) => e.kind(),
            HarvestError::Name(e) => e.kind(),
            HarvestError::Value(e) => e.kind(),
        }
    }
}

/// A source key with a `{unit}` placeholder, e.g. `CONTROL/{unit}/PSA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate(String);

impl KeyTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Substitute the unit name.
    pub fn render(&self, unit: &UnitId) -> String {
        self.0.replace(UNIT_PLACEHOLDER, &unit.to_string())
    }
}

/// One field to turn into a monitor point.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Name of the field in the fetched sample set.
    pub field: String,
    pub template: PointTemplate,
    pub ias_type: IasType,
    pub policy: FieldPolicy,
    /// Short description with an optional `{unit}` placeholder.
    pub short_desc: String,
}

impl FieldSpec {
    /// An optional field with an empty description.
    pub fn new(field: impl Into<String>, template: PointTemplate, ias_type: IasType) -> Self {
        Self {
            field: field.into(),
            template,
            ias_type,
            policy: FieldPolicy::Optional,
            short_desc: String::new(),
        }
    }

    /// Set the stale/missing policy.
    pub fn policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the description.
    pub fn short_desc(mut self, short_desc: impl Into<String>) -> Self {
        self.short_desc = short_desc.into();
        self
    }

    /// Describe the point this field publishes for `unit`.
    pub fn describe(&self, unit: &UnitId) -> Result<PointDescriptor, NameError> {
        Ok(PointDescriptor {
            id: self.template.render(Some(unit))?,
            short_desc: self.short_desc.replace(UNIT_PLACEHOLDER, &unit.to_string()),
            ias_type: self.ias_type,
        })
    }
}

/// One fetch against a source, and the fields taken from its result.
#[derive(Debug, Clone)]
pub struct Probe {
    pub source: Arc<dyn Source>,
    pub key: KeyTemplate,
    pub method: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl Probe {
    pub fn new(source: Arc<dyn Source>, key: KeyTemplate) -> Self {
        Self {
            source,
            key,
            method: None,
            fields: Vec::new(),
        }
    }

    /// Set the method invoked on the key.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Add a field.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// The source key for `unit`.
    pub fn key_for(&self, unit: &UnitId) -> SourceKey {
        SourceKey {
            path: self.key.render(unit),
            method: self.method.clone(),
        }
    }

    fn has_required(&self) -> bool {
        self.fields.iter().any(|f| f.policy == FieldPolicy::Required)
    }
}

/// Everything harvested from one unit.
#[derive(Debug)]
pub struct UnitHarvest {
    pub unit: UnitId,
    pub records: Vec<MonitorPointRecord>,
    /// Non-fatal failures: optional probes or fields that could not be used.
    pub failures: Vec<HarvestError>,
}

impl UnitHarvest {
    /// A unit counts as failed when errors left it with nothing to publish.
    pub fn is_failed(&self) -> bool {
        self.records.is_empty() && !self.failures.is_empty()
    }
}

/// Runs probes over units.
#[derive(Debug, Clone)]
pub struct Harvester {
    filter: FreshnessFilter,
    fetch_timeout: Duration,
    concurrency: usize,
}

impl Harvester {
    /// Create a harvester with a 10 second fetch timeout, harvesting one
    /// unit at a time.
    pub fn new(filter: FreshnessFilter) -> Self {
        Self {
            filter,
            fetch_timeout: Duration::from_secs(10),
            concurrency: 1,
        }
    }

    /// Set the per-fetch timeout.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set how many units are harvested at once. Zero is treated as one.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn filter(&self) -> &FreshnessFilter {
        &self.filter
    }

    pub fn timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Fetch `key` from `source` within the configured timeout.
    pub async fn fetch(
        &self,
        source: &dyn Source,
        key: &SourceKey,
    ) -> Result<pointwatch_types::SampleSet, HarvestError> {
        fetch_with_timeout(source, key, self.fetch_timeout)
            .await
            .map_err(|source| HarvestError::Source {
                key: key.to_string(),
                source,
            })
    }

    /// Build the record for one field, if its policy lets one through.
    pub fn build_record(
        &self,
        unit: Option<&UnitId>,
        spec: &FieldSpec,
        sample: Option<&RawSample>,
        now: DateTime<Utc>,
    ) -> Result<Option<MonitorPointRecord>, HarvestError> {
        let Some(value) = self.filter.resolve(spec.policy, &spec.field, sample, now)? else {
            return Ok(None);
        };
        let id = spec.template.render(unit)?;
        let record = MonitorPointRecord::parse(id, &value, spec.ias_type)?;
        Ok(Some(record))
    }

    /// Harvest one unit.
    ///
    /// Returns `Err` only when a required field could not be used; nothing
    /// from the unit should be published then.
    pub async fn harvest_unit(
        &self,
        unit: &UnitId,
        probes: &[Probe],
        now: DateTime<Utc>,
    ) -> Result<UnitHarvest, HarvestError> {
        let mut harvest = UnitHarvest {
            unit: *unit,
            records: Vec::new(),
            failures: Vec::new(),
        };

        for probe in probes {
            let key = probe.key_for(unit);
            let samples = match self.fetch(probe.source.as_ref(), &key).await {
                Ok(samples) => samples,
                Err(e) if probe.has_required() => return Err(e),
                Err(e) => {
                    tracing::warn!(unit = %unit, error = %e, kind = %e.kind(), "Probe failed");
                    harvest.failures.push(e);
                    continue;
                }
            };

            for spec in &probe.fields {
                match self.build_record(Some(unit), spec, samples.get(&spec.field), now) {
                    Ok(Some(record)) => harvest.records.push(record),
                    Ok(None) => {
                        tracing::debug!(unit = %unit, field = %spec.field, "Field skipped");
                    }
                    Err(e) if spec.policy == FieldPolicy::Required => return Err(e),
                    Err(e) => {
                        tracing::warn!(unit = %unit, field = %spec.field, error = %e, "Field failed");
                        harvest.failures.push(e);
                    }
                }
            }
        }

        Ok(harvest)
    }

    /// Harvest every unit of `roster` and submit the records.
    ///
    /// Units are harvested up to `concurrency` at a time, in roster order.
    /// Submission goes through the one session, one record at a time.
    pub async fn harvest_roster(
        &self,
        roster: &FleetRoster,
        probes: &[Probe],
        now: DateTime<Utc>,
        session: &mut PublisherSession,
    ) -> JobReport {
        self.harvest_units(roster, session, |unit| self.harvest_unit(unit, probes, now))
            .await
    }

    /// Run `harvest_one` for every unit of `roster` and submit the records.
    ///
    /// For jobs whose records do not map one-to-one onto probe fields. Same
    /// ordering, concurrency and failure counting as [`Harvester::harvest_roster`].
    pub async fn harvest_units<'r, F, Fut>(
        &self,
        roster: &'r FleetRoster,
        session: &mut PublisherSession,
        harvest_one: F,
    ) -> JobReport
    where
        F: Fn(&'r UnitId) -> Fut + Sync,
        Fut: Future<Output = Result<UnitHarvest, HarvestError>> + Send,
    {
        let mut report = JobReport::default();

        let mut results = std::pin::pin!(stream::iter(roster.iter())
            .map(|unit| {
                let harvest = harvest_one(unit);
                async move { (*unit, harvest.await) }
            })
            .buffered(self.concurrency)
            .boxed());

        while let Some((unit, result)) = results.next().await {
            match result {
                Ok(harvest) => {
                    report.fields_skipped += harvest.failures.len() as u64;
                    if harvest.is_failed() {
                        report.units_failed += 1;
                    }
                    for record in &harvest.records {
                        if session.submit(record).await {
                            report.submitted += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(unit = %unit, error = %e, kind = %e.kind(), "Unit abandoned");
                    report.units_failed += 1;
                }
            }
        }

        report
    }

    /// Every point `probes` can publish over `roster`.
    pub fn describe(roster: &FleetRoster, probes: &[Probe]) -> Vec<PointDescriptor> {
        roster
            .iter()
            .flat_map(|unit| {
                probes
                    .iter()
                    .flat_map(|p| p.fields.iter())
                    .filter_map(move |spec| spec.describe(unit).ok())
            })
            .collect()
    }
}
