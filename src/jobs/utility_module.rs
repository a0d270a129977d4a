//! Utility module status over the field bus.
//!
//! Each unit's discrete inputs are published as one status word
//! `FIRE:0,E-STOP:0,...` under the flattened id `Array-UMStatus-Ant[!#n!]`.
//! Optionally every input is also published as its own BOOLEAN point.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pointwatch_adapters::field_bus::UTILITY_MODULE_FIELDS;
use pointwatch_adapters::{Source, SourceKey};
use pointwatch_sdk::{
    CycleContext, HarvestError, Harvester, IasType, Job, JobError, JobReport, MonitorPointRecord,
    PointDescriptor, PointTemplate, PublisherSession, UnitHarvest, UnitId,
};
use pointwatch_types::{FleetRoster, NameError, SampleSet, Value};

pub const STATUS_PREFIX: &str = "Array-UMStatus-Ant";

pub struct UtilityModuleJob {
    source: Arc<dyn Source>,
    harvester: Harvester,
    per_field_points: bool,
}

impl UtilityModuleJob {
    pub fn new(source: Arc<dyn Source>, per_field_points: bool, harvester: Harvester) -> Self {
        Self {
            source,
            harvester,
            per_field_points,
        }
    }

    fn status_template() -> PointTemplate {
        PointTemplate::flattened(STATUS_PREFIX)
    }

    fn field_template(field: &str) -> PointTemplate {
        PointTemplate::per_family("Array", "UM", field)
    }

    /// Read one unit's inputs and turn them into records.
    async fn harvest_unit(&self, unit: &UnitId, now: DateTime<Utc>) -> Result<UnitHarvest, HarvestError> {
        let key = SourceKey::new(unit.to_string());
        let inputs = self.harvester.fetch(self.source.as_ref(), &key).await?;
        Ok(UnitHarvest {
            unit: *unit,
            records: self.unit_records(unit, &inputs, now)?,
            failures: Vec::new(),
        })
    }

    fn unit_records(
        &self,
        unit: &UnitId,
        inputs: &SampleSet,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonitorPointRecord>, NameError> {
        let mut records = Vec::new();

        let status = status_word(inputs);
        records.push(
            MonitorPointRecord::builder(Self::status_template().render(Some(unit))?, status)
                .ias_type(IasType::String)
                .timestamp(now)
                .build(),
        );

        if self.per_field_points {
            for field in UTILITY_MODULE_FIELDS {
                let Some(sample) = inputs.get(field) else {
                    continue;
                };
                let id = Self::field_template(field).render(Some(unit))?;
                records.push(
                    MonitorPointRecord::builder(id, Value::Boolean(sample.value == "1"))
                        .timestamp(now)
                        .build(),
                );
            }
        }

        Ok(records)
    }
}

/// Join the inputs in their fixed order as `FIELD:value` pairs.
pub fn status_word(inputs: &SampleSet) -> String {
    UTILITY_MODULE_FIELDS
        .iter()
        .filter_map(|field| inputs.get(field).map(|s| format!("{}:{}", field, s.value)))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl Job for UtilityModuleJob {
    fn name(&self) -> &str {
        "utility-module"
    }

    async fn run(
        &self,
        ctx: &CycleContext,
        session: &mut PublisherSession,
    ) -> Result<JobReport, JobError> {
        let now = ctx.started_utc;
        Ok(self
            .harvester
            .harvest_units(&ctx.roster, session, |unit| self.harvest_unit(unit, now))
            .await)
    }

    fn describe(&self, roster: &FleetRoster) -> Vec<PointDescriptor> {
        let mut points = Vec::new();
        for unit in roster.iter() {
            if let Ok(id) = Self::status_template().render(Some(unit)) {
                points.push(PointDescriptor {
                    id,
                    short_desc: format!("Status of {unit} from utility module"),
                    ias_type: IasType::String,
                });
            }
            if self.per_field_points {
                for field in UTILITY_MODULE_FIELDS {
                    if let Ok(id) = Self::field_template(field).render(Some(unit)) {
                        points.push(PointDescriptor {
                            id,
                            short_desc: format!("{field} of {unit} from utility module"),
                            ias_type: IasType::Boolean,
                        });
                    }
                }
            }
        }
        points
    }
}
