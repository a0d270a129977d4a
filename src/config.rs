//! Layered configuration.
//!
//! Built-in defaults, then an optional TOML file, then environment
//! variables prefixed with `POINTWATCH` using `__` as the section
//! separator (`POINTWATCH__KEY_VALUE__URL=redis://localhost:6379/0`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use pointwatch_types::{FieldPolicy, FleetRoster, IasType, UnitError};

use crate::duration::as_text;

/// Everything the binary can be configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sink: SinkSettings,
    pub fleet: FleetSettings,
    /// Allowed skew between a sample timestamp and the cycle start.
    #[serde(with = "as_text")]
    pub tolerance: Duration,
    #[serde(with = "as_text")]
    pub fetch_timeout: Duration,
    /// Units harvested at once within a job.
    pub concurrency: usize,
    pub directory: DirectorySettings,
    pub control_bus: ControlBusSettings,
    pub key_value: KeyValueSettings,
    pub field_bus: FieldBusSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sink: SinkSettings::default(),
            fleet: FleetSettings::default(),
            tolerance: Duration::from_secs(100),
            fetch_timeout: Duration::from_secs(10),
            concurrency: 1,
            directory: DirectorySettings::default(),
            control_bus: ControlBusSettings::default(),
            key_value: KeyValueSettings::default(),
            field_bus: FieldBusSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings, reading `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("POINTWATCH")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("fleet.units")
                    .with_list_parse_key("directory.sub_arrays")
                    .with_list_parse_key("key_value.preserved_tokens"),
            )
            .build()?
            .try_deserialize()
    }

    /// The fleet to harvest.
    pub fn roster(&self) -> Result<FleetRoster, UnitError> {
        if self.fleet.units.is_empty() {
            Ok(FleetRoster::full_fleet())
        } else {
            FleetRoster::from_names(&self.fleet.units)
        }
    }
}

/// Where records are published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Host of the UDP sink. The port comes from the command line.
    pub host: String,
    /// Append JSON lines to this file instead of sending datagrams.
    pub file: Option<PathBuf>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSettings {
    /// Unit names. Empty means the full fleet.
    pub units: Vec<String>,
}

/// Antenna-to-pad directory lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub endpoint: String,
    pub sub_arrays: Vec<String>,
    /// Suffix stripped from antenna names in replies.
    pub suffix: String,
    /// Run on every `every`-th cycle.
    pub every: u64,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            endpoint: "http://vrfs.alma.cl/getAntInfoWS.php".to_string(),
            sub_arrays: vec!["APE1".into(), "APE2".into(), "TFINT".into()],
            suffix: "-AS-01".to_string(),
            every: 1,
        }
    }
}

/// A method invoked on a control bus device and the point it feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestPoint {
    pub method: String,
    /// Field part of the published id, e.g. `OPERATIONAL`.
    pub field: String,
    pub ias_type: IasType,
    /// What to do when the reply is missing or stale.
    #[serde(default)]
    pub policy: FieldPolicy,
}

/// A device polled on every unit, with the fields it publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestDevice {
    pub name: String,
    pub fields: Vec<String>,
}

/// Control bus polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlBusSettings {
    pub endpoint: String,
    pub points: Vec<RestPoint>,
    pub devices: Vec<RestDevice>,
}

impl Default for ControlBusSettings {
    fn default() -> Self {
        let device = |name: &str, fields: &[&str]| RestDevice {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        };
        Self {
            endpoint: "http://acse2-gas02.sco.alma.cl:9000".to_string(),
            points: vec![
                RestPoint {
                    method: "getHwState".into(),
                    field: "OPERATIONAL".into(),
                    ias_type: IasType::String,
                    policy: FieldPolicy::Optional,
                },
                RestPoint {
                    method: "GET_PS_SHUTDOWN".into(),
                    field: "SHUTDOWN".into(),
                    ias_type: IasType::Boolean,
                    policy: FieldPolicy::Optional,
                },
            ],
            devices: vec![
                device("PSA", &["OPERATIONAL", "SHUTDOWN"]),
                device("PSD", &["OPERATIONAL", "SHUTDOWN"]),
                device("CMPR", &["OPERATIONAL"]),
            ],
        }
    }
}

impl ControlBusSettings {
    /// The point definition for a published field name.
    pub fn point(&self, field: &str) -> Option<&RestPoint> {
        self.points.iter().find(|p| p.field == field)
    }
}

/// Telemetry cache polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValueSettings {
    pub url: String,
    pub namespace: String,
    pub preserved_tokens: Vec<String>,
    /// Tolerance for cached samples, which lag more than live ones.
    #[serde(with = "as_text")]
    pub tolerance: Duration,
    /// Component holding the laser input switch.
    pub switch_component: String,
    /// Component read when the switch is `1.0`.
    pub ml_component: String,
    /// Component read when the switch is `2.0`.
    pub ml2_component: String,
    /// Per-field policy overrides, keyed by raw field name.
    pub policies: BTreeMap<String, FieldPolicy>,
}

impl Default for KeyValueSettings {
    fn default() -> Self {
        Self {
            url: "redis://metis.osf.alma.cl:6379/0".to_string(),
            namespace: "TMCS".to_string(),
            preserved_tokens: vec!["MLD".into(), "ML".into(), "ML2".into()],
            tolerance: Duration::from_secs(100_000),
            switch_component: "CONTROL_CentralLO_MLD_10b7c33e01080095".to_string(),
            ml_component: "CONTROL_CentralLO_ML_930008016217fc10".to_string(),
            ml2_component: "CONTROL_CentralLO_ML2_3000080205eba710".to_string(),
            policies: BTreeMap::new(),
        }
    }
}

impl KeyValueSettings {
    /// The configured policy for `field`, or `default`.
    pub fn policy_for(&self, field: &str, default: FieldPolicy) -> FieldPolicy {
        self.policies
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, policy)| *policy)
            .unwrap_or(default)
    }
}

/// Utility module polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBusSettings {
    pub port: u16,
    pub slave: u8,
    #[serde(with = "as_text")]
    pub timeout: Duration,
    /// Also publish one BOOLEAN point per utility module input.
    pub per_field_points: bool,
}

impl Default for FieldBusSettings {
    fn default() -> Self {
        Self {
            port: 502,
            slave: 1,
            timeout: Duration::from_secs(1),
            per_field_points: false,
        }
    }
}
