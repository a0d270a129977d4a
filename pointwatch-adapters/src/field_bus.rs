//! Field bus adapter, reading antenna utility modules over Modbus TCP.
//!
//! Each antenna has a utility module at `10.196.{n}.22`, where `n` is the
//! unit index for DV and DA antennas, `80 + index` for CM and `92 + index`
//! for PM. A fixed block of discrete inputs is read from offset 0 and the
//! first ten positions are mapped to named fields.
//!
//! The key path is the unit name, e.g. `DA41`.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::prelude::*;

use pointwatch_types::{Family, RawSample, SampleSet, UnitId};

use crate::{Source, SourceError, SourceKey};

/// Field names of the utility module inputs, by position.
pub const UTILITY_MODULE_FIELDS: [&str; 10] = [
    "FIRE",
    "E-STOP",
    "AC-POWER",
    "UPS-POWER",
    "STOW-PIN",
    "RX-CAB-TEMP",
    "HVAC",
    "ANTENNA-POS",
    "DRIVE-CAB-TEMP",
    "AT-ZENITH",
];

const DEFAULT_PORT: u16 = 502;
const DEFAULT_SLAVE: u8 = 1;
const DEFAULT_INPUT_COUNT: u16 = 12;

/// Field bus adapter for antenna utility modules.
#[derive(Debug, Clone)]
pub struct FieldBusAdapter {
    port: u16,
    slave: u8,
    input_count: u16,
    connect_timeout: Duration,
}

impl FieldBusAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> FieldBusAdapterBuilder {
        FieldBusAdapterBuilder::default()
    }

    /// Read the raw discrete inputs of one unit's utility module.
    pub async fn read_inputs(&self, unit: &UnitId) -> Result<Vec<bool>, SourceError> {
        let addr = SocketAddr::new(utility_module_address(unit).into(), self.port);

        let mut ctx = tokio::time::timeout(
            self.connect_timeout,
            tcp::connect_slave(addr, Slave(self.slave)),
        )
        .await
        .map_err(|_| SourceError::Timeout)??;

        let inputs = ctx.read_discrete_inputs(0, self.input_count).await??;
        Ok(inputs)
    }
}

#[async_trait]
impl Source for FieldBusAdapter {
    async fn fetch(&self, key: &SourceKey) -> Result<SampleSet, SourceError> {
        let unit: UnitId = key
            .path
            .parse()
            .map_err(|e| SourceError::KeyNotFound(format!("{}: {e}", key.path)))?;
        let inputs = self.read_inputs(&unit).await?;
        map_fields(&inputs)
    }

    fn description(&self) -> &str {
        "field bus utility modules"
    }
}

/// Builder for FieldBusAdapter.
#[derive(Debug, Default)]
pub struct FieldBusAdapterBuilder {
    port: Option<u16>,
    slave: Option<u8>,
    input_count: Option<u16>,
    connect_timeout: Option<Duration>,
}

impl FieldBusAdapterBuilder {
    /// Set the Modbus TCP port (default: 502).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the slave id (default: 1).
    pub fn slave(mut self, slave: u8) -> Self {
        self.slave = Some(slave);
        self
    }

    /// Set how many inputs to read (default: 12). At least ten are needed.
    pub fn input_count(mut self, count: u16) -> Self {
        self.input_count = Some(count);
        self
    }

    /// Set the connection timeout (default: 1 second).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> FieldBusAdapter {
        FieldBusAdapter {
            port: self.port.unwrap_or(DEFAULT_PORT),
            slave: self.slave.unwrap_or(DEFAULT_SLAVE),
            input_count: self.input_count.unwrap_or(DEFAULT_INPUT_COUNT),
            connect_timeout: self.connect_timeout.unwrap_or(Duration::from_secs(1)),
        }
    }
}

/// The address of a unit's utility module.
pub fn utility_module_address(unit: &UnitId) -> Ipv4Addr {
    let third = match unit.family() {
        Family::DV | Family::DA => unit.index(),
        Family::CM => 80 + unit.index(),
        Family::PM => 92 + unit.index(),
    };
    Ipv4Addr::new(10, 196, third, 22)
}

/// Map positional inputs to named fields with `0`/`1` values.
pub fn map_fields(inputs: &[bool]) -> Result<SampleSet, SourceError> {
    if inputs.len() < UTILITY_MODULE_FIELDS.len() {
        return Err(SourceError::MalformedResponse(format!(
            "expected at least {} inputs, got {}",
            UTILITY_MODULE_FIELDS.len(),
            inputs.len()
        )));
    }

    Ok(UTILITY_MODULE_FIELDS
        .iter()
        .zip(inputs)
        .map(|(field, on)| (field.to_string(), RawSample::new(if *on { "1" } else { "0" })))
        .collect())
}
