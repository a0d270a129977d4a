//! Finished monitor point records, ready to be published.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{ErrorKind, MonitorPointId, STALE_SENTINEL};

/// Type of a monitor point as understood by the alarm system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum IasType {
    String,
    Double,
    Boolean,
    Alarm,
}

impl fmt::Display for IasType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IasType::String => "STRING",
            IasType::Double => "DOUBLE",
            IasType::Boolean => "BOOLEAN",
            IasType::Alarm => "ALARM",
        };
        f.write_str(name)
    }
}

/// Validity context of a published value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum OperationalMode {
    StartUp,
    Initialization,
    Closing,
    ShuttedDown,
    Maintenance,
    #[default]
    Operational,
    Malfunctioning,
    Degraded,
    Unknown,
}

impl fmt::Display for OperationalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationalMode::StartUp => "STARTUP",
            OperationalMode::Initialization => "INITIALIZATION",
            OperationalMode::Closing => "CLOSING",
            OperationalMode::ShuttedDown => "SHUTTEDDOWN",
            OperationalMode::Maintenance => "MAINTENANCE",
            OperationalMode::Operational => "OPERATIONAL",
            OperationalMode::Malfunctioning => "MALFUNCTIONING",
            OperationalMode::Degraded => "DEGRADED",
            OperationalMode::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A raw string could not be turned into a value of the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot read '{raw}' as {ias_type}")]
pub struct ValueError {
    pub raw: String,
    pub ias_type: IasType,
}

impl ValueError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedResponse
    }
}

/// A typed monitor point value.
///
/// On the wire a value is a JSON bool, number or string. Non-finite doubles
/// and [`Value::Sentinel`] are written as the string `"nan"`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Double(f64),
    String(String),
    /// A stale sample published as not-a-number, whatever the point type.
    Sentinel,
}

impl Value {
    /// Parse a raw source string as the given type.
    ///
    /// `DOUBLE` and `BOOLEAN` read [`STALE_SENTINEL`] as [`Value::Sentinel`].
    /// `BOOLEAN` accepts `1`, `1.0`, `true` and `0`, `0.0`, `false`.
    /// `STRING` and `ALARM` keep the text as is.
    pub fn parse(raw: &str, ias_type: IasType) -> Result<Self, ValueError> {
        let err = || ValueError {
            raw: raw.to_string(),
            ias_type,
        };
        let trimmed = raw.trim();
        match ias_type {
            IasType::String | IasType::Alarm => Ok(Value::String(raw.to_string())),
            _ if trimmed.eq_ignore_ascii_case(STALE_SENTINEL) => Ok(Value::Sentinel),
            IasType::Double => f64::from_str(trimmed).map(Value::Double).map_err(|_| err()),
            IasType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "1.0" | "true" => Ok(Value::Boolean(true)),
                "0" | "0.0" | "false" => Ok(Value::Boolean(false)),
                _ => Err(err()),
            },
        }
    }

    /// Whether this is the stale sentinel or a non-finite double.
    pub fn is_sentinel(&self) -> bool {
        match self {
            Value::Sentinel => true,
            Value::Double(d) => !d.is_finite(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Sentinel => f.write_str(STALE_SENTINEL),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Double(d) if d.is_finite() => serializer.serialize_f64(*d),
            Value::Double(_) | Value::Sentinel => serializer.serialize_str(STALE_SENTINEL),
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

/// Reads back what `Serialize` writes. The text `"nan"` always reads as
/// [`Value::Sentinel`].
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(feature = "serde")]
struct ValueVisitor;

#[cfg(feature = "serde")]
impl serde::de::Visitor<'_> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a bool, a number or a string")
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Double(v as f64))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Double(v as f64))
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Value, E> {
        if v == STALE_SENTINEL {
            Ok(Value::Sentinel)
        } else {
            Ok(Value::String(v.to_string()))
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

/// A monitor point ready to be published.
///
/// Records are immutable once built.
///
/// # Example
///
/// ```rust
/// use pointwatch_types::{IasType, MonitorPointId, MonitorPointRecord};
///
/// let record = MonitorPointRecord::builder(MonitorPointId::fixed("Array-Laser-Locked"), 1.0)
///     .ias_type(IasType::Double)
///     .build();
///
/// assert_eq!(record.id().as_str(), "Array-Laser-Locked");
/// assert_eq!(record.mode().to_string(), "OPERATIONAL");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorPointRecord {
    id: MonitorPointId,
    value: Value,
    #[cfg_attr(feature = "serde", serde(rename = "valueType"))]
    ias_type: IasType,
    #[cfg_attr(feature = "serde", serde(with = "iso_millis"))]
    timestamp: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(rename = "operMode"))]
    mode: OperationalMode,
}

impl MonitorPointRecord {
    /// Create a builder.
    pub fn builder(id: MonitorPointId, value: impl Into<Value>) -> MonitorPointRecordBuilder {
        MonitorPointRecordBuilder::new(id, value.into())
    }

    /// Build a record from a raw string, parsing it as `ias_type`.
    pub fn parse(id: MonitorPointId, raw: &str, ias_type: IasType) -> Result<Self, ValueError> {
        let value = Value::parse(raw, ias_type)?;
        Ok(Self::builder(id, value).ias_type(ias_type).build())
    }

    pub fn id(&self) -> &MonitorPointId {
        &self.id
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn ias_type(&self) -> IasType {
        self.ias_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn mode(&self) -> OperationalMode {
        self.mode
    }
}

/// Builder for `MonitorPointRecord`.
#[derive(Debug)]
pub struct MonitorPointRecordBuilder {
    id: MonitorPointId,
    value: Value,
    ias_type: Option<IasType>,
    timestamp: Option<DateTime<Utc>>,
    mode: OperationalMode,
}

impl MonitorPointRecordBuilder {
    fn new(id: MonitorPointId, value: Value) -> Self {
        Self {
            id,
            value,
            ias_type: None,
            timestamp: None,
            mode: OperationalMode::default(),
        }
    }

    /// Set the type. Defaults to the natural type of the value.
    pub fn ias_type(mut self, ias_type: IasType) -> Self {
        self.ias_type = Some(ias_type);
        self
    }

    /// Set the timestamp. Defaults to now.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the operational mode. Defaults to `OPERATIONAL`.
    pub fn mode(mut self, mode: OperationalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the record.
    pub fn build(self) -> MonitorPointRecord {
        let ias_type = self.ias_type.unwrap_or(match &self.value {
            Value::Boolean(_) => IasType::Boolean,
            Value::Double(_) | Value::Sentinel => IasType::Double,
            Value::String(_) => IasType::String,
        });
        MonitorPointRecord {
            id: self.id,
            value: self.value,
            ias_type,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            mode: self.mode,
        }
    }
}

#[cfg(feature = "serde")]
mod iso_millis {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parse_double() {
        assert_eq!(Value::parse("1.0", IasType::Double), Ok(Value::Double(1.0)));
        assert_eq!(Value::parse(" -3.5 ", IasType::Double), Ok(Value::Double(-3.5)));
        assert_eq!(Value::parse("nan", IasType::Double), Ok(Value::Sentinel));
        assert_eq!(Value::parse(" NaN ", IasType::Double), Ok(Value::Sentinel));
        assert!(Value::parse("warm", IasType::Double).is_err());
    }

    #[test]
    fn parse_boolean() {
        for raw in ["1", "1.0", "true", "TRUE"] {
            assert_eq!(Value::parse(raw, IasType::Boolean), Ok(Value::Boolean(true)));
        }
        for raw in ["0", "0.0", "false"] {
            assert_eq!(Value::parse(raw, IasType::Boolean), Ok(Value::Boolean(false)));
        }
        assert_eq!(Value::parse("nan", IasType::Boolean), Ok(Value::Sentinel));
        let err = Value::parse("maybe", IasType::Boolean).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn parse_string_and_alarm_keep_text() {
        assert_eq!(
            Value::parse("DA41:A001", IasType::String),
            Ok(Value::String("DA41:A001".to_string()))
        );
        assert_eq!(
            Value::parse("SET_HIGH", IasType::Alarm),
            Ok(Value::String("SET_HIGH".to_string()))
        );
        assert_eq!(
            Value::parse("nan", IasType::String),
            Ok(Value::String("nan".to_string()))
        );
    }

    #[test]
    fn builder_defaults() {
        let record = MonitorPointRecord::builder(MonitorPointId::fixed("X"), true).build();
        assert_eq!(record.ias_type(), IasType::Boolean);
        assert_eq!(record.mode(), OperationalMode::Operational);
    }

    #[test]
    fn builder_overrides() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = MonitorPointRecord::builder(MonitorPointId::fixed("X"), "SET_HIGH")
            .ias_type(IasType::Alarm)
            .timestamp(ts)
            .mode(OperationalMode::Maintenance)
            .build();
        assert_eq!(record.ias_type(), IasType::Alarm);
        assert_eq!(record.timestamp(), ts);
        assert_eq!(record.mode().to_string(), "MAINTENANCE");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn wire_format() {
        let ts = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
        let record = MonitorPointRecord::builder(MonitorPointId::fixed("Array-Laser-Locked"), 1.0)
            .timestamp(ts)
            .build();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "Array-Laser-Locked",
                "value": 1.0,
                "valueType": "DOUBLE",
                "timestamp": "2023-11-14T22:13:20.250",
                "operMode": "OPERATIONAL"
            })
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn sentinel_is_published_as_nan_text() {
        let record = MonitorPointRecord::parse(
            MonitorPointId::fixed("Array-Laser-Locked"),
            "nan",
            IasType::Double,
        )
        .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["value"], "nan");
        assert_eq!(json["valueType"], "DOUBLE");

        let drive = MonitorPointRecord::parse(MonitorPointId::fixed("X"), "nan", IasType::Boolean)
            .unwrap();
        let json = serde_json::to_value(&drive).unwrap();
        assert_eq!(json["value"], "nan");
        assert_eq!(json["valueType"], "BOOLEAN");

        let raw_nan = MonitorPointRecord::builder(MonitorPointId::fixed("Y"), f64::NAN).build();
        assert_eq!(serde_json::to_value(&raw_nan).unwrap()["value"], "nan");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn values_read_back_from_the_wire() {
        let values = [
            Value::Boolean(true),
            Value::Double(3.9),
            Value::String("DA41:A001".into()),
            Value::Sentinel,
        ];
        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value, "{json}");
        }
        let from_nan: Value = serde_json::from_str(&serde_json::to_string(&Value::Double(f64::NAN)).unwrap()).unwrap();
        assert_eq!(from_nan, Value::Sentinel);
    }
}
