//! Monitor point naming.
//!
//! Two templating schemes map units onto the alarm system namespace:
//!
//! - **Per-family**: `{prefix}-{device}-{field}-{family}[!#{index}!]`,
//!   e.g. `Array-PSA-OPERATIONAL-DA[!#41!]`
//! - **Flattened**: `{prefix}[!#{flat}!]`, where `flat` is a single running
//!   index across all families, e.g. `Array-UMStatus-Ant[!#26!]` for DA41
//!
//! The `[!#` and `!]` tokens are placeholders for the alarm system's own
//! template engine. They are emitted verbatim and never resolved here.

use std::fmt;

use thiserror::Error;

use crate::{ErrorKind, Family, UnitError, UnitId};

/// Opening token of a template placeholder.
pub const TEMPLATE_OPEN: &str = "[!#";

/// Closing token of a template placeholder.
pub const TEMPLATE_CLOSE: &str = "!]";

/// Per-family offsets of the flattened index.
const FLAT_OFFSETS: [(Family, i16); 4] = [
    (Family::DV, 0),
    (Family::DA, -15),
    (Family::CM, 50),
    (Family::PM, 62),
];

/// Errors raised while building a monitor point id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The unit name could not be parsed.
    #[error(transparent)]
    InvalidUnitName(#[from] UnitError),

    /// The template needs a unit but none was given.
    #[error("template '{0}' needs a unit")]
    UnitRequired(String),
}

impl NameError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidUnitName
    }
}

/// A canonical monitor point identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MonitorPointId(String);

impl MonitorPointId {
    /// Use a literal identifier as is.
    pub fn fixed(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a per-family identifier.
    ///
    /// The index is printed without leading zeros.
    pub fn per_family(prefix: &str, device: &str, field: &str, unit: &UnitId) -> Self {
        Self(format!(
            "{}-{}-{}-{}{}{}{}",
            prefix,
            device,
            field,
            unit.family(),
            TEMPLATE_OPEN,
            unit.index(),
            TEMPLATE_CLOSE
        ))
    }

    /// Build a flattened identifier.
    pub fn flattened(prefix: &str, unit: &UnitId) -> Self {
        Self(format!(
            "{}{}{}{}",
            prefix,
            TEMPLATE_OPEN,
            flat_index(unit),
            TEMPLATE_CLOSE
        ))
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonitorPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MonitorPointId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name a monitor point from a raw unit name like `DA45`.
///
/// Fails with [`NameError::InvalidUnitName`] when the name is not exactly
/// four characters or carries an unknown family, instead of producing a
/// malformed id.
pub fn name_unit(
    prefix: &str,
    unit_name: &str,
    device: &str,
    field: &str,
) -> Result<MonitorPointId, NameError> {
    let unit: UnitId = unit_name.parse()?;
    Ok(MonitorPointId::per_family(prefix, device, field, &unit))
}

/// The flattened index of a unit.
///
/// DV maps to `n`, DA to `n - 15`, CM to `n + 50` and PM to `n + 62`, so the
/// full fleet covers `1..=66` without gaps or collisions.
pub fn flat_index(unit: &UnitId) -> u16 {
    let offset = offset_of(unit.family());
    (i16::from(unit.index()) + offset) as u16
}

/// Invert [`flat_index`].
pub fn unit_from_flat_index(flat: u16) -> Option<UnitId> {
    let flat = i16::try_from(flat).ok()?;
    FLAT_OFFSETS.iter().find_map(|(family, offset)| {
        let index = u8::try_from(flat - offset).ok()?;
        UnitId::new(*family, index).ok()
    })
}

fn offset_of(family: Family) -> i16 {
    FLAT_OFFSETS
        .iter()
        .find(|(f, _)| *f == family)
        .map(|(_, offset)| *offset)
        .unwrap_or(0)
}

/// How a job names the points it publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "scheme", rename_all = "kebab-case"))]
pub enum PointTemplate {
    /// `{prefix}-{device}-{field}-{family}[!#{index}!]`
    PerFamily {
        prefix: String,
        device: String,
        field: String,
    },
    /// `{prefix}[!#{flat}!]`
    Flattened { prefix: String },
    /// A literal id, independent of any unit.
    Fixed { id: String },
}

impl PointTemplate {
    /// Shorthand for a per-family template.
    pub fn per_family(
        prefix: impl Into<String>,
        device: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        PointTemplate::PerFamily {
            prefix: prefix.into(),
            device: device.into(),
            field: field.into(),
        }
    }

    /// Shorthand for a flattened template.
    pub fn flattened(prefix: impl Into<String>) -> Self {
        PointTemplate::Flattened {
            prefix: prefix.into(),
        }
    }

    /// Shorthand for a fixed id.
    pub fn fixed(id: impl Into<String>) -> Self {
        PointTemplate::Fixed { id: id.into() }
    }

    /// Render the template for a unit.
    ///
    /// Fixed templates ignore the unit; the other schemes require one.
    pub fn render(&self, unit: Option<&UnitId>) -> Result<MonitorPointId, NameError> {
        match (self, unit) {
            (PointTemplate::Fixed { id }, _) => Ok(MonitorPointId::fixed(id.clone())),
            (
                PointTemplate::PerFamily {
                    prefix,
                    device,
                    field,
                },
                Some(unit),
            ) => Ok(MonitorPointId::per_family(prefix, device, field, unit)),
            (PointTemplate::Flattened { prefix }, Some(unit)) => {
                Ok(MonitorPointId::flattened(prefix, unit))
            }
            (template, None) => Err(NameError::UnitRequired(template.to_string())),
        }
    }
}

impl fmt::Display for PointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointTemplate::PerFamily {
                prefix,
                device,
                field,
            } => write!(f, "{prefix}-{device}-{field}-{{family}}{TEMPLATE_OPEN}{{index}}{TEMPLATE_CLOSE}"),
            PointTemplate::Flattened { prefix } => {
                write!(f, "{prefix}{TEMPLATE_OPEN}{{flat}}{TEMPLATE_CLOSE}")
            }
            PointTemplate::Fixed { id } => f.write_str(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::FleetRoster;

    fn unit(name: &str) -> UnitId {
        name.parse().unwrap()
    }

    #[test]
    fn per_family_format() {
        let id = MonitorPointId::per_family("Array", "PSA", "OPERATIONAL", &unit("DA41"));
        assert_eq!(id.as_str(), "Array-PSA-OPERATIONAL-DA[!#41!]");
    }

    #[test]
    fn per_family_drops_leading_zeros() {
        let id = MonitorPointId::per_family("Array", "CRIO", "TEMP0", &unit("DV01"));
        assert_eq!(id.as_str(), "Array-CRIO-TEMP0-DV[!#1!]");
    }

    #[test]
    fn flattened_format() {
        let id = MonitorPointId::flattened("Array-UMStatus-Ant", &unit("DA41"));
        assert_eq!(id.as_str(), "Array-UMStatus-Ant[!#26!]");
    }

    #[test]
    fn flat_offsets_per_family() {
        assert_eq!(flat_index(&unit("DV01")), 1);
        assert_eq!(flat_index(&unit("DV25")), 25);
        assert_eq!(flat_index(&unit("DA41")), 26);
        assert_eq!(flat_index(&unit("DA65")), 50);
        assert_eq!(flat_index(&unit("CM01")), 51);
        assert_eq!(flat_index(&unit("CM12")), 62);
        assert_eq!(flat_index(&unit("PM01")), 63);
        assert_eq!(flat_index(&unit("PM04")), 66);
    }

    #[test]
    fn flat_index_is_a_bijection_over_the_fleet() {
        let fleet = FleetRoster::full_fleet();
        let mut seen = HashSet::new();
        for unit in fleet.iter() {
            let flat = flat_index(unit);
            assert!(seen.insert(flat), "duplicate flat index {flat} for {unit}");
            assert_eq!(unit_from_flat_index(flat), Some(*unit));
        }
        assert_eq!(seen.len(), fleet.len());
    }

    #[test]
    fn flat_index_out_of_fleet() {
        assert_eq!(unit_from_flat_index(0), None);
        assert_eq!(unit_from_flat_index(67), None);
        assert_eq!(unit_from_flat_index(u16::MAX), None);
    }

    #[test]
    fn naming_is_deterministic() {
        let a = name_unit("Array", "DA45", "CRIO", "TEMP0").unwrap();
        let b = name_unit("Array", "DA45", "CRIO", "TEMP0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Array-CRIO-TEMP0-DA[!#45!]");
    }

    #[test]
    fn name_unit_rejects_bad_names() {
        assert!(matches!(
            name_unit("Array", "DX9", "CRIO", "TEMP0"),
            Err(NameError::InvalidUnitName(_))
        ));
        assert!(matches!(
            name_unit("Array", "XY01", "CRIO", "TEMP0"),
            Err(NameError::InvalidUnitName(_))
        ));
        let err = name_unit("Array", "DX9", "CRIO", "TEMP0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUnitName);
    }

    #[test]
    fn template_render() {
        let da41 = unit("DA41");

        let t = PointTemplate::per_family("Array", "CMPR", "DRIVE_ON");
        assert_eq!(
            t.render(Some(&da41)).unwrap().as_str(),
            "Array-CMPR-DRIVE_ON-DA[!#41!]"
        );

        let t = PointTemplate::flattened("Array-UMStatus-Ant");
        assert_eq!(t.render(Some(&da41)).unwrap().as_str(), "Array-UMStatus-Ant[!#26!]");

        let t = PointTemplate::fixed("Array-Laser-Locked");
        assert_eq!(t.render(None).unwrap().as_str(), "Array-Laser-Locked");
        assert_eq!(t.render(Some(&da41)).unwrap().as_str(), "Array-Laser-Locked");
    }

    #[test]
    fn template_render_without_unit() {
        let t = PointTemplate::per_family("Array", "PSA", "SHUTDOWN");
        assert!(matches!(t.render(None), Err(NameError::UnitRequired(_))));
    }
}
