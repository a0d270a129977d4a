//! Antenna units and the fleet roster.
//!
//! A unit is identified by a two-letter family tag and a numeric index.
//! The textual form is always four characters: the family followed by the
//! zero-padded two-digit index (`DA41`, `DV01`, `PM03`).

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

use crate::ErrorKind;

/// Antenna family.
///
/// Each family has its own numbering range inside the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Family {
    DV,
    DA,
    CM,
    PM,
}

impl Family {
    /// All families, in roster order.
    pub const ALL: [Family; 4] = [Family::DV, Family::DA, Family::PM, Family::CM];

    /// The two-letter tag of the family.
    pub const fn tag(&self) -> &'static str {
        match self {
            Family::DV => "DV",
            Family::DA => "DA",
            Family::CM => "CM",
            Family::PM => "PM",
        }
    }

    /// Valid unit indices for this family.
    pub const fn valid_range(&self) -> RangeInclusive<u8> {
        match self {
            Family::DV => 1..=25,
            Family::DA => 41..=65,
            Family::CM => 1..=12,
            Family::PM => 1..=4,
        }
    }

    /// Parse a family from its two-letter tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "DV" => Some(Family::DV),
            "DA" => Some(Family::DA),
            "CM" => Some(Family::CM),
            "PM" => Some(Family::PM),
            _ => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Errors raised when building or parsing a [`UnitId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    /// The name is not a four character `FFNN` unit name.
    #[error("invalid unit name '{0}': expected a family tag followed by two digits")]
    InvalidName(String),

    /// The family prefix is not one of DV, DA, CM, PM.
    #[error("unknown unit family '{0}'")]
    UnknownFamily(String),

    /// The index is outside the valid range for the family.
    #[error("index {index} is out of range for family {family}")]
    OutOfRange { family: Family, index: u8 },
}

impl UnitError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidUnitName
    }
}

/// A single fleet member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId {
    family: Family,
    index: u8,
}

impl UnitId {
    /// Create a unit, checking the index against the family range.
    pub fn new(family: Family, index: u8) -> Result<Self, UnitError> {
        if !family.valid_range().contains(&index) {
            return Err(UnitError::OutOfRange { family, index });
        }
        Ok(Self { family, index })
    }

    /// The unit family.
    pub const fn family(&self) -> Family {
        self.family
    }

    /// The numeric index (no padding).
    pub const fn index(&self) -> u8 {
        self.index
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.family, self.index)
    }
}

impl FromStr for UnitId {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.is_ascii() {
            return Err(UnitError::InvalidName(s.to_string()));
        }
        let (tag, digits) = s.split_at(2);
        let family = Family::from_tag(tag).ok_or_else(|| UnitError::UnknownFamily(tag.to_string()))?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UnitError::InvalidName(s.to_string()));
        }
        let index: u8 = digits
            .parse()
            .map_err(|_| UnitError::InvalidName(s.to_string()))?;
        UnitId::new(family, index)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UnitId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for UnitId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// The ordered set of units harvested every cycle.
///
/// Duplicates are dropped on construction; order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetRoster {
    units: Vec<UnitId>,
}

impl FleetRoster {
    /// Build a roster from units, dropping duplicates.
    pub fn new(units: impl IntoIterator<Item = UnitId>) -> Self {
        let mut seen = Vec::new();
        for unit in units {
            if !seen.contains(&unit) {
                seen.push(unit);
            }
        }
        Self { units: seen }
    }

    /// The complete fleet: DV01..DV25, DA41..DA65, PM01..PM04, CM01..CM12.
    pub fn full_fleet() -> Self {
        let units = Family::ALL.iter().flat_map(|family| {
            family
                .valid_range()
                .map(move |index| UnitId { family: *family, index })
        });
        Self::new(units)
    }

    /// Parse a roster from unit names.
    pub fn from_names<I, S>(names: I) -> Result<Self, UnitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let units = names
            .into_iter()
            .map(|name| name.as_ref().trim().parse())
            .collect::<Result<Vec<UnitId>, _>>()?;
        Ok(Self::new(units))
    }

    /// Iterate over the units in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitId> {
        self.units.iter()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Check if a unit is part of the roster.
    pub fn contains(&self, unit: &UnitId) -> bool {
        self.units.contains(unit)
    }
}

impl Default for FleetRoster {
    fn default() -> Self {
        Self::full_fleet()
    }
}

impl<'a> IntoIterator for &'a FleetRoster {
    type Item = &'a UnitId;
    type IntoIter = std::slice::Iter<'a, UnitId>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}
