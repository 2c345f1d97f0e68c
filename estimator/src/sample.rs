use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Construction type of the estimated project.
///
/// The declaration order fixes the one-hot position of each category; it must
/// stay stable between training and inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructionType {
    Residential,
    Commercial,
    Industrial,
}

impl ConstructionType {
    pub const ALL: [Self; 3] = [Self::Residential, Self::Commercial, Self::Industrial];

    /// One-hot position of this category.
    pub fn index(self) -> usize {
        match self {
            Self::Residential => 0,
            Self::Commercial => 1,
            Self::Industrial => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Industrial => "industrial",
        }
    }
}

impl FromStr for ConstructionType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "residential" => Ok(Self::Residential),
            "commercial" => Ok(Self::Commercial),
            "industrial" => Ok(Self::Industrial),
            _ => Err(InputError::UnknownConstructionType { got: s.to_string() }),
        }
    }
}

impl fmt::Display for ConstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region the project is built in. Same ordering contract as
/// `ConstructionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Urban,
    Suburban,
    Rural,
}

impl Region {
    pub const ALL: [Self; 3] = [Self::Urban, Self::Suburban, Self::Rural];

    pub fn index(self) -> usize {
        match self {
            Self::Urban => 0,
            Self::Suburban => 1,
            Self::Rural => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Suburban => "suburban",
            Self::Rural => "rural",
        }
    }
}

impl FromStr for Region {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urban" => Ok(Self::Urban),
            "suburban" => Ok(Self::Suburban),
            "rural" => Ok(Self::Rural),
            _ => Err(InputError::UnknownRegion { got: s.to_string() }),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which feature encoding a model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Features are `[area]` only.
    AreaOnly,
    /// Features are `[area] ++ one_hot(type) ++ one_hot(region)`.
    Categorical,
}

impl Variant {
    /// Width of the raw feature vector.
    pub fn feature_len(self) -> usize {
        match self {
            Variant::AreaOnly => 1,
            Variant::Categorical => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::AreaOnly => "area-only",
            Variant::Categorical => "categorical",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled training sample. Quantities are per-project totals: cement and
/// sand in kilograms, bricks in units (categorical variant stores thousands).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub area: f32,
    pub construction_type: ConstructionType,
    pub region: Region,
    pub cement: f32,
    pub sand: f32,
    pub bricks: f32,
}

/// One prediction, field names matching the wire contract of the consuming
/// HTTP layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Estimate {
    pub area: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construction_type: Option<ConstructionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    pub cimento: f32,
    pub areia: f32,
    pub tijolos: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ordering_is_stable() {
        for (i, t) in ConstructionType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
        for (i, r) in Region::ALL.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
    }

    #[test]
    fn parse_round_trips() {
        for t in ConstructionType::ALL {
            assert_eq!(t.as_str().parse::<ConstructionType>().unwrap(), t);
        }
        for r in Region::ALL {
            assert_eq!(r.as_str().parse::<Region>().unwrap(), r);
        }
    }

    #[test]
    fn bogus_category_is_rejected() {
        let err = "bogus".parse::<ConstructionType>().unwrap_err();
        assert!(matches!(err, InputError::UnknownConstructionType { .. }));
    }
}
