use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Spatial dimensionality of a simulation.
///
/// Node state is always stored as 3-vectors; a planar network simply keeps every node in
/// the x-y plane. The dimensionality selects the force law (planar networks carry no
/// twist term) and whether crossing checks and the 2D Delaunay projection apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum Dimensionality {
    Planar,
    #[default]
    Spatial,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Unsupported number of dimensions: {0} (expected 2 or 3)")]
pub struct UnsupportedDimensions(pub u8);

impl Dimensionality {
    pub fn count(self) -> u8 {
        match self {
            Self::Planar => 2,
            Self::Spatial => 3,
        }
    }

    pub fn is_planar(self) -> bool {
        self == Self::Planar
    }
}

impl TryFrom<u8> for Dimensionality {
    type Error = UnsupportedDimensions;

    fn try_from(dims: u8) -> Result<Self, Self::Error> {
        match dims {
            2 => Ok(Self::Planar),
            3 => Ok(Self::Spatial),
            other => Err(UnsupportedDimensions(other)),
        }
    }
}

impl fmt::Display for Dimensionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.count())
    }
}
