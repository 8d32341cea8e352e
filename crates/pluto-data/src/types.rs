//! Core enums shared by the grid, field store and snapshot.

use serde::{Deserialize, Serialize};

use crate::error::{PlutoError, Result};

/// Unit state of a snapshot and of each of its components.
///
/// Transitions only move forward: `Raw` → `CodeUnits` → `AstroUnits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum UnitState {
    /// Plain numbers as written by the simulation.
    #[default]
    Raw,
    /// Values tagged with the run's code units.
    CodeUnits,
    /// Values expressed in the fixed astro unit set.
    AstroUnits,
}

impl UnitState {
    /// Whether values carry units in this state.
    pub fn has_units(&self) -> bool {
        !matches!(self, Self::Raw)
    }
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::CodeUnits => write!(f, "code units"),
            Self::AstroUnits => write!(f, "astro units"),
        }
    }
}

/// Coordinate system of the simulation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geometry {
    /// (x, y, z)
    #[default]
    Cartesian,
    /// Cylindrical with axis order (r, φ, z). PLUTO calls this `POLAR`.
    #[serde(alias = "cylindrical")]
    Polar,
    /// (r, θ, φ) with θ the polar angle.
    Spherical,
}

impl Geometry {
    /// Parse a geometry name as written in `definitions.h` (case-insensitive).
    ///
    /// PLUTO's axisymmetric `CYLINDRICAL` geometry uses the axis order
    /// (r, z) and is not supported.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "CARTESIAN" => Ok(Self::Cartesian),
            "POLAR" => Ok(Self::Polar),
            "SPHERICAL" => Ok(Self::Spherical),
            other => Err(PlutoError::UnsupportedGeometry(other.to_string())),
        }
    }

    /// Kind of each of the three axes.
    pub fn axis_kinds(&self) -> [AxisKind; 3] {
        match self {
            Self::Cartesian => [AxisKind::Length, AxisKind::Length, AxisKind::Length],
            Self::Polar => [AxisKind::Length, AxisKind::Angle, AxisKind::Length],
            Self::Spherical => [AxisKind::Length, AxisKind::Angle, AxisKind::Angle],
        }
    }

    /// Get the PLUTO name of the geometry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cartesian => "CARTESIAN",
            Self::Polar => "POLAR",
            Self::Spherical => "SPHERICAL",
        }
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an axis measures a length or an angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Length,
    Angle,
}

impl AxisKind {
    /// Code-unit expression for coordinates along this axis.
    pub fn code_unit(&self) -> &'static str {
        match self {
            Self::Length => "code_length",
            Self::Angle => "rad",
        }
    }

    /// Astro-unit expression for coordinates along this axis.
    pub fn astro_unit(&self) -> &'static str {
        match self {
            Self::Length => "kpc",
            Self::Angle => "rad",
        }
    }
}

/// Declared dimensionality of a run.
///
/// Every grid and field array of a snapshot has exactly this rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum Dimensions {
    One,
    Two,
    #[default]
    Three,
}

impl Dimensions {
    /// Number of active axes.
    pub fn count(&self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl TryFrom<usize> for Dimensions {
    type Error = PlutoError;

    fn try_from(n: usize) -> Result<Self> {
        match n {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(PlutoError::Config(format!(
                "dimensions must be 1, 2 or 3, got {}",
                other
            ))),
        }
    }
}

impl From<Dimensions> for usize {
    fn from(d: Dimensions) -> usize {
        d.count()
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}D", self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_parse() {
        assert_eq!(Geometry::parse("SPHERICAL").unwrap(), Geometry::Spherical);
        assert_eq!(Geometry::parse("polar").unwrap(), Geometry::Polar);
        assert_eq!(Geometry::parse(" CARTESIAN ").unwrap(), Geometry::Cartesian);
        assert!(matches!(
            Geometry::parse("CYLINDRICAL"),
            Err(PlutoError::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn test_geometry_axis_kinds() {
        assert_eq!(Geometry::Polar.axis_kinds()[1], AxisKind::Angle);
        assert_eq!(Geometry::Polar.axis_kinds()[2], AxisKind::Length);
        assert_eq!(Geometry::Spherical.axis_kinds()[2], AxisKind::Angle);
    }

    #[test]
    fn test_unit_state_order() {
        assert!(UnitState::Raw < UnitState::CodeUnits);
        assert!(UnitState::CodeUnits < UnitState::AstroUnits);
        assert!(!UnitState::Raw.has_units());
    }

    #[test]
    fn test_dimensions_try_from() {
        assert_eq!(Dimensions::try_from(2).unwrap(), Dimensions::Two);
        assert!(Dimensions::try_from(4).is_err());
        assert_eq!(usize::from(Dimensions::Three), 3);
    }
}
