//! Units: dimensions, concrete units and the per-run unit system.
//!
//! A [`Unit`] is a scale factor relative to CGS plus the exponents of its
//! physical dimension. The [`UnitSystem`] resolves unit expressions against
//! the run's three base units (`code_length`, `code_density`,
//! `code_velocity`) and the fixed set of physical symbols.

pub mod constants;
pub mod expr;

use ndarray::Dimension as ArrayDimension;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{PlutoError, Result};
use crate::quantity::Quantity;
use crate::types::UnitState;

pub use constants::{physical_unit, pluto_constant, PLUTO_CONSTANTS};
pub use expr::UnitExpr;

/// Exponents of (length, mass, time, temperature).
///
/// Angles are dimensionless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension([i32; 4]);

impl Dimension {
    pub const NONE: Self = Self([0, 0, 0, 0]);
    pub const LENGTH: Self = Self([1, 0, 0, 0]);
    pub const MASS: Self = Self([0, 1, 0, 0]);
    pub const TIME: Self = Self([0, 0, 1, 0]);
    pub const TEMPERATURE: Self = Self([0, 0, 0, 1]);

    /// Create a dimension from raw exponents.
    pub const fn new(length: i32, mass: i32, time: i32, temperature: i32) -> Self {
        Self([length, mass, time, temperature])
    }

    /// Get the exponents (length, mass, time, temperature).
    pub fn exponents(&self) -> [i32; 4] {
        self.0
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0 == [0, 0, 0, 0]
    }

    pub fn mul(self, other: Self) -> Self {
        let mut out = self.0;
        for (o, b) in out.iter_mut().zip(other.0) {
            *o += b;
        }
        Self(out)
    }

    pub fn powi(self, n: i32) -> Self {
        Self(self.0.map(|e| e * n))
    }

    /// Halve every exponent; `None` if any exponent is odd.
    pub fn sqrt(self) -> Option<Self> {
        if self.0.iter().any(|e| e % 2 != 0) {
            return None;
        }
        Some(Self(self.0.map(|e| e / 2)))
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = ["L", "M", "T", "Θ"];
        let parts: Vec<String> = names
            .iter()
            .zip(self.0)
            .filter(|(_, e)| *e != 0)
            .map(|(n, e)| if e == 1 { n.to_string() } else { format!("{}^{}", n, e) })
            .collect();
        if parts.is_empty() {
            write!(f, "1")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// A concrete unit: a CGS scale factor, a dimension and a display label.
#[derive(Debug, Clone)]
pub struct Unit {
    symbol: String,
    scale: f64,
    dimension: Dimension,
}

impl Unit {
    pub fn new(symbol: impl Into<String>, scale: f64, dimension: Dimension) -> Self {
        Self {
            symbol: symbol.into(),
            scale,
            dimension,
        }
    }

    /// Dimensionless unit with scale 1.
    pub fn dimensionless() -> Self {
        Self::new("", 1.0, Dimension::NONE)
    }

    /// Dimensionless pure number.
    pub fn scalar(value: f64) -> Self {
        Self::new(value.to_string(), value, Dimension::NONE)
    }

    /// Label used for display (e.g. axis labels).
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Size of one of this unit in CGS.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Same unit with a different display label.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn mul(&self, other: &Unit) -> Unit {
        let symbol = match (self.symbol.is_empty(), other.symbol.is_empty()) {
            (true, _) => other.symbol.clone(),
            (_, true) => self.symbol.clone(),
            _ => format!("{} {}", self.symbol, other.symbol),
        };
        Unit::new(symbol, self.scale * other.scale, self.dimension.mul(other.dimension))
    }

    pub fn powi(&self, n: i32) -> Unit {
        let symbol = match (self.symbol.is_empty(), n) {
            (true, _) => String::new(),
            (_, 1) => self.symbol.clone(),
            _ => format!("({})^{}", self.symbol, n),
        };
        Unit::new(symbol, self.scale.powi(n), self.dimension.powi(n))
    }

    pub fn sqrt(&self) -> Result<Unit> {
        let dimension = self
            .dimension
            .sqrt()
            .ok_or_else(|| PlutoError::incompatible(self.symbol.clone(), format!("sqrt({})", self.symbol)))?;
        let symbol = if self.symbol.is_empty() {
            String::new()
        } else {
            format!("sqrt({})", self.symbol)
        };
        Ok(Unit::new(symbol, self.scale.sqrt(), dimension))
    }

    /// Multiplicative factor converting a value in `self` into `target`.
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64> {
        if self.dimension != target.dimension {
            return Err(PlutoError::incompatible(
                format!("{} [{}]", self.symbol, self.dimension),
                format!("{} [{}]", target.symbol, target.dimension),
            ));
        }
        Ok(self.scale / target.scale)
    }

    /// Same dimension and scale to within a relative tolerance.
    pub fn is_equivalent(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
            && (self.scale - other.scale).abs() <= 1e-12 * self.scale.abs().max(other.scale.abs())
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension && self.scale == other.scale
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Base units of a run, in CGS.
///
/// These come from the `UNIT_LENGTH`, `UNIT_DENSITY` and `UNIT_VELOCITY`
/// defines of `definitions.h`; PLUTO defaults all three to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseUnits {
    /// Code length in cm.
    pub length: f64,
    /// Code density in g/cm³.
    pub density: f64,
    /// Code velocity in cm/s.
    pub velocity: f64,
}

impl Default for BaseUnits {
    fn default() -> Self {
        Self {
            length: 1.0,
            density: 1.0,
            velocity: 1.0,
        }
    }
}

impl BaseUnits {
    /// Validate the base units.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("length", self.length),
            ("density", self.density),
            ("velocity", self.velocity),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("unit {} must be a positive finite number, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Unit system of one run: base units plus the fixed astro target set.
#[derive(Debug, Clone)]
pub struct UnitSystem {
    base: BaseUnits,
    code_length: Unit,
    code_density: Unit,
    code_velocity: Unit,
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self::new(BaseUnits::default())
    }
}

impl UnitSystem {
    /// Create the unit system for a set of base units.
    pub fn new(base: BaseUnits) -> Self {
        let length = Dimension::LENGTH;
        let density = Dimension::MASS.mul(Dimension::LENGTH.powi(-3));
        let velocity = Dimension::LENGTH.mul(Dimension::TIME.powi(-1));

        Self {
            base,
            code_length: Unit::new("code_length", base.length, length),
            code_density: Unit::new("code_density", base.density, density),
            code_velocity: Unit::new("code_velocity", base.velocity, velocity),
        }
    }

    pub fn base(&self) -> &BaseUnits {
        &self.base
    }

    /// Look up a symbol: code base units first, then physical units.
    pub fn symbol(&self, name: &str) -> Option<Unit> {
        match name {
            "code_length" => Some(self.code_length.clone()),
            "code_density" => Some(self.code_density.clone()),
            "code_velocity" => Some(self.code_velocity.clone()),
            other => physical_unit(other),
        }
    }

    /// Parse and evaluate a unit expression regardless of state.
    ///
    /// An empty expression is dimensionless.
    pub fn unit(&self, expression: &str) -> Result<Unit> {
        let expr = UnitExpr::parse(expression)?;
        let unit = expr.evaluate(&|name: &str| self.symbol(name), expression)?;
        Ok(unit.with_symbol(expression.trim()))
    }

    /// Resolve a unit expression for a unit state.
    ///
    /// Returns `None` in the raw state, where values carry no unit. The
    /// expression is still checked so that unknown symbols surface early.
    pub fn resolve(&self, expression: &str, state: UnitState) -> Result<Option<Unit>> {
        let unit = self.unit(expression)?;
        Ok(state.has_units().then_some(unit))
    }

    /// Attach the code unit to a raw value, or re-express a unit-tagged one.
    pub fn to_code_units<D: ArrayDimension>(
        &self,
        value: Quantity<D>,
        expression: &str,
    ) -> Result<Quantity<D>> {
        let unit = self.unit(expression)?;
        trace!(unit = %unit, raw = value.is_raw(), "converting to code units");
        if value.is_raw() {
            Ok(value.attach(unit))
        } else {
            value.to(&unit)
        }
    }

    /// Convert a unit-tagged value into its astro unit.
    ///
    /// Raw values must be promoted to code units first.
    pub fn to_astro_units<D: ArrayDimension>(
        &self,
        value: Quantity<D>,
        expression: &str,
    ) -> Result<Quantity<D>> {
        if value.is_raw() {
            return Err(PlutoError::InvalidStateTransition {
                from: UnitState::Raw,
                to: UnitState::AstroUnits,
            });
        }
        let unit = self.unit(expression)?;
        value.to(&unit)
    }
}
