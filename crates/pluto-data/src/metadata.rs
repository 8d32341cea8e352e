//! Run metadata: `definitions.h` and the `<datatype>.out` step log.
//!
//! `definitions.h` carries the build-time choices of a PLUTO run:
//!
//! ```text
//! #define  GEOMETRY                SPHERICAL
//! #define  DIMENSIONS              3
//! #define  UNIT_DENSITY            (CONST_mp*0.1)
//! #define  UNIT_LENGTH             (CONST_pc*1.e3)
//! #define  UNIT_VELOCITY           1.e7
//! ```
//!
//! The step log has one line per saved output:
//!
//! ```text
//! <index> <time> <dt> <nstep> <file type> <endianness> <field> <field> ...
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlutoError, Result};
use crate::types::{Dimensions, Geometry};
use crate::units::{pluto_constant, BaseUnits, Unit, UnitExpr};

/// Values read from `definitions.h`. Absent defines stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    pub geometry: Option<Geometry>,
    pub dimensions: Option<Dimensions>,
    pub unit_length: Option<f64>,
    pub unit_density: Option<f64>,
    pub unit_velocity: Option<f64>,
}

impl Definitions {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Parse the `#define` lines that matter for post-processing.
    pub fn parse(text: &str) -> Result<Self> {
        let mut defs = Self::default();

        for (lineno, line) in text.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            if tokens.next() != Some("#define") {
                continue;
            }
            let Some(name) = tokens.next() else {
                continue;
            };
            let value: String = tokens.collect();
            if value.is_empty() {
                continue;
            }

            match name {
                "GEOMETRY" => defs.geometry = Some(Geometry::parse(&value)?),
                "DIMENSIONS" | "DIMENSION" => {
                    let n: usize = value.parse().map_err(|_| {
                        PlutoError::invalid_metadata(format!(
                            "line {}: DIMENSIONS must be an integer, got '{}'",
                            lineno + 1,
                            value
                        ))
                    })?;
                    defs.dimensions = Some(Dimensions::try_from(n)?);
                }
                "UNIT_LENGTH" => defs.unit_length = Some(evaluate_constant(&value)?),
                "UNIT_DENSITY" => defs.unit_density = Some(evaluate_constant(&value)?),
                "UNIT_VELOCITY" => defs.unit_velocity = Some(evaluate_constant(&value)?),
                other if other.starts_with("UNIT_") => {
                    debug!(define = other, "ignoring unit define");
                }
                _ => {}
            }
        }
        Ok(defs)
    }

    /// Base units with the defines applied over `base`.
    pub fn base_units(&self, base: BaseUnits) -> BaseUnits {
        BaseUnits {
            length: self.unit_length.unwrap_or(base.length),
            density: self.unit_density.unwrap_or(base.density),
            velocity: self.unit_velocity.unwrap_or(base.velocity),
        }
    }
}

/// Evaluate a numeric define such as `(1.e3*CONST_pc)`.
fn evaluate_constant(expression: &str) -> Result<f64> {
    let expr = UnitExpr::parse(expression)?;
    let unit = expr.evaluate(&|name: &str| pluto_constant(name).map(Unit::scalar), expression)?;
    if !unit.dimension().is_dimensionless() {
        return Err(PlutoError::invalid_metadata(format!(
            "'{}' does not evaluate to a number",
            expression
        )));
    }
    Ok(unit.scale())
}

/// One line of the step log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Output file number.
    pub index: usize,
    pub time: f64,
    pub dt: f64,
    /// Integration step at which the output was written.
    pub nstep: u64,
}

/// How to pick a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepSelector {
    /// Output number; negative selects the last logged output.
    Step(i64),
    /// Simulation time; selects the output nearest in time.
    Time(f64),
}

impl From<i64> for StepSelector {
    fn from(step: i64) -> Self {
        Self::Step(step)
    }
}

impl From<f64> for StepSelector {
    fn from(time: f64) -> Self {
        Self::Time(time)
    }
}

/// Parsed `<datatype>.out` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    records: Vec<StepRecord>,
    file_type: String,
    endianness: String,
    field_list: Vec<String>,
}

impl StepLog {
    pub fn new(records: Vec<StepRecord>, file_type: String, endianness: String, field_list: Vec<String>) -> Self {
        Self {
            records,
            file_type,
            endianness,
            field_list,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Parse a step log.
    ///
    /// File type, endianness and field list are taken from the last line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut log = Self::default();

        for (lineno, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() < 6 {
                return Err(PlutoError::invalid_metadata(format!(
                    "step log line {}: expected at least 6 columns, got {}",
                    lineno + 1,
                    tokens.len()
                )));
            }

            let bad = |column: &str| {
                PlutoError::invalid_metadata(format!("step log line {}: bad {} column", lineno + 1, column))
            };
            log.records.push(StepRecord {
                index: tokens[0].parse().map_err(|_| bad("index"))?,
                time: tokens[1].parse().map_err(|_| bad("time"))?,
                dt: tokens[2].parse().map_err(|_| bad("dt"))?,
                nstep: tokens[3].parse().map_err(|_| bad("nstep"))?,
            });
            log.file_type = tokens[4].to_string();
            log.endianness = tokens[5].to_string();
            log.field_list = tokens[6..].iter().map(|s| s.to_string()).collect();
        }

        if log.records.is_empty() {
            return Err(PlutoError::invalid_metadata("step log is empty"));
        }
        if log.field_list.is_empty() {
            warn!("step log lists no fields");
        }
        Ok(log)
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn endianness(&self) -> &str {
        &self.endianness
    }

    pub fn field_list(&self) -> &[String] {
        &self.field_list
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// Output number selected by `selector`.
    ///
    /// Ties in time go to the earlier output.
    pub fn resolve(&self, selector: StepSelector) -> Result<usize> {
        match selector {
            StepSelector::Step(step) if step < 0 => self
                .last()
                .map(|r| r.index)
                .ok_or_else(|| PlutoError::StepNotFound("step log is empty".to_string())),
            StepSelector::Step(step) => {
                let index = step as usize;
                if self.records.iter().any(|r| r.index == index) {
                    Ok(index)
                } else {
                    Err(PlutoError::StepNotFound(format!("output {} is not in the step log", index)))
                }
            }
            StepSelector::Time(time) => {
                if !time.is_finite() {
                    return Err(PlutoError::StepNotFound(format!("time {} is not finite", time)));
                }
                let mut best: Option<&StepRecord> = None;
                for record in &self.records {
                    let closer = match best {
                        Some(b) => (record.time - time).abs() < (b.time - time).abs(),
                        None => true,
                    };
                    if closer {
                        best = Some(record);
                    }
                }
                best.map(|r| r.index)
                    .ok_or_else(|| PlutoError::StepNotFound("step log is empty".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITIONS: &str = "\
#define  PHYSICS                        HD
#define  DIMENSIONS                     2
#define  GEOMETRY                       POLAR
#define  BODY_FORCE                     NO

/* -- user-defined parameters (labels) -- */

#define  UNIT_DENSITY                   (CONST_mp*0.1)
#define  UNIT_LENGTH                    (CONST_pc*1.e3)
#define  UNIT_VELOCITY                  1.e7
";

    const STEP_LOG: &str = "\
0 0.000000e+00 1.000000e-04 0 single_file little rho vx1 vx2 prs
1 1.000000e-01 2.500000e-04 412 single_file little rho vx1 vx2 prs
2 2.000000e-01 2.500000e-04 815 single_file little rho vx1 vx2 prs tr1
";

    #[test]
    fn test_parse_definitions() {
        let defs = Definitions::parse(DEFINITIONS).unwrap();
        assert_eq!(defs.geometry, Some(Geometry::Polar));
        assert_eq!(defs.dimensions, Some(Dimensions::Two));
        let mp = pluto_constant("CONST_mp").unwrap();
        let pc = pluto_constant("CONST_pc").unwrap();
        assert!((defs.unit_density.unwrap() / (mp * 0.1) - 1.0).abs() < 1e-12);
        assert!((defs.unit_length.unwrap() / (pc * 1.0e3) - 1.0).abs() < 1e-12);
        assert_eq!(defs.unit_velocity, Some(1.0e7));

        let base = defs.base_units(BaseUnits::default());
        assert_eq!(base.velocity, 1.0e7);
    }

    #[test]
    fn test_definitions_defaults_and_errors() {
        let defs = Definitions::parse("#define  PHYSICS  MHD\n").unwrap();
        assert_eq!(defs, Definitions::default());
        assert_eq!(defs.base_units(BaseUnits::default()), BaseUnits::default());

        assert!(matches!(
            Definitions::parse("#define  GEOMETRY  CYLINDRICAL\n"),
            Err(PlutoError::UnsupportedGeometry(_))
        ));
        assert!(matches!(
            Definitions::parse("#define  UNIT_LENGTH  (CONST_nope*2)\n"),
            Err(PlutoError::UnknownUnitSymbol { .. })
        ));
    }

    #[test]
    fn test_parse_step_log() {
        let log = StepLog::parse(STEP_LOG).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.records()[1].nstep, 412);
        assert_eq!(log.file_type(), "single_file");
        assert_eq!(log.endianness(), "little");
        // the last line wins
        assert_eq!(log.field_list(), &["rho", "vx1", "vx2", "prs", "tr1"]);
    }

    #[test]
    fn test_step_log_errors() {
        assert!(matches!(StepLog::parse(""), Err(PlutoError::InvalidMetadata(_))));
        assert!(matches!(
            StepLog::parse("0 zero 1e-4 0 single_file little rho\n"),
            Err(PlutoError::InvalidMetadata(_))
        ));
        assert!(matches!(StepLog::parse("0 0.0 1e-4\n"), Err(PlutoError::InvalidMetadata(_))));
    }

    #[test]
    fn test_resolve_selector() {
        let log = StepLog::parse(STEP_LOG).unwrap();
        assert_eq!(log.resolve(StepSelector::Step(-1)).unwrap(), 2);
        assert_eq!(log.resolve(StepSelector::Step(1)).unwrap(), 1);
        assert!(matches!(log.resolve(StepSelector::Step(9)), Err(PlutoError::StepNotFound(_))));

        assert_eq!(log.resolve(StepSelector::Time(0.12)).unwrap(), 1);
        assert_eq!(log.resolve(0.19_f64.into()).unwrap(), 2);
        assert_eq!(log.resolve(StepSelector::Time(-5.0)).unwrap(), 0);
        assert_eq!(log.resolve(StepSelector::Time(1.0e3)).unwrap(), 2);
        // equidistant: the earlier output
        assert_eq!(log.resolve(StepSelector::Time(0.05)).unwrap(), 0);
    }
}
