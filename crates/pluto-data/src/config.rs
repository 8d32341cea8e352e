//! Run configuration.
//!
//! A run is described by its geometry, dimensionality, base units and the
//! list of fields saved on disk. The configuration is normally read from the
//! run directory (`definitions.h` plus the step log) but can also come from a
//! YAML file, and any of the physical settings can be overridden from the
//! environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PlutoError, Result};
use crate::metadata::{Definitions, StepLog};
use crate::types::{Dimensions, Geometry};
use crate::units::BaseUnits;

/// Configuration of one PLUTO run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding the outputs, `definitions.h` and the step log.
    pub run_dir: Option<PathBuf>,

    /// Output format, e.g. `vtk`, `dbl` or `flt`. Names the step log file.
    pub datatype: String,

    pub geometry: Geometry,

    pub dimensions: Dimensions,

    /// Base units in CGS.
    pub units: BaseUnits,

    /// Fields saved on disk, in file order.
    pub field_list: Vec<String>,

    /// `single_file` or `multiple_files`.
    pub file_type: Option<String>,

    pub endianness: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_dir: None,
            datatype: "vtk".to_string(),
            geometry: Geometry::Cartesian,
            dimensions: Dimensions::Three,
            units: BaseUnits::default(),
            field_list: Vec::new(),
            file_type: None,
            endianness: None,
        }
    }
}

impl RunConfig {
    /// Read the configuration of the run in `dir`.
    ///
    /// Field list, file type and endianness come from the last line of
    /// `<datatype>.out`. Geometry, dimensionality and units come from
    /// `definitions.h`; without it the defaults are kept.
    pub fn from_run_dir(dir: impl AsRef<Path>, datatype: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let mut config = Self {
            run_dir: Some(dir.to_path_buf()),
            datatype: datatype.to_string(),
            ..Self::default()
        };

        let log = StepLog::from_file(config.step_log_path(dir))?;
        config.field_list = log.field_list().to_vec();
        config.file_type = Some(log.file_type().to_string());
        config.endianness = Some(log.endianness().to_string());

        let definitions = dir.join("definitions.h");
        if definitions.is_file() {
            config.apply_definitions(&Definitions::from_file(&definitions)?);
        } else {
            warn!(
                dir = %dir.display(),
                "definitions.h not found, keeping Cartesian geometry and base units of 1"
            );
        }

        info!(
            dir = %dir.display(),
            geometry = %config.geometry,
            dimensions = %config.dimensions,
            outputs = log.len(),
            fields = ?config.field_list,
            "run configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Path of the step log for this configuration's datatype.
    pub fn step_log_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.out", self.datatype))
    }

    /// Apply the values found in `definitions.h`.
    pub fn apply_definitions(&mut self, definitions: &Definitions) {
        if let Some(geometry) = definitions.geometry {
            self.geometry = geometry;
        }
        match definitions.dimensions {
            Some(dimensions) => self.dimensions = dimensions,
            None => debug!("definitions.h has no DIMENSIONS, keeping {}", self.dimensions),
        }
        self.units = definitions.base_units(self.units);
    }

    /// Override settings from `PLUTO_*` environment variables.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PLUTO_GEOMETRY") {
            match Geometry::parse(&val) {
                Ok(geometry) => self.geometry = geometry,
                Err(e) => warn!(value = %val, error = %e, "ignoring PLUTO_GEOMETRY"),
            }
        }

        if let Some(val) = lookup("PLUTO_DIMENSIONS") {
            match val.trim().parse::<usize>().map_err(|e| e.to_string()).and_then(|n| {
                Dimensions::try_from(n).map_err(|e| e.to_string())
            }) {
                Ok(dimensions) => self.dimensions = dimensions,
                Err(e) => warn!(value = %val, error = %e, "ignoring PLUTO_DIMENSIONS"),
            }
        }

        for (key, slot) in [
            ("PLUTO_UNIT_LENGTH", &mut self.units.length),
            ("PLUTO_UNIT_DENSITY", &mut self.units.density),
            ("PLUTO_UNIT_VELOCITY", &mut self.units.velocity),
        ] {
            if let Some(val) = lookup(key) {
                match val.trim().parse::<f64>() {
                    Ok(v) => *slot = v,
                    Err(e) => warn!(key, value = %val, error = %e, "ignoring unit override"),
                }
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.datatype.trim().is_empty() {
            return Err("datatype must not be empty".to_string());
        }

        self.units.validate()?;

        for (i, name) in self.field_list.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(format!("field_list entry {} is empty", i));
            }
            if self.field_list[..i].contains(name) {
                return Err(format!("field '{}' is listed twice", name));
            }
        }

        Ok(())
    }

    /// Validate, converting the message into a [`PlutoError::Config`].
    pub fn validated(self) -> Result<Self> {
        self.validate().map_err(PlutoError::Config)?;
        Ok(self)
    }
}
