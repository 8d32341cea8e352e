//! Run metadata fixtures and temporary run directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// `definitions.h` of a 3D spherical run with kpc / km/s code units.
pub const DEFINITIONS_SPHERICAL: &str = "\
#define  PHYSICS                        HD
#define  DIMENSIONS                     3
#define  GEOMETRY                       SPHERICAL
#define  BODY_FORCE                     VECTOR
#define  COOLING                        NO
#define  RECONSTRUCTION                 LINEAR
#define  TIME_STEPPING                  RK2
#define  NTRACER                        1

/* -- user-defined parameters (labels) -- */

#define  UNIT_DENSITY                   (CONST_mp*0.1)
#define  UNIT_LENGTH                    (CONST_pc*1.e3)
#define  UNIT_VELOCITY                  1.e7
";

/// `definitions.h` of a 2D polar run without unit defines.
pub const DEFINITIONS_POLAR_2D: &str = "\
#define  PHYSICS                        HD
#define  DIMENSIONS                     2
#define  GEOMETRY                       POLAR
";

/// Step log of a run with three outputs.
pub const STEP_LOG: &str = "\
0 0.000000e+00 1.000000e-04 0 single_file little rho vx1 vx2 vx3 prs tr1
1 1.000000e-01 3.125000e-04 352 single_file little rho vx1 vx2 vx3 prs tr1
2 2.000000e-01 3.125000e-04 672 single_file little rho vx1 vx2 vx3 prs tr1
";

/// A run directory on disk, removed when dropped.
pub struct TempRunDir {
    dir: TempDir,
}

impl TempRunDir {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `definitions.h`.
    pub fn with_definitions(self, text: &str) -> io::Result<Self> {
        fs::write(self.path().join("definitions.h"), text)?;
        Ok(self)
    }

    /// Write `<datatype>.out`.
    pub fn with_step_log(self, datatype: &str, text: &str) -> io::Result<Self> {
        fs::write(self.path().join(format!("{}.out", datatype)), text)?;
        Ok(self)
    }

    /// Write an arbitrary file (e.g. a YAML run configuration).
    pub fn write(&self, name: &str, text: &str) -> io::Result<PathBuf> {
        let path = self.path().join(name);
        fs::write(&path, text)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_run_dir_writes_files() {
        let run = TempRunDir::new()
            .unwrap()
            .with_definitions(DEFINITIONS_POLAR_2D)
            .unwrap()
            .with_step_log("dbl", STEP_LOG)
            .unwrap();
        assert!(run.path().join("definitions.h").is_file());
        let log = fs::read_to_string(run.path().join("dbl.out")).unwrap();
        assert_eq!(log.lines().count(), 3);

        let yaml = run.write("run.yaml", "datatype: dbl\n").unwrap();
        assert!(yaml.is_file());
    }
}
