//! One saved output of a run: grid, fields and step scalars.
//!
//! A snapshot starts raw in the run's native geometry. Unit and geometry
//! transitions are applied to a copy of the grid and field store and
//! committed together, so a failed transition leaves the snapshot as it was.

use std::sync::Arc;

use ndarray::{Ix1, Ix2};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{PlutoError, Result};
use crate::fields::{FieldEnv, FieldStore};
use crate::grid::GridGeometry;
use crate::loader::RawSnapshot;
use crate::quantity::Quantity;
use crate::registry::FieldRegistry;
use crate::slice::{line_axes, nearest_index, plane_axes, take};
use crate::types::{Dimensions, Geometry, UnitState};
use crate::units::UnitSystem;

/// Unit of simulation time in code units.
const CODE_TIME: &str = "code_length/code_velocity";
/// Unit of simulation time in astro units.
const ASTRO_TIME: &str = "yr";

/// A loaded snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    index: usize,
    nstep: u64,
    time: Quantity,
    dt: Quantity,
    cells: [usize; 3],
    cells_with_ghosts: [usize; 3],
    unit_state: UnitState,
    grid: GridGeometry,
    fields: FieldStore,
    registry: Arc<FieldRegistry>,
    units: UnitSystem,
}

/// Serializable summary of a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub index: usize,
    pub nstep: u64,
    pub time: f64,
    pub dt: f64,
    pub time_unit: Option<String>,
    pub geometry: Geometry,
    pub native_geometry: Geometry,
    pub dimensions: Dimensions,
    pub unit_state: UnitState,
    pub cells: [usize; 3],
    pub cells_with_ghosts: [usize; 3],
    pub primal_fields: Vec<String>,
    pub derived_fields: Vec<String>,
    pub cached_fields: Vec<String>,
}

impl Snapshot {
    /// Build a raw snapshot from the loader's output.
    ///
    /// `registry` is the catalog this snapshot resolves fields against for
    /// its whole life.
    pub fn new(
        raw: RawSnapshot,
        config: &RunConfig,
        registry: Arc<FieldRegistry>,
        units: UnitSystem,
    ) -> Result<Self> {
        let grid = GridGeometry::new(&raw.axes, config.dimensions, config.geometry)?;
        let fields = FieldStore::new(
            raw.fields,
            &config.field_list,
            &registry,
            config.dimensions,
            grid.shape(),
        )?;

        info!(
            index = raw.index,
            time = raw.time,
            geometry = %config.geometry,
            dimensions = %config.dimensions,
            fields = config.field_list.len(),
            "snapshot loaded"
        );

        Ok(Self {
            index: raw.index,
            nstep: raw.nstep,
            time: Quantity::scalar(raw.time, None),
            dt: Quantity::scalar(raw.dt, None),
            cells: raw.cells,
            cells_with_ghosts: raw.cells_with_ghosts,
            unit_state: UnitState::Raw,
            grid,
            fields,
            registry,
            units,
        })
    }

    /// Output file number.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn nstep(&self) -> u64 {
        self.nstep
    }

    /// Simulation time, in the current unit state.
    pub fn time(&self) -> &Quantity {
        &self.time
    }

    /// Time step, in the current unit state.
    pub fn dt(&self) -> &Quantity {
        &self.dt
    }

    pub fn dimensions(&self) -> Dimensions {
        self.grid.dimensions()
    }

    pub fn geometry(&self) -> Geometry {
        self.grid.geometry()
    }

    pub fn native_geometry(&self) -> Geometry {
        self.grid.native_geometry()
    }

    pub fn unit_state(&self) -> UnitState {
        self.unit_state
    }

    /// Cells per axis without ghost zones.
    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    /// Cells per axis including ghost zones.
    pub fn cells_with_ghosts(&self) -> [usize; 3] {
        self.cells_with_ghosts
    }

    pub fn grid(&self) -> &GridGeometry {
        &self.grid
    }

    /// Grid array by PLUTO name (`x1`, `x2r`, `dx3`, `h2`, `dA1`, `dV`, ...).
    pub fn grid_array(&self, key: &str) -> Result<&Quantity> {
        self.grid.get(key)
    }

    /// Field store, for inspecting what is held without computing anything.
    pub fn fields(&self) -> &FieldStore {
        &self.fields
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn units(&self) -> &UnitSystem {
        &self.units
    }

    /// A field by name or alias, computing derived fields on first access.
    pub fn field(&mut self, name: &str) -> Result<&Quantity> {
        let env = FieldEnv {
            grid: &self.grid,
            registry: &self.registry,
            units: &self.units,
        };
        self.fields.get(name, env)
    }

    /// Evict a field from the store.
    pub fn remove_field(&mut self, name: &str) -> Result<Quantity> {
        self.fields.remove(name, &self.registry)
    }

    /// Recompute every cached derived field.
    pub fn refresh_derived(&mut self) -> Result<()> {
        let env = FieldEnv {
            grid: &self.grid,
            registry: &self.registry,
            units: &self.units,
        };
        self.fields.refresh_derived(env)
    }

    /// Attach code units to everything. No-op if units are already attached.
    pub fn to_code_units(&mut self) -> Result<()> {
        if self.unit_state.has_units() {
            debug!(state = %self.unit_state, "units already attached");
            return Ok(());
        }

        let mut next = self.clone();
        next.promote_to_code()?;
        *self = next;
        info!(index = self.index, "snapshot in code units");
        Ok(())
    }

    /// Express everything in astro units, going through code units if raw.
    pub fn to_astro_units(&mut self) -> Result<()> {
        if self.unit_state == UnitState::AstroUnits {
            debug!("already in astro units");
            return Ok(());
        }

        let mut next = self.clone();
        if next.unit_state == UnitState::Raw {
            next.promote_to_code()?;
        }
        next.grid.to_astro_units(&next.units)?;
        let env = FieldEnv {
            grid: &next.grid,
            registry: &next.registry,
            units: &next.units,
        };
        next.fields.to_astro_units(env)?;
        next.time = next.units.to_astro_units(next.time, ASTRO_TIME)?;
        next.dt = next.units.to_astro_units(next.dt, ASTRO_TIME)?;
        next.unit_state = UnitState::AstroUnits;

        *self = next;
        info!(index = self.index, "snapshot in astro units");
        Ok(())
    }

    fn promote_to_code(&mut self) -> Result<()> {
        self.grid.to_code_units(&self.units)?;
        let env = FieldEnv {
            grid: &self.grid,
            registry: &self.registry,
            units: &self.units,
        };
        self.fields.to_code_units(env)?;
        self.time = self.units.to_code_units(self.time.clone(), CODE_TIME)?;
        self.dt = self.units.to_code_units(self.dt.clone(), CODE_TIME)?;
        self.unit_state = UnitState::CodeUnits;
        Ok(())
    }

    /// Convert grid and velocity to Cartesian coordinates and components.
    ///
    /// Fails with `UnsupportedGeometry` if the snapshot is already Cartesian.
    pub fn to_cartesian(&mut self) -> Result<()> {
        if self.grid.geometry() == Geometry::Cartesian {
            return Err(PlutoError::UnsupportedGeometry(format!(
                "snapshot {} is already Cartesian",
                self.index
            )));
        }

        let mut next = self.clone();
        let angles = next.grid.rotation_angles()?;
        next.grid.to_cartesian()?;
        let env = FieldEnv {
            grid: &next.grid,
            registry: &next.registry,
            units: &next.units,
        };
        next.fields.to_cartesian(&angles, env)?;

        *self = next;
        info!(index = self.index, from = %self.native_geometry(), "snapshot in Cartesian coordinates");
        Ok(())
    }

    /// Plane through a 3D snapshot at one fixed coordinate.
    ///
    /// The coordinate is matched to the nearest cell centre on the native axis.
    pub fn slice2d(
        &mut self,
        field: &str,
        x1: Option<f64>,
        x2: Option<f64>,
        x3: Option<f64>,
    ) -> Result<Quantity<Ix2>> {
        let fixed = plane_axes(self.dimensions(), [x1, x2, x3])?;
        let indices = self.nearest_indices(&fixed)?;
        debug!(field, fixed = ?indices, "2D slice");

        let q = self.field(field)?;
        Quantity::new(take(q.values(), &indices), q.unit().cloned()).into_dimensionality::<Ix2>()
    }

    /// Line through a 2D or 3D snapshot with all but one coordinate fixed.
    pub fn slice1d(
        &mut self,
        field: &str,
        x1: Option<f64>,
        x2: Option<f64>,
        x3: Option<f64>,
    ) -> Result<Quantity<Ix1>> {
        let fixed = line_axes(self.dimensions(), [x1, x2, x3])?;
        let indices = self.nearest_indices(&fixed)?;
        debug!(field, fixed = ?indices, "1D slice");

        let q = self.field(field)?;
        Quantity::new(take(q.values(), &indices), q.unit().cloned()).into_dimensionality::<Ix1>()
    }

    fn nearest_indices(&self, fixed: &[(usize, f64)]) -> Result<Vec<(usize, usize)>> {
        fixed
            .iter()
            .map(|&(k, coord)| Ok((k, nearest_index(self.grid.axis(k).values().view(), coord)?)))
            .collect()
    }

    /// Summary of the snapshot's state.
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            index: self.index,
            nstep: self.nstep,
            time: self.time.scalar_value().unwrap_or(f64::NAN),
            dt: self.dt.scalar_value().unwrap_or(f64::NAN),
            time_unit: self.time.unit().map(|u| u.symbol().to_string()),
            geometry: self.geometry(),
            native_geometry: self.native_geometry(),
            dimensions: self.dimensions(),
            unit_state: self.unit_state,
            cells: self.cells,
            cells_with_ghosts: self.cells_with_ghosts,
            primal_fields: self.fields.primal_names().to_vec(),
            derived_fields: self.fields.derived_names().to_vec(),
            cached_fields: self.fields.cached_names().into_iter().map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::AxisData;
    use crate::units::BaseUnits;
    use ndarray::{Array3, ArrayD};
    use test_utils::assert_approx_eq;

    fn config(geometry: Geometry) -> RunConfig {
        RunConfig {
            geometry,
            dimensions: Dimensions::Three,
            field_list: vec!["rho".to_string(), "vx1".to_string()],
            ..RunConfig::default()
        }
    }

    fn raw(n: [usize; 3]) -> RawSnapshot {
        let axes = [
            AxisData::uniform(n[0], 1.0, 2.0),
            AxisData::uniform(n[1], 0.5, 2.5),
            AxisData::uniform(n[2], 0.0, 3.0),
        ];
        let on_disk = |scale: f64| -> ArrayD<f64> {
            Array3::from_shape_fn((n[2], n[1], n[0]), |(k, j, i)| scale * (100 * i + 10 * j + k) as f64).into_dyn()
        };
        RawSnapshot::new(4, 2.0, 0.01, axes)
            .with_field("rho", on_disk(1.0))
            .with_field("vx1", on_disk(0.5))
    }

    fn units() -> UnitSystem {
        UnitSystem::new(BaseUnits {
            length: 3.0856775814913673e21,
            density: 1.0e-24,
            velocity: 1.0e7,
        })
    }

    fn snapshot(geometry: Geometry) -> Snapshot {
        Snapshot::new(raw([4, 3, 2]), &config(geometry), Arc::new(FieldRegistry::builtin()), units()).unwrap()
    }

    #[test]
    fn test_new_is_raw_and_native() {
        let mut snap = snapshot(Geometry::Cartesian);
        assert_eq!(snap.unit_state(), UnitState::Raw);
        assert_eq!(snap.index(), 4);
        assert_eq!(snap.time().scalar_value(), Some(2.0));
        assert!(snap.time().is_raw());
        assert_eq!(snap.cells(), [4, 3, 2]);
        assert_eq!(snap.field("rho").unwrap().values()[[3, 2, 1]], 321.0);
        assert!(snap.field("rho").unwrap().is_raw());
    }

    #[test]
    fn test_time_follows_unit_state() {
        let mut snap = snapshot(Geometry::Cartesian);
        snap.to_code_units().unwrap();
        assert_eq!(snap.time().unit().unwrap().symbol(), CODE_TIME);
        assert_eq!(snap.time().scalar_value(), Some(2.0));

        snap.to_astro_units().unwrap();
        let seconds = 2.0 * 3.0856775814913673e21 / 1.0e7;
        assert_approx_eq!(snap.time().scalar_value().unwrap() / (seconds / 3.15576e7), 1.0, 1e-12);
        assert_eq!(snap.info().time_unit.as_deref(), Some("yr"));
    }

    #[test]
    fn test_failed_transition_leaves_snapshot_unchanged() {
        let mut cfg = config(Geometry::Cartesian);
        cfg.field_list.push("Bx1".to_string());
        let raw = raw([2, 2, 2]).with_field("Bx1", ArrayD::zeros(ndarray::IxDyn(&[2, 2, 2])));
        let mut snap = Snapshot::new(raw, &cfg, Arc::new(FieldRegistry::builtin()), units()).unwrap();

        assert!(matches!(snap.to_code_units(), Err(PlutoError::UnknownField(_))));
        assert_eq!(snap.unit_state(), UnitState::Raw);
        assert_eq!(snap.grid().unit_state(), UnitState::Raw);
        assert!(snap.grid().center(0).is_raw());
        assert!(snap.time().is_raw());
    }

    #[test]
    fn test_to_cartesian_twice_fails() {
        let mut snap = snapshot(Geometry::Spherical);
        snap.to_cartesian().unwrap();
        assert_eq!(snap.geometry(), Geometry::Cartesian);
        assert!(matches!(snap.to_cartesian(), Err(PlutoError::UnsupportedGeometry(_))));

        let mut cartesian = snapshot(Geometry::Cartesian);
        assert!(matches!(cartesian.to_cartesian(), Err(PlutoError::UnsupportedGeometry(_))));
    }

    #[test]
    fn test_slices() {
        let mut snap = snapshot(Geometry::Cartesian);
        // x2 centres are 0.5 + (j + 0.5) * 2/3
        let x2 = snap.grid().axis(1).values()[1];
        let plane = snap.slice2d("rho", None, Some(x2), None).unwrap();
        assert_eq!(plane.shape(), &[4, 2]);
        assert_eq!(plane.values()[[3, 1]], 311.0);

        let line = snap.slice1d("rho", Some(1.0e6), None, Some(-1.0e6)).unwrap();
        assert_eq!(line.shape(), &[3]);
        assert_eq!(line.values()[2], 320.0);

        assert!(matches!(
            snap.slice2d("rho", Some(1.0), Some(1.0), None),
            Err(PlutoError::InvalidSliceArguments(_))
        ));
        assert!(matches!(
            snap.slice2d("nope", Some(1.0), None, None),
            Err(PlutoError::UnknownField(_))
        ));
    }

    #[test]
    fn test_info_lists_fields() {
        let mut snap = snapshot(Geometry::Cartesian);
        snap.field("speed").unwrap_err();
        snap.field("mass").unwrap();
        let info = snap.info();
        assert_eq!(info.primal_fields, vec!["rho", "vx1"]);
        assert_eq!(info.cached_fields, vec!["mass", "rho", "vx1"]);
        assert_eq!(info.unit_state, UnitState::Raw);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["geometry"], "cartesian");
        assert_eq!(json["dimensions"], 3);
        assert_eq!(json["unit_state"], "Raw");
        assert_eq!(json["cells"][0], 4);
    }
}
