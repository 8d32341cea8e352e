//! Unit-aware data model for PLUTO fixed-grid simulation output.
//!
//! This crate turns the raw arrays of a PLUTO snapshot into a consistent,
//! unit-aware object. It provides:
//!
//! - **Units**: code units from the run's three base units, astro units
//!   (kpc, km/s, Msun, yr, ...) and exact conversion between them
//! - **Field registry**: names, aliases, unit expressions and compute
//!   functions for primal and derived fields
//! - **Grid geometry**: cell centres, edges, widths, scale factors, face
//!   areas and volumes for Cartesian, polar and spherical grids
//! - **Snapshots**: a raw → code → astro unit state machine, conversion to
//!   Cartesian coordinates, and 2D/1D slicing at physical coordinates
//!
//! # Architecture
//!
//! ```text
//! Dataset (RunConfig, FieldRegistry, UnitSystem, loader)
//!      │
//!      ▼
//! Dataset::snapshot(step | time)
//!      │
//!      ├─► SnapshotLoader::load(index)  ──►  RawSnapshot
//!      │
//!      └─► Snapshot
//!            ├─► GridGeometry   meshes + metrics
//!            └─► FieldStore     primal arrays + derived cache
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pluto_data::{Dataset, RunConfig};
//!
//! let config = RunConfig::from_run_dir("./run", "dbl")?;
//! let dataset = Dataset::new(config, my_loader)?;
//!
//! let mut snap = dataset.snapshot(-1_i64)?;
//! snap.to_astro_units()?;
//! let speed = snap.slice2d("speed", None, None, Some(0.0))?;
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod fields;
pub mod grid;
pub mod loader;
pub mod metadata;
pub mod quantity;
pub mod registry;
pub mod slice;
pub mod snapshot;
pub mod types;
pub mod units;

// Re-export commonly used types at crate root
pub use config::RunConfig;
pub use dataset::Dataset;
pub use error::{PlutoError, Result};
pub use fields::{FieldContext, FieldStore};
pub use grid::GridGeometry;
pub use loader::{AxisData, InMemoryLoader, RawSnapshot, SnapshotLoader};
pub use metadata::{Definitions, StepLog, StepRecord, StepSelector};
pub use quantity::Quantity;
pub use registry::{ComputeFn, FieldEntry, FieldKind, FieldRegistry};
pub use slice::nearest_index;
pub use snapshot::{Snapshot, SnapshotInfo};
pub use types::{AxisKind, Dimensions, Geometry, UnitState};
pub use units::{BaseUnits, Dimension, Unit, UnitExpr, UnitSystem};
