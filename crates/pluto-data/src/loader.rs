//! Boundary with the snapshot reader.
//!
//! The core never touches snapshot files itself. A [`SnapshotLoader`]
//! hands it the run's step log and, for one step, the raw 1D axis arrays,
//! the raw field arrays and the step scalars. Field arrays arrive in the
//! reader's on-disk axis order, which is `(x3, x2, x1)`; the field store
//! reverses it on construction.

use std::collections::{BTreeMap, HashMap};

use ndarray::{Array1, ArrayD};
use tracing::debug;

use crate::error::{PlutoError, Result};
use crate::metadata::{StepLog, StepRecord};

/// Centre, edge and width arrays of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisData {
    pub centers: Array1<f64>,
    /// Cell interfaces; one more than the number of cells.
    pub edges: Array1<f64>,
    pub widths: Array1<f64>,
}

impl AxisData {
    /// Build an axis from its cell interfaces.
    pub fn from_edges(edges: Array1<f64>) -> Self {
        let n = edges.len().saturating_sub(1);
        let centers = Array1::from_shape_fn(n, |i| 0.5 * (edges[i] + edges[i + 1]));
        let widths = Array1::from_shape_fn(n, |i| edges[i + 1] - edges[i]);
        Self {
            centers,
            edges,
            widths,
        }
    }

    /// `n` equal cells spanning `[lo, hi]`.
    pub fn uniform(n: usize, lo: f64, hi: f64) -> Self {
        Self::from_edges(Array1::linspace(lo, hi, n + 1))
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Validate array lengths.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.centers.is_empty() {
            return Err("axis has no cells".to_string());
        }
        if self.widths.len() != self.centers.len() {
            return Err(format!(
                "{} widths for {} cells",
                self.widths.len(),
                self.centers.len()
            ));
        }
        if self.edges.len() != self.centers.len() + 1 {
            return Err(format!(
                "{} edges for {} cells, expected {}",
                self.edges.len(),
                self.centers.len(),
                self.centers.len() + 1
            ));
        }
        Ok(())
    }
}

/// Everything the reader returns for one saved step.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    /// Output file number.
    pub index: usize,
    /// Integration step at which the output was written.
    pub nstep: u64,
    pub time: f64,
    pub dt: f64,
    pub axes: [AxisData; 3],
    /// Raw field arrays in on-disk axis order.
    pub fields: HashMap<String, ArrayD<f64>>,
    /// Cells per axis without ghost zones.
    pub cells: [usize; 3],
    /// Cells per axis including ghost zones.
    pub cells_with_ghosts: [usize; 3],
}

impl RawSnapshot {
    /// A snapshot with the given axes and no fields.
    ///
    /// Ghost-zone counts default to the active cell counts.
    pub fn new(index: usize, time: f64, dt: f64, axes: [AxisData; 3]) -> Self {
        let cells = std::array::from_fn(|k| axes[k].len());
        Self {
            index,
            nstep: 0,
            time,
            dt,
            axes,
            fields: HashMap::new(),
            cells,
            cells_with_ghosts: cells,
        }
    }

    pub fn with_nstep(mut self, nstep: u64) -> Self {
        self.nstep = nstep;
        self
    }

    /// Add a field array, given in on-disk axis order.
    pub fn with_field(mut self, name: impl Into<String>, values: ArrayD<f64>) -> Self {
        self.fields.insert(name.into(), values);
        self
    }

    pub fn with_ghost_cells(mut self, cells_with_ghosts: [usize; 3]) -> Self {
        self.cells_with_ghosts = cells_with_ghosts;
        self
    }

    /// Step log entry describing this snapshot.
    pub fn record(&self) -> StepRecord {
        StepRecord {
            index: self.index,
            time: self.time,
            dt: self.dt,
            nstep: self.nstep,
        }
    }
}

/// Source of raw snapshots for one run.
pub trait SnapshotLoader {
    /// The run's step log.
    fn log(&self) -> Result<StepLog>;

    /// Load output number `index`.
    fn load(&self, index: usize) -> Result<RawSnapshot>;
}

/// Loader over snapshots held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    file_type: String,
    endianness: String,
    field_list: Vec<String>,
    snapshots: BTreeMap<usize, RawSnapshot>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self {
            file_type: "single_file".to_string(),
            endianness: "little".to_string(),
            ..Self::default()
        }
    }

    /// Add a snapshot. Its field names extend the run's field list.
    pub fn with_snapshot(mut self, snapshot: RawSnapshot) -> Self {
        self.insert(snapshot);
        self
    }

    pub fn insert(&mut self, snapshot: RawSnapshot) {
        let mut names: Vec<&String> = snapshot.fields.keys().collect();
        names.sort();
        for name in names {
            if !self.field_list.contains(name) {
                self.field_list.push(name.clone());
            }
        }
        debug!(index = snapshot.index, time = snapshot.time, "in-memory snapshot added");
        self.snapshots.insert(snapshot.index, snapshot);
    }

    /// Fix the order of the field list.
    pub fn with_field_list<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_list = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotLoader for InMemoryLoader {
    fn log(&self) -> Result<StepLog> {
        let records = self.snapshots.values().map(RawSnapshot::record).collect();
        Ok(StepLog::new(
            records,
            self.file_type.clone(),
            self.endianness.clone(),
            self.field_list.clone(),
        ))
    }

    fn load(&self, index: usize) -> Result<RawSnapshot> {
        self.snapshots
            .get(&index)
            .cloned()
            .ok_or_else(|| PlutoError::StepNotFound(format!("no snapshot with index {}", index)))
    }
}
