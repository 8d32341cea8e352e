//! Grid geometry of one snapshot.
//!
//! Holds the cell-centre, cell-edge and cell-width meshes for the three
//! axes, broadcast from the loader's 1D axis arrays to the run's declared
//! dimensionality, together with the metric factors derived from them:
//!
//! ```text
//! Cartesian   h = (1, 1, 1)
//! Polar       h = (1, r, 1)            axes (r, φ, z)
//! Spherical   h = (1, r, r·sin θ)      axes (r, θ, φ)
//!
//! dA1 = h2·h3·dx2·dx3   dA2 = h1·h3·dx1·dx3   dA3 = h1·h2·dx1·dx2
//! dV  = h1·h2·h3·dx1·dx2·dx3
//! ```
//!
//! Metrics are recomputed eagerly after every coordinate or unit change.
//! Transitions are crate-private; [`crate::Snapshot`] drives them together
//! with the field store.

use ndarray::{Array1, ArrayD, Dimension, Ix1, IxDyn};
use tracing::debug;

use crate::error::{PlutoError, Result};
use crate::loader::AxisData;
use crate::quantity::Quantity;
use crate::types::{AxisKind, Dimensions, Geometry, UnitState};
use crate::units::{Unit, UnitSystem};

/// Grid meshes and metrics.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    native_geometry: Geometry,
    geometry: Geometry,
    dimensions: Dimensions,
    unit_state: UnitState,
    /// 1D cell centres per axis, as loaded. Follow unit changes only.
    axes: [Quantity<Ix1>; 3],
    centers: [Quantity; 3],
    edges: [Quantity; 3],
    widths: [Quantity; 3],
    scale_factors: [Quantity; 3],
    areas: [Quantity; 3],
    volume: Quantity,
}

impl GridGeometry {
    /// Build the meshes from per-axis 1D arrays.
    ///
    /// Axes beyond `dimensions` contribute their single centre (and lower
    /// edge) value to every cell.
    pub fn new(axes: &[AxisData; 3], dimensions: Dimensions, geometry: Geometry) -> Result<Self> {
        for (k, axis) in axes.iter().enumerate() {
            axis.validate().map_err(|msg| {
                PlutoError::shape_mismatch(format!("axis x{}: {}", k + 1, msg))
            })?;
        }

        let active = dimensions.count();
        let cell_shape: Vec<usize> = axes[..active].iter().map(|a| a.centers.len()).collect();
        let edge_shape: Vec<usize> = cell_shape.iter().map(|n| n + 1).collect();

        let centers = std::array::from_fn(|k| {
            Quantity::raw(broadcast(&axes[k].centers, k, active, &cell_shape))
        });
        let widths = std::array::from_fn(|k| {
            Quantity::raw(broadcast(&axes[k].widths, k, active, &cell_shape))
        });
        let edges = std::array::from_fn(|k| {
            Quantity::raw(broadcast(&axes[k].edges, k, active, &edge_shape))
        });
        let ones = || Quantity::raw(ArrayD::ones(IxDyn(&cell_shape)));

        let mut grid = Self {
            native_geometry: geometry,
            geometry,
            dimensions,
            unit_state: UnitState::Raw,
            axes: std::array::from_fn(|k| Quantity::raw(axes[k].centers.clone())),
            centers,
            edges,
            widths,
            scale_factors: [ones(), ones(), ones()],
            areas: [ones(), ones(), ones()],
            volume: ones(),
        };
        grid.update_metrics()?;

        debug!(
            geometry = %geometry,
            dimensions = %dimensions,
            shape = ?cell_shape,
            "built grid geometry"
        );
        Ok(grid)
    }

    /// Active coordinate system.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Coordinate system the run was simulated in.
    pub fn native_geometry(&self) -> Geometry {
        self.native_geometry
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn unit_state(&self) -> UnitState {
        self.unit_state
    }

    /// Shape of cell-centred arrays.
    pub fn shape(&self) -> &[usize] {
        self.centers[0].shape()
    }

    /// Cell counts along the three axes (collapsed axes count 1).
    pub fn cell_counts(&self) -> [usize; 3] {
        std::array::from_fn(|k| self.axes[k].values().len())
    }

    /// Native 1D cell-centre coordinates of axis `k` (0-based).
    pub fn axis(&self, k: usize) -> &Quantity<Ix1> {
        &self.axes[k]
    }

    /// Cell-centre mesh of axis `k` (0-based).
    pub fn center(&self, k: usize) -> &Quantity {
        &self.centers[k]
    }

    /// Cell-edge mesh of axis `k` (0-based).
    pub fn edge(&self, k: usize) -> &Quantity {
        &self.edges[k]
    }

    /// Cell-width mesh of axis `k` (0-based).
    pub fn width(&self, k: usize) -> &Quantity {
        &self.widths[k]
    }

    /// Scale factor h of axis `k` (0-based).
    pub fn scale_factor(&self, k: usize) -> &Quantity {
        &self.scale_factors[k]
    }

    /// Area of the cell face normal to axis `k` (0-based).
    pub fn area(&self, k: usize) -> &Quantity {
        &self.areas[k]
    }

    /// Cell volume.
    pub fn dv(&self) -> &Quantity {
        &self.volume
    }

    /// Look up an array by its PLUTO name (`x1`, `x2r`, `dx3`, `h2`, `dA1`, `dV`, ...).
    pub fn get(&self, key: &str) -> Result<&Quantity> {
        let axis = |c: Option<char>| match c {
            Some('1') => Some(0),
            Some('2') => Some(1),
            Some('3') => Some(2),
            _ => None,
        };
        let found = match key {
            "dV" => Some(&self.volume),
            _ if key.starts_with("dA") && key.len() == 3 => axis(key.chars().nth(2)).map(|k| &self.areas[k]),
            _ if key.starts_with("dx") && key.len() == 3 => axis(key.chars().nth(2)).map(|k| &self.widths[k]),
            _ if key.starts_with('h') && key.len() == 2 => axis(key.chars().nth(1)).map(|k| &self.scale_factors[k]),
            _ if key.starts_with('x') && key.len() == 3 && key.ends_with('r') => {
                axis(key.chars().nth(1)).map(|k| &self.edges[k])
            }
            _ if key.starts_with('x') && key.len() == 2 => axis(key.chars().nth(1)).map(|k| &self.centers[k]),
            _ => None,
        };
        found.ok_or_else(|| PlutoError::unknown_field(format!("grid array '{}'", key)))
    }

    /// Axis kinds of the active coordinate system.
    fn axis_kinds(&self) -> [AxisKind; 3] {
        self.geometry.axis_kinds()
    }

    /// Recompute scale factors, face areas and cell volume.
    pub(crate) fn update_metrics(&mut self) -> Result<()> {
        let ones = self.dimensionless(ArrayD::ones(IxDyn(self.shape())));

        self.scale_factors = match self.geometry {
            Geometry::Cartesian => [ones.clone(), ones.clone(), ones],
            Geometry::Polar => [ones.clone(), self.centers[0].clone(), ones],
            Geometry::Spherical => {
                let sin_theta = self.dimensionless(self.centers[1].values().mapv(f64::sin));
                let h3 = self.centers[0].mul(&sin_theta)?;
                [ones, self.centers[0].clone(), h3]
            }
        };

        let [h1, h2, h3] = &self.scale_factors;
        let [dx1, dx2, dx3] = &self.widths;
        self.areas = [
            h2.mul(h3)?.mul(dx2)?.mul(dx3)?,
            h1.mul(h3)?.mul(dx1)?.mul(dx3)?,
            h1.mul(h2)?.mul(dx1)?.mul(dx2)?,
        ];
        self.volume = h1.mul(h2)?.mul(h3)?.mul(dx1)?.mul(dx2)?.mul(dx3)?;
        Ok(())
    }

    /// Attach (raw) or re-express (already tagged) code units on every coordinate array.
    pub(crate) fn to_code_units(&mut self, units: &UnitSystem) -> Result<()> {
        let kinds = self.axis_kinds();
        let native_kinds = self.native_geometry.axis_kinds();

        self.axes = convert_family(&self.axes, native_kinds, |q, kind| units.to_code_units(q, kind.code_unit()))?;
        for family in [&mut self.centers, &mut self.edges, &mut self.widths] {
            *family = convert_family(family, kinds, |q, kind| units.to_code_units(q, kind.code_unit()))?;
        }

        self.unit_state = UnitState::CodeUnits;
        self.update_metrics()?;
        debug!(geometry = %self.geometry, "grid in code units");
        Ok(())
    }

    /// Express every coordinate array in astro units, promoting to code units first if raw.
    pub(crate) fn to_astro_units(&mut self, units: &UnitSystem) -> Result<()> {
        if self.unit_state == UnitState::Raw {
            self.to_code_units(units)?;
        }

        let kinds = self.axis_kinds();
        let native_kinds = self.native_geometry.axis_kinds();

        self.axes = convert_family(&self.axes, native_kinds, |q, kind| units.to_astro_units(q, kind.astro_unit()))?;
        for family in [&mut self.centers, &mut self.edges, &mut self.widths] {
            *family = convert_family(family, kinds, |q, kind| units.to_astro_units(q, kind.astro_unit()))?;
        }

        self.unit_state = UnitState::AstroUnits;
        self.update_metrics()?;
        debug!(geometry = %self.geometry, "grid in astro units");
        Ok(())
    }

    /// Angular coordinates used to rotate vectors into Cartesian components.
    pub(crate) fn rotation_angles(&self) -> Result<RotationAngles> {
        match self.geometry {
            Geometry::Polar => Ok(RotationAngles::Polar {
                phi: self.centers[1].values().clone(),
            }),
            Geometry::Spherical => Ok(RotationAngles::Spherical {
                theta: self.centers[1].values().clone(),
                phi: self.centers[2].values().clone(),
            }),
            Geometry::Cartesian => Err(PlutoError::UnsupportedGeometry(
                "grid is already Cartesian".to_string(),
            )),
        }
    }

    /// Transform centres and edges to Cartesian coordinates.
    ///
    /// Widths become the physical cell extents h_k·dx_k, so face areas and
    /// cell volumes are unchanged by the conversion.
    pub(crate) fn to_cartesian(&mut self) -> Result<()> {
        let centers = self.cartesian_positions(&self.centers)?;
        let edges = self.cartesian_positions(&self.edges)?;

        let length_unit = self.centers[0].unit().cloned();
        let mut widths = Vec::with_capacity(3);
        for (h, dx) in self.scale_factors.iter().zip(&self.widths) {
            widths.push(relabel(h.mul(dx)?, length_unit.as_ref())?);
        }

        self.centers = centers;
        self.edges = edges;
        self.widths = to_array(widths)?;
        self.geometry = Geometry::Cartesian;
        self.update_metrics()?;
        debug!(from = %self.native_geometry, "grid converted to Cartesian");
        Ok(())
    }

    fn cartesian_positions(&self, family: &[Quantity; 3]) -> Result<[Quantity; 3]> {
        let length_unit = family[0].unit().cloned();
        let trig = |q: &Quantity, f: fn(f64) -> f64| self.dimensionless(q.values().mapv(f));
        let [a, b, c] = family;

        let (x, y, z) = match self.geometry {
            Geometry::Polar => {
                // (r, φ, z)
                let x = a.mul(&trig(b, f64::cos))?;
                let y = a.mul(&trig(b, f64::sin))?;
                (x, y, c.clone())
            }
            Geometry::Spherical => {
                // (r, θ, φ)
                let r_sin = a.mul(&trig(b, f64::sin))?;
                let x = r_sin.mul(&trig(c, f64::cos))?;
                let y = r_sin.mul(&trig(c, f64::sin))?;
                let z = a.mul(&trig(b, f64::cos))?;
                (x, y, z)
            }
            Geometry::Cartesian => {
                return Err(PlutoError::UnsupportedGeometry(
                    "grid is already Cartesian".to_string(),
                ))
            }
        };

        Ok([
            relabel(x, length_unit.as_ref())?,
            relabel(y, length_unit.as_ref())?,
            relabel(z, length_unit.as_ref())?,
        ])
    }

    /// Values tagged dimensionless when the grid carries units, raw otherwise.
    fn dimensionless(&self, values: ArrayD<f64>) -> Quantity {
        if self.unit_state.has_units() {
            Quantity::new(values, Some(Unit::dimensionless()))
        } else {
            Quantity::raw(values)
        }
    }
}

/// Angles needed to rotate vector components at each cell.
#[derive(Debug, Clone)]
pub(crate) enum RotationAngles {
    Polar { phi: ArrayD<f64> },
    Spherical { theta: ArrayD<f64>, phi: ArrayD<f64> },
}

/// Broadcast a 1D axis array to `shape`, varying along axis `k` if active.
fn broadcast(values: &Array1<f64>, k: usize, active: usize, shape: &[usize]) -> ArrayD<f64> {
    if k < active {
        ArrayD::from_shape_fn(IxDyn(shape), |idx| values[idx[k]])
    } else {
        ArrayD::from_elem(IxDyn(shape), values[0])
    }
}

/// Apply `f` to each array of an axis family.
fn convert_family<D, F>(family: &[Quantity<D>; 3], kinds: [AxisKind; 3], f: F) -> Result<[Quantity<D>; 3]>
where
    D: Dimension,
    F: Fn(Quantity<D>, AxisKind) -> Result<Quantity<D>>,
{
    let mut out = Vec::with_capacity(3);
    for (q, kind) in family.iter().zip(kinds) {
        out.push(f(q.clone(), kind)?);
    }
    to_array(out)
}

fn to_array<D: Dimension>(v: Vec<Quantity<D>>) -> Result<[Quantity<D>; 3]> {
    v.try_into()
        .map_err(|v: Vec<Quantity<D>>| PlutoError::shape_mismatch(format!("expected 3 axes, got {}", v.len())))
}

/// Express a length-like result in the grid's length unit (no-op when raw).
fn relabel(q: Quantity, unit: Option<&Unit>) -> Result<Quantity> {
    match unit {
        Some(u) => q.to(u),
        None => Ok(q),
    }
}
