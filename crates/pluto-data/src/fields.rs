//! Field arrays of one snapshot.
//!
//! The store owns the primal arrays read from disk and a cache of derived
//! fields computed on demand through the registry. All arrays are in the
//! logical `(x1, x2, x3)` axis order and share the grid's cell shape.

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::{ArrayD, Axis, Zip};
use tracing::{debug, trace};

use crate::error::{PlutoError, Result};
use crate::grid::{GridGeometry, RotationAngles};
use crate::quantity::Quantity;
use crate::registry::{FieldEntry, FieldRegistry};
use crate::types::{Dimensions, UnitState};
use crate::units::UnitSystem;

const VELOCITY: [&str; 3] = ["vx1", "vx2", "vx3"];

/// What a field computation can see besides the store itself.
#[derive(Clone, Copy)]
pub(crate) struct FieldEnv<'a> {
    pub grid: &'a GridGeometry,
    pub registry: &'a FieldRegistry,
    pub units: &'a UnitSystem,
}

/// Handle passed to derived-field compute functions.
pub struct FieldContext<'a> {
    store: &'a mut FieldStore,
    env: FieldEnv<'a>,
}

impl<'a> FieldContext<'a> {
    /// Another field of the same snapshot, computed first if needed.
    pub fn field(&mut self, name: &str) -> Result<&Quantity> {
        self.store.get(name, self.env)
    }

    pub fn grid(&self) -> &GridGeometry {
        self.env.grid
    }

    pub fn unit_state(&self) -> UnitState {
        self.store.unit_state
    }

    pub fn units(&self) -> &UnitSystem {
        self.env.units
    }
}

/// Primal arrays plus the derived-field cache.
#[derive(Debug, Clone)]
pub struct FieldStore {
    primal: Vec<String>,
    derived: Vec<String>,
    cache: HashMap<String, Quantity>,
    unit_state: UnitState,
    /// Derived fields being computed, innermost last.
    in_progress: Vec<String>,
}

impl FieldStore {
    /// Take the primal arrays of `field_list` from the loader's output.
    ///
    /// Arrays arrive in on-disk `(x3, x2, x1)` order and are transposed.
    /// Trailing length-one axes beyond the run's dimensionality are dropped.
    pub(crate) fn new(
        mut raw: HashMap<String, ArrayD<f64>>,
        field_list: &[String],
        registry: &FieldRegistry,
        dimensions: Dimensions,
        shape: &[usize],
    ) -> Result<Self> {
        let mut cache = HashMap::with_capacity(field_list.len());
        for name in field_list {
            let values = raw
                .remove(name)
                .ok_or_else(|| PlutoError::Loader(format!("field '{}' is in the field list but was not loaded", name)))?;
            let values = to_logical_order(values, dimensions);
            if values.shape() != shape {
                return Err(PlutoError::shape_mismatch(format!(
                    "field '{}' has shape {:?}, grid has {:?}",
                    name,
                    values.shape(),
                    shape
                )));
            }
            cache.insert(name.clone(), Quantity::raw(values));
        }
        if !raw.is_empty() {
            let mut extra: Vec<&String> = raw.keys().collect();
            extra.sort();
            debug!(fields = ?extra, "ignoring loaded arrays not in the field list");
        }

        Ok(Self {
            primal: field_list.to_vec(),
            derived: registry.derived_names(field_list),
            cache,
            unit_state: UnitState::Raw,
            in_progress: Vec::new(),
        })
    }

    pub fn unit_state(&self) -> UnitState {
        self.unit_state
    }

    /// Fields read from disk.
    pub fn primal_names(&self) -> &[String] {
        &self.primal
    }

    /// Fields that can be computed on demand.
    pub fn derived_names(&self) -> &[String] {
        &self.derived
    }

    /// Names currently held, sorted.
    pub fn cached_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.cache.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// A field if it is already held, without computing anything.
    pub fn cached(&self, name: &str) -> Option<&Quantity> {
        self.cache.get(name)
    }

    fn is_primal(&self, name: &str) -> bool {
        self.primal.iter().any(|p| p == name)
    }

    /// Cache key for a field name or alias.
    fn key(&self, name: &str, registry: &FieldRegistry) -> String {
        if self.is_primal(name) {
            return name.to_string();
        }
        registry.canonical_name(name).unwrap_or(name).to_string()
    }

    /// Get a field, computing and caching derived fields on first access.
    pub(crate) fn get(&mut self, name: &str, env: FieldEnv<'_>) -> Result<&Quantity> {
        let key = self.key(name, env.registry);
        if !self.cache.contains_key(&key) {
            if !self.derived.contains(&key) {
                return Err(PlutoError::unknown_field(name));
            }
            let value = self.compute(&key, env)?;
            self.cache.insert(key.clone(), value);
        }
        self.cache
            .get(&key)
            .ok_or_else(|| PlutoError::unknown_field(name))
    }

    /// Evict a field. Evicted primal fields are gone for good.
    pub(crate) fn remove(&mut self, name: &str, registry: &FieldRegistry) -> Result<Quantity> {
        let key = self.key(name, registry);
        let value = self
            .cache
            .remove(&key)
            .ok_or_else(|| PlutoError::unknown_field(name))?;
        self.primal.retain(|p| p != &key);
        Ok(value)
    }

    fn compute(&mut self, name: &str, env: FieldEnv<'_>) -> Result<Quantity> {
        let entry: Arc<FieldEntry> = Arc::clone(env.registry.lookup(name)?);
        let compute = entry
            .compute
            .clone()
            .ok_or_else(|| PlutoError::unknown_field(name))?;

        if self.in_progress.iter().any(|n| n == name) {
            return Err(PlutoError::CircularDependency(format!(
                "{} -> {}",
                self.in_progress.join(" -> "),
                name
            )));
        }

        self.in_progress.push(name.to_string());
        let result = compute(&mut FieldContext { store: self, env });
        self.in_progress.pop();

        let value = result?;
        trace!(field = name, state = %self.unit_state, "computed derived field");
        self.express(value, &entry, env.units)
    }

    /// Express a value in the unit its entry registers for the current state.
    fn express(&self, value: Quantity, entry: &FieldEntry, units: &UnitSystem) -> Result<Quantity> {
        match self.unit_state {
            UnitState::Raw => Ok(value),
            UnitState::CodeUnits => units.to_code_units(value, &entry.code_unit),
            UnitState::AstroUnits => units.to_astro_units(value, &entry.astro_unit),
        }
    }

    /// Drop every cached derived field and compute each again.
    pub(crate) fn refresh_derived(&mut self, env: FieldEnv<'_>) -> Result<()> {
        let mut stale: Vec<String> = self
            .cache
            .keys()
            .filter(|k| !self.is_primal(k))
            .cloned()
            .collect();
        stale.sort();
        for name in &stale {
            self.cache.remove(name);
        }
        for name in stale {
            // may already be back as a dependency of an earlier one
            if !self.cache.contains_key(&name) {
                let value = self.compute(&name, env)?;
                self.cache.insert(name, value);
            }
        }
        Ok(())
    }

    /// Attach (raw) or re-express code units on every primal field.
    pub(crate) fn to_code_units(&mut self, env: FieldEnv<'_>) -> Result<()> {
        self.convert_primal(env, UnitState::CodeUnits)?;
        self.unit_state = UnitState::CodeUnits;
        self.refresh_derived(env)?;
        debug!(fields = self.primal.len(), "fields in code units");
        Ok(())
    }

    /// Express every field in astro units, promoting to code units first if raw.
    pub(crate) fn to_astro_units(&mut self, env: FieldEnv<'_>) -> Result<()> {
        if self.unit_state == UnitState::Raw {
            self.convert_primal(env, UnitState::CodeUnits)?;
            self.unit_state = UnitState::CodeUnits;
        }
        self.convert_primal(env, UnitState::AstroUnits)?;
        self.unit_state = UnitState::AstroUnits;
        self.refresh_derived(env)?;
        debug!(fields = self.primal.len(), "fields in astro units");
        Ok(())
    }

    fn convert_primal(&mut self, env: FieldEnv<'_>, target: UnitState) -> Result<()> {
        // every primal field needs a registered unit before anything changes
        let mut entries = Vec::with_capacity(self.primal.len());
        for name in &self.primal {
            entries.push((name.clone(), Arc::clone(env.registry.lookup(name)?)));
        }

        for (name, entry) in entries {
            let Some(value) = self.cache.remove(&name) else {
                continue;
            };
            let converted = match target {
                UnitState::AstroUnits => env.units.to_astro_units(value, &entry.astro_unit)?,
                _ => env.units.to_code_units(value, &entry.code_unit)?,
            };
            self.cache.insert(name, converted);
        }
        Ok(())
    }

    /// Rotate the velocity components into Cartesian components.
    ///
    /// Components missing from disk count as zero if at least one is present.
    pub(crate) fn to_cartesian(&mut self, angles: &RotationAngles, env: FieldEnv<'_>) -> Result<()> {
        let present: Vec<&str> = VELOCITY
            .iter()
            .copied()
            .filter(|name| self.is_primal(name) && self.cache.contains_key(*name))
            .collect();
        let Some(first) = present.first() else {
            debug!("no velocity components on disk, skipping rotation");
            return self.refresh_derived(env);
        };

        let template = self.cache[*first].clone();
        let unit = template.unit().cloned();
        let mut components = Vec::with_capacity(3);
        for name in VELOCITY {
            let values = match self.cache.get(name) {
                Some(q) => match &unit {
                    Some(u) => q.clone().to(u)?.into_values(),
                    None => q.values().clone(),
                },
                None => ArrayD::zeros(template.values().raw_dim()),
            };
            components.push(values);
        }

        let rotated = rotate(angles, &components[0], &components[1], &components[2])?;
        for (name, values) in VELOCITY.iter().zip(rotated) {
            self.cache.insert(name.to_string(), Quantity::new(values, unit.clone()));
            if !self.is_primal(name) {
                self.primal.push(name.to_string());
            }
        }

        self.refresh_derived(env)?;
        debug!(components = ?present, "velocity rotated to Cartesian components");
        Ok(())
    }
}

/// Reverse the on-disk axis order and drop degenerate trailing axes.
fn to_logical_order(values: ArrayD<f64>, dimensions: Dimensions) -> ArrayD<f64> {
    let mut values = values.reversed_axes();
    while values.ndim() > dimensions.count() && values.shape()[values.ndim() - 1] == 1 {
        let last = values.ndim() - 1;
        values = values.index_axis_move(Axis(last), 0);
    }
    values.as_standard_layout().into_owned()
}

/// Cartesian components of a vector given in polar or spherical components.
fn rotate(
    angles: &RotationAngles,
    v1: &ArrayD<f64>,
    v2: &ArrayD<f64>,
    v3: &ArrayD<f64>,
) -> Result<[ArrayD<f64>; 3]> {
    let check = |a: &ArrayD<f64>| {
        if a.shape() == v1.shape() && v2.shape() == v1.shape() && v3.shape() == v1.shape() {
            Ok(())
        } else {
            Err(PlutoError::shape_mismatch(format!(
                "velocity {:?} vs angle {:?}",
                v1.shape(),
                a.shape()
            )))
        }
    };

    match angles {
        RotationAngles::Polar { phi } => {
            check(phi)?;
            // (v_r, v_φ, v_z)
            let vx = Zip::from(v1)
                .and(v2)
                .and(phi)
                .map_collect(|&r, &p, &f| r * f.cos() - p * f.sin());
            let vy = Zip::from(v1)
                .and(v2)
                .and(phi)
                .map_collect(|&r, &p, &f| r * f.sin() + p * f.cos());
            Ok([vx, vy, v3.clone()])
        }
        RotationAngles::Spherical { theta, phi } => {
            check(theta)?;
            check(phi)?;
            // (v_r, v_θ, v_φ)
            let vx = Zip::from(v1).and(v2).and(v3).and(theta).and(phi).map_collect(
                |&r, &t, &p, &th, &ph| r * th.sin() * ph.cos() + t * th.cos() * ph.cos() - p * ph.sin(),
            );
            let vy = Zip::from(v1).and(v2).and(v3).and(theta).and(phi).map_collect(
                |&r, &t, &p, &th, &ph| r * th.sin() * ph.sin() + t * th.cos() * ph.sin() + p * ph.cos(),
            );
            let vz = Zip::from(v1)
                .and(v2)
                .and(theta)
                .map_collect(|&r, &t, &th| r * th.cos() - t * th.sin());
            Ok([vx, vy, vz])
        }
    }
}
