//! Catalog of known fields.
//!
//! Each entry names a field, its kind, its code-unit and astro-unit
//! expressions, aliases, and, for derived fields, the function that
//! computes it from other fields of the same snapshot. Whether a field is
//! primal depends on the run: a field is primal when it is in the run's
//! on-disk field list.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{PlutoError, Result};
use crate::fields::FieldContext;
use crate::quantity::Quantity;

/// Function computing a derived field.
pub type ComputeFn = Arc<dyn Fn(&mut FieldContext<'_>) -> Result<Quantity> + Send + Sync>;

/// Scalar or one component of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    VectorComponent,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::VectorComponent => write!(f, "vector"),
        }
    }
}

/// One registry entry.
#[derive(Clone)]
pub struct FieldEntry {
    pub name: String,
    pub kind: FieldKind,
    pub compute: Option<ComputeFn>,
    /// Unit expression in code units, e.g. `code_density*code_velocity**2`.
    pub code_unit: String,
    /// Unit expression in astro units, e.g. `erg/cm**3`.
    pub astro_unit: String,
    pub aliases: Vec<String>,
}

impl FieldEntry {
    /// Entry for a field read from disk.
    pub fn primal(
        name: impl Into<String>,
        kind: FieldKind,
        code_unit: impl Into<String>,
        astro_unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            compute: None,
            code_unit: code_unit.into(),
            astro_unit: astro_unit.into(),
            aliases: Vec::new(),
        }
    }

    /// Entry for a field computed from other fields.
    pub fn derived<F>(
        name: impl Into<String>,
        kind: FieldKind,
        compute: F,
        code_unit: impl Into<String>,
        astro_unit: impl Into<String>,
    ) -> Self
    where
        F: Fn(&mut FieldContext<'_>) -> Result<Quantity> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            compute: Some(Arc::new(compute)),
            code_unit: code_unit.into(),
            astro_unit: astro_unit.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_computed(&self) -> bool {
        self.compute.is_some()
    }
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("computed", &self.compute.is_some())
            .field("code_unit", &self.code_unit)
            .field("astro_unit", &self.astro_unit)
            .field("aliases", &self.aliases)
            .finish()
    }
}

/// Field catalog. `Default` is seeded with the built-in PLUTO fields.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    entries: HashMap<String, Arc<FieldEntry>>,
    aliases: HashMap<String, String>,
    /// Registration order, for listings.
    order: Vec<String>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            aliases: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry seeded with PLUTO's standard variables and derived fields.
    pub fn builtin() -> Self {
        use FieldKind::{Scalar, VectorComponent};

        let mut registry = Self::empty();
        registry.register(FieldEntry::primal("rho", Scalar, "code_density", "g/cm**3").with_aliases(["density"]));
        for i in 1..=3 {
            registry.register(
                FieldEntry::primal(format!("vx{}", i), VectorComponent, "code_velocity", "km/s")
                    .with_aliases([format!("velocity-{}", i)]),
            );
        }
        registry.register(
            FieldEntry::primal("prs", Scalar, "code_density*code_velocity**2", "erg/cm**3")
                .with_aliases(["pressure"]),
        );
        registry.register(FieldEntry::primal("tmp", Scalar, "K", "K").with_aliases(["temperature"]));
        registry.register(
            FieldEntry::primal("phi", Scalar, "code_velocity**2", "km**2/s**2").with_aliases(["potential"]),
        );
        for i in 1..=4 {
            registry.register(
                FieldEntry::primal(format!("tr{}", i), Scalar, "", "").with_aliases([format!("tracer-{}", i)]),
            );
        }

        registry.register(
            FieldEntry::derived("speed", Scalar, speed, "code_velocity", "km/s").with_aliases(["velocity-magnitude"]),
        );
        registry.register(
            FieldEntry::derived("mass", Scalar, cell_mass, "code_density*code_length**3", "Msun")
                .with_aliases(["cell-mass"]),
        );
        registry
    }

    /// Add or replace an entry. The last registration for a name wins.
    pub fn register(&mut self, entry: FieldEntry) {
        let name = entry.name.clone();
        if let Some(previous) = self.entries.get(&name) {
            debug!(field = %name, "overriding registered field");
            let stale: Vec<String> = previous.aliases.clone();
            for alias in stale {
                if self.aliases.get(&alias) == Some(&name) {
                    self.aliases.remove(&alias);
                }
            }
        } else {
            self.order.push(name.clone());
        }

        for alias in &entry.aliases {
            if alias != &name {
                self.aliases.insert(alias.clone(), name.clone());
            }
        }
        self.entries.insert(name, Arc::new(entry));
    }

    /// Canonical name for a field name or alias.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.entries.contains_key(name) {
            Some(name)
        } else {
            self.aliases.get(name).map(String::as_str)
        }
    }

    /// Look up an entry by name or alias.
    pub fn lookup(&self, name: &str) -> Result<&Arc<FieldEntry>> {
        self.canonical_name(name)
            .and_then(|canonical| self.entries.get(canonical))
            .ok_or_else(|| PlutoError::unknown_field(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.canonical_name(name).is_some()
    }

    /// Whether `name` is primal for a run with on-disk `field_list`.
    pub fn is_primal(&self, name: &str, field_list: &[String]) -> bool {
        let canonical = self.canonical_name(name).unwrap_or(name);
        field_list.iter().any(|f| f == canonical)
    }

    /// Whether `name` is a computable field for a run with on-disk `field_list`.
    pub fn is_derived(&self, name: &str, field_list: &[String]) -> bool {
        if self.is_primal(name, field_list) {
            return false;
        }
        self.lookup(name).map(|e| e.is_computed()).unwrap_or(false)
    }

    /// Names of all computable fields not saved by the run.
    pub fn derived_names(&self, field_list: &[String]) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.is_derived(name, field_list))
            .cloned()
            .collect()
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<FieldEntry>> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// |v| from the three velocity components.
fn speed(ctx: &mut FieldContext<'_>) -> Result<Quantity> {
    let v1 = ctx.field("vx1")?.clone();
    let v2 = ctx.field("vx2")?.clone();
    let v3 = ctx.field("vx3")?.clone();
    v1.powi(2).add(&v2.powi(2))?.add(&v3.powi(2))?.sqrt()
}

/// ρ·dV per cell.
fn cell_mass(ctx: &mut FieldContext<'_>) -> Result<Quantity> {
    let rho = ctx.field("rho")?.clone();
    rho.mul(ctx.grid().dv())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_disk() -> Vec<String> {
        ["rho", "vx1", "vx2", "vx3", "prs"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_builtin_lookup_and_aliases() {
        let registry = FieldRegistry::builtin();
        assert_eq!(registry.lookup("density").unwrap().name, "rho");
        assert_eq!(registry.lookup("velocity-2").unwrap().name, "vx2");
        assert_eq!(registry.lookup("prs").unwrap().astro_unit, "erg/cm**3");
        assert_eq!(registry.lookup("tr1").unwrap().code_unit, "");
        assert!(matches!(
            registry.lookup("Bx1"),
            Err(PlutoError::UnknownField(ref n)) if n == "Bx1"
        ));
    }

    #[test]
    fn test_primal_and_derived_depend_on_field_list() {
        let registry = FieldRegistry::builtin();
        let fields = on_disk();
        assert!(registry.is_primal("rho", &fields));
        assert!(registry.is_primal("density", &fields));
        assert!(!registry.is_primal("tmp", &fields));
        assert!(registry.is_derived("speed", &fields));
        assert!(!registry.is_derived("rho", &fields));
        assert!(!registry.is_derived("tmp", &fields));

        // a run that saved "speed" makes it primal
        let mut with_speed = fields.clone();
        with_speed.push("speed".to_string());
        assert!(registry.is_primal("speed", &with_speed));
        assert!(!registry.is_derived("speed", &with_speed));
    }

    #[test]
    fn test_derived_names() {
        let registry = FieldRegistry::builtin();
        assert_eq!(registry.derived_names(&on_disk()), vec!["speed", "mass"]);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = FieldRegistry::builtin();
        let before = registry.len();
        registry.register(
            FieldEntry::primal("rho", FieldKind::Scalar, "code_density", "Msun/pc**3").with_aliases(["rho_gas"]),
        );
        assert_eq!(registry.len(), before);
        assert_eq!(registry.lookup("rho").unwrap().astro_unit, "Msun/pc**3");
        assert_eq!(registry.lookup("rho_gas").unwrap().name, "rho");
        // the old alias went with the old entry
        assert!(registry.lookup("density").is_err());
        // listing order is unchanged
        assert_eq!(registry.entries().next().unwrap().name, "rho");
    }

    #[test]
    fn test_register_custom_derived() {
        let mut registry = FieldRegistry::empty();
        registry.register(FieldEntry::derived(
            "double_rho",
            FieldKind::Scalar,
            |ctx: &mut FieldContext<'_>| Ok(ctx.field("rho")?.map_values(|v| 2.0 * v)),
            "code_density",
            "g/cm**3",
        ));
        let entry = registry.lookup("double_rho").unwrap();
        assert!(entry.is_computed());
        assert_eq!(entry.kind, FieldKind::Scalar);
    }
}
