//! A whole run: configuration, field registry, unit system and loader.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{PlutoError, Result};
use crate::loader::SnapshotLoader;
use crate::metadata::{StepLog, StepSelector};
use crate::registry::{FieldEntry, FieldRegistry};
use crate::snapshot::Snapshot;
use crate::units::UnitSystem;

/// Entry point for reading snapshots of one run.
///
/// The registry is owned here and may be extended with [`Dataset::register`];
/// each snapshot takes a frozen copy when it is created.
pub struct Dataset<L> {
    config: RunConfig,
    registry: FieldRegistry,
    units: UnitSystem,
    log: StepLog,
    loader: L,
}

impl<L: SnapshotLoader> Dataset<L> {
    /// Open a run with the built-in field registry.
    ///
    /// An empty field list in `config` is filled from the loader's step log.
    pub fn new(config: RunConfig, loader: L) -> Result<Self> {
        Self::with_registry(config, loader, FieldRegistry::builtin())
    }

    pub fn with_registry(mut config: RunConfig, loader: L, registry: FieldRegistry) -> Result<Self> {
        let log = loader.log()?;
        if config.field_list.is_empty() {
            config.field_list = log.field_list().to_vec();
        }
        let config = config.validated()?;
        let units = UnitSystem::new(config.units);

        info!(
            geometry = %config.geometry,
            dimensions = %config.dimensions,
            outputs = log.len(),
            fields = config.field_list.len(),
            "dataset opened"
        );
        Ok(Self {
            config,
            registry,
            units,
            log,
            loader,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn units(&self) -> &UnitSystem {
        &self.units
    }

    pub fn step_log(&self) -> &StepLog {
        &self.log
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Add or replace a field definition for snapshots created from now on.
    pub fn register(&mut self, entry: FieldEntry) {
        debug!(field = %entry.name, "registering field");
        self.registry.register(entry);
    }

    /// Re-read the step log, e.g. while the simulation is still running.
    pub fn reload_log(&mut self) -> Result<()> {
        self.log = self.loader.log()?;
        debug!(outputs = self.log.len(), "step log reloaded");
        Ok(())
    }

    /// Output number picked by `selector`.
    pub fn resolve(&self, selector: impl Into<StepSelector>) -> Result<usize> {
        self.log.resolve(selector.into())
    }

    /// Load a snapshot.
    ///
    /// A negative step selects the last output; a time selects the output
    /// nearest to it.
    pub fn snapshot(&self, selector: impl Into<StepSelector>) -> Result<Snapshot> {
        let index = self.resolve(selector)?;
        let raw = self.loader.load(index)?;
        if raw.index != index {
            return Err(PlutoError::Loader(format!(
                "asked for output {} but the loader returned {}",
                index, raw.index
            )));
        }
        Snapshot::new(raw, &self.config, Arc::new(self.registry.clone()), self.units.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldContext;
    use crate::loader::{AxisData, InMemoryLoader, RawSnapshot};
    use crate::registry::FieldKind;
    use crate::types::{Dimensions, Geometry};
    use ndarray::{ArrayD, IxDyn};

    fn loader() -> InMemoryLoader {
        let axes = || {
            [
                AxisData::uniform(3, 0.0, 1.0),
                AxisData::uniform(1, 0.0, 1.0),
                AxisData::uniform(1, 0.0, 1.0),
            ]
        };
        let mut loader = InMemoryLoader::new();
        for (i, t) in [0.0, 0.5, 1.0].into_iter().enumerate() {
            loader.insert(
                RawSnapshot::new(i, t, 0.01, axes())
                    .with_field("rho", ArrayD::from_elem(IxDyn(&[3]), 1.0 + i as f64)),
            );
        }
        loader
    }

    fn config() -> RunConfig {
        RunConfig {
            dimensions: Dimensions::One,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_field_list_from_log() {
        let dataset = Dataset::new(config(), loader()).unwrap();
        assert_eq!(dataset.config().field_list, vec!["rho"]);
        assert_eq!(dataset.step_log().len(), 3);
        assert_eq!(dataset.config().geometry, Geometry::Cartesian);
    }

    #[test]
    fn test_snapshot_selection() {
        let dataset = Dataset::new(config(), loader()).unwrap();
        let mut last = dataset.snapshot(-1_i64).unwrap();
        assert_eq!(last.index(), 2);
        assert_eq!(last.field("rho").unwrap().values()[[0]], 3.0);

        let nearest = dataset.snapshot(0.4_f64).unwrap();
        assert_eq!(nearest.index(), 1);

        assert!(matches!(dataset.snapshot(5_i64), Err(PlutoError::StepNotFound(_))));
    }

    #[test]
    fn test_registry_is_frozen_per_snapshot() {
        let mut dataset = Dataset::new(config(), loader()).unwrap();
        let mut before = dataset.snapshot(0_i64).unwrap();

        dataset.register(FieldEntry::derived(
            "double_rho",
            FieldKind::Scalar,
            |ctx: &mut FieldContext<'_>| Ok(ctx.field("rho")?.map_values(|v| 2.0 * v)),
            "code_density",
            "g/cm**3",
        ));
        let mut after = dataset.snapshot(0_i64).unwrap();

        assert!(matches!(before.field("double_rho"), Err(PlutoError::UnknownField(_))));
        assert_eq!(after.field("double_rho").unwrap().values()[[1]], 2.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut cfg = config();
        cfg.units.length = -1.0;
        assert!(matches!(Dataset::new(cfg, loader()), Err(PlutoError::Config(_))));
    }
}
