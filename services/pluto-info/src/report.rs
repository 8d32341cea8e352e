//! Text and JSON renderings of run information.

use anyhow::Result;
use serde::Serialize;

use pluto_data::{FieldRegistry, RunConfig, StepLog, StepSelector, UnitSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct FieldRow {
    name: String,
    kind: String,
    /// `primal`, `derived` or `unavailable` for this run.
    status: &'static str,
    code_unit: String,
    astro_unit: String,
    aliases: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UnitReport {
    expression: String,
    cgs_scale: f64,
    dimension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    factor: Option<f64>,
}

pub fn info(config: &RunConfig, format: Format) -> Result<String> {
    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(config)?);
    }

    let mut out = Vec::new();
    if let Some(dir) = &config.run_dir {
        out.push(format!("{:15}:  {}", "run_dir", dir.display()));
    }
    out.push(format!("{:15}:  {}", "datatype", config.datatype));
    if let Some(file_type) = &config.file_type {
        out.push(format!("{:15}:  {}", "file_type", file_type));
    }
    if let Some(endianness) = &config.endianness {
        out.push(format!("{:15}:  {}", "endianness", endianness));
    }
    out.push(format!("{:15}:  {}", "geometry", config.geometry));
    out.push(format!("{:15}:  {}", "dimensions", config.dimensions));
    out.push(format!("{:15}:  {:e} cm", "code_length", config.units.length));
    out.push(format!("{:15}:  {:e} g/cm**3", "code_density", config.units.density));
    out.push(format!("{:15}:  {:e} cm/s", "code_velocity", config.units.velocity));
    out.push(format!("{:15}:  {}", "field_list", config.field_list.join(" ")));
    Ok(out.join("\n"))
}

pub fn steps(log: &StepLog, format: Format) -> Result<String> {
    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(log.records())?);
    }

    let mut out = vec![format!("{:>6} {:>14} {:>14} {:>10}", "index", "time", "dt", "nstep")];
    for r in log.records() {
        out.push(format!("{:>6} {:>14.6e} {:>14.6e} {:>10}", r.index, r.time, r.dt, r.nstep));
    }
    Ok(out.join("\n"))
}

pub fn fields(config: &RunConfig, format: Format) -> Result<String> {
    let registry = FieldRegistry::builtin();
    let mut rows: Vec<FieldRow> = registry
        .entries()
        .map(|e| FieldRow {
            name: e.name.clone(),
            kind: e.kind.to_string(),
            status: if registry.is_primal(&e.name, &config.field_list) {
                "primal"
            } else if registry.is_derived(&e.name, &config.field_list) {
                "derived"
            } else {
                "unavailable"
            },
            code_unit: e.code_unit.clone(),
            astro_unit: e.astro_unit.clone(),
            aliases: e.aliases.clone(),
        })
        .collect();
    // saved fields the catalog does not know
    for name in &config.field_list {
        if !registry.contains(name) {
            rows.push(FieldRow {
                name: name.clone(),
                kind: "unknown".to_string(),
                status: "primal",
                code_unit: String::new(),
                astro_unit: String::new(),
                aliases: Vec::new(),
            });
        }
    }

    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(&rows)?);
    }

    let mut out = vec![format!(
        "{:10} {:8} {:12} {:30} {:12} {}",
        "name", "kind", "status", "code unit", "astro unit", "aliases"
    )];
    for r in rows {
        out.push(format!(
            "{:10} {:8} {:12} {:30} {:12} {}",
            r.name,
            r.kind,
            r.status,
            r.code_unit,
            r.astro_unit,
            r.aliases.join(", ")
        ));
    }
    Ok(out.join("\n"))
}

pub fn resolve(log: &StepLog, selector: StepSelector, format: Format) -> Result<String> {
    let index = log.resolve(selector)?;
    let record = log
        .records()
        .iter()
        .find(|r| r.index == index)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("output {} is not in the step log", index))?;

    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(&record)?);
    }
    Ok(format!("{} (time {:e}, nstep {})", record.index, record.time, record.nstep))
}

pub fn units(config: &RunConfig, expression: &str, target: Option<&str>, format: Format) -> Result<String> {
    let system = UnitSystem::new(config.units);
    let unit = system.unit(expression)?;
    let factor = target
        .map(|t| system.unit(t).and_then(|u| unit.conversion_factor(&u)))
        .transpose()?;

    let report = UnitReport {
        expression: expression.to_string(),
        cgs_scale: unit.scale(),
        dimension: unit.dimension().to_string(),
        target: target.map(str::to_string),
        factor,
    };

    if format == Format::Json {
        return Ok(serde_json::to_string_pretty(&report)?);
    }
    let mut out = format!("1 {} = {:e} (cgs) [{}]", report.expression, report.cgs_scale, report.dimension);
    if let (Some(t), Some(f)) = (&report.target, report.factor) {
        out.push_str(&format!("\n1 {} = {:e} {}", report.expression, f, t));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pluto_data::Geometry;
    use test_utils::fixtures::{DEFINITIONS_SPHERICAL, STEP_LOG};
    use test_utils::TempRunDir;

    fn run() -> (TempRunDir, RunConfig) {
        let dir = TempRunDir::new()
            .unwrap()
            .with_definitions(DEFINITIONS_SPHERICAL)
            .unwrap()
            .with_step_log("vtk", STEP_LOG)
            .unwrap();
        let config = RunConfig::from_run_dir(dir.path(), "vtk").unwrap();
        (dir, config)
    }

    #[test]
    fn test_info_text() {
        let (_dir, config) = run();
        assert_eq!(config.geometry, Geometry::Spherical);
        let text = info(&config, Format::Text).unwrap();
        assert!(text.contains("SPHERICAL"));
        assert!(text.contains("rho vx1 vx2 vx3 prs tr1"));
    }

    #[test]
    fn test_steps_json() {
        let (dir, config) = run();
        let log = StepLog::from_file(config.step_log_path(dir.path())).unwrap();
        let json: serde_json::Value = serde_json::from_str(&steps(&log, Format::Json).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
        assert_eq!(json[2]["nstep"], 672);
    }

    #[test]
    fn test_fields_status() {
        let (_dir, config) = run();
        let json: serde_json::Value = serde_json::from_str(&fields(&config, Format::Json).unwrap()).unwrap();
        let status = |name: &str| {
            json.as_array()
                .unwrap()
                .iter()
                .find(|r| r["name"] == name)
                .map(|r| r["status"].as_str().unwrap().to_string())
                .unwrap()
        };
        assert_eq!(status("rho"), "primal");
        assert_eq!(status("speed"), "derived");
        assert_eq!(status("tmp"), "unavailable");
    }

    #[test]
    fn test_resolve_time() {
        let (dir, config) = run();
        let log = StepLog::from_file(config.step_log_path(dir.path())).unwrap();
        let text = resolve(&log, StepSelector::Time(0.14), Format::Text).unwrap();
        assert!(text.starts_with("1 "));
        assert!(resolve(&log, StepSelector::Step(7), Format::Text).is_err());
    }

    #[test]
    fn test_units_conversion() {
        let (_dir, config) = run();
        let json: serde_json::Value =
            serde_json::from_str(&units(&config, "code_velocity", Some("km/s"), Format::Json).unwrap()).unwrap();
        assert_eq!(json["factor"].as_f64().unwrap(), 100.0);
        assert_eq!(json["dimension"], "L T^-1");
        assert!(units(&config, "code_velocity", Some("g"), Format::Text).is_err());
    }
}
