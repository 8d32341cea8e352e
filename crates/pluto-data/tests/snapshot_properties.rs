//! Unit-state, geometry and slicing behaviour of whole snapshots.

use std::f64::consts::PI;

use pluto_data::{
    AxisData, BaseUnits, Dataset, Dimensions, Geometry, InMemoryLoader, PlutoError, RawSnapshot, RunConfig,
    Snapshot, UnitState,
};
use test_utils::{assert_all_close, assert_approx_eq, constant_field, encoded_field, on_disk_field};

const KPC: f64 = 3.0856775814913673e21;
const KM: f64 = 1.0e5;

fn base_units() -> BaseUnits {
    BaseUnits {
        length: KPC,
        density: 1.6726e-25,
        velocity: 1.0e7,
    }
}

fn spherical_axes(n: [usize; 3]) -> [AxisData; 3] {
    [
        AxisData::uniform(n[0], 1.0, 3.0),
        AxisData::uniform(n[1], 0.2, PI - 0.2),
        AxisData::uniform(n[2], 0.0, 2.0 * PI),
    ]
}

fn cartesian_axes(n: [usize; 3]) -> [AxisData; 3] {
    [
        AxisData::uniform(n[0], -1.0, 1.0),
        AxisData::uniform(n[1], 0.0, 3.0),
        AxisData::uniform(n[2], 0.0, 0.5),
    ]
}

/// A one-output run with rho, vx1, vx2, vx3 and prs.
fn dataset(geometry: Geometry, axes: [AxisData; 3]) -> Dataset<InMemoryLoader> {
    let shape: Vec<usize> = axes.iter().map(|a| a.len()).collect();
    let raw = RawSnapshot::new(0, 1.5, 1.0e-3, axes)
        .with_nstep(1200)
        .with_field("rho", encoded_field(&shape))
        .with_field("vx1", constant_field(&shape, 3.0))
        .with_field("vx2", constant_field(&shape, 4.0))
        .with_field("vx3", constant_field(&shape, 0.0))
        .with_field("prs", on_disk_field(&shape, |idx| 1.0 + idx[0] as f64));
    let loader = InMemoryLoader::new()
        .with_field_list(["rho", "vx1", "vx2", "vx3", "prs"])
        .with_snapshot(raw);

    let config = RunConfig {
        geometry,
        dimensions: Dimensions::Three,
        units: base_units(),
        ..RunConfig::default()
    };
    Dataset::new(config, loader).unwrap()
}

fn spherical() -> Snapshot {
    dataset(Geometry::Spherical, spherical_axes([4, 3, 6])).snapshot(0_i64).unwrap()
}

fn cartesian() -> Snapshot {
    dataset(Geometry::Cartesian, cartesian_axes([5, 3, 2])).snapshot(0_i64).unwrap()
}

#[test]
fn test_to_code_units_twice_is_a_no_op() {
    let mut snap = spherical();
    snap.field("speed").unwrap();
    snap.to_code_units().unwrap();

    let rho = snap.field("rho").unwrap().clone();
    let speed = snap.field("speed").unwrap().clone();
    let dv = snap.grid().dv().clone();
    let time = snap.time().clone();

    snap.to_code_units().unwrap();
    assert_eq!(snap.unit_state(), UnitState::CodeUnits);
    assert_eq!(snap.field("rho").unwrap().values(), rho.values());
    assert_eq!(snap.field("rho").unwrap().unit(), rho.unit());
    assert_eq!(snap.field("speed").unwrap().values(), speed.values());
    assert_eq!(snap.grid().dv().values(), dv.values());
    assert_eq!(snap.time().values(), time.values());
}

#[test]
fn test_astro_from_raw_equals_astro_through_code() {
    let mut direct = spherical();
    let mut staged = spherical();
    direct.field("mass").unwrap();
    staged.field("mass").unwrap();

    direct.to_astro_units().unwrap();
    staged.to_code_units().unwrap();
    staged.to_astro_units().unwrap();

    assert_eq!(direct.unit_state(), UnitState::AstroUnits);
    assert_eq!(staged.unit_state(), UnitState::AstroUnits);
    for name in ["rho", "vx1", "prs", "speed", "mass"] {
        let a = direct.field(name).unwrap().clone();
        let b = staged.field(name).unwrap().clone();
        assert_eq!(a.unit().map(|u| u.symbol().to_string()), b.unit().map(|u| u.symbol().to_string()));
        assert_all_close!(a.values(), b.values(), 1e-12);
    }
    assert_all_close!(direct.grid().dv().values(), staged.grid().dv().values(), 1e-12);
    assert_all_close!(direct.grid_array("x1").unwrap().values(), staged.grid_array("x1").unwrap().values(), 1e-12);
    assert_all_close!(direct.time().values(), staged.time().values(), 1e-12);

    // astro again is a no-op
    let before = direct.field("vx1").unwrap().clone();
    direct.to_astro_units().unwrap();
    assert_eq!(direct.field("vx1").unwrap().values(), before.values());
}

#[test]
fn test_astro_units_values() {
    let mut snap = spherical();
    snap.to_astro_units().unwrap();

    let vx1 = snap.field("vx1").unwrap();
    assert_eq!(vx1.unit().unwrap().symbol(), "km/s");
    assert_approx_eq!(vx1.values()[[0, 0, 0]], 3.0 * 1.0e7 / KM, 1e-9);

    let r = snap.grid().center(0);
    assert_eq!(r.unit().unwrap().symbol(), "kpc");
    // code length is exactly one kpc
    assert_approx_eq!(r.values()[[0, 0, 0]], 1.25, 1e-12);

    let theta = snap.grid().center(1);
    assert_eq!(theta.unit().unwrap().symbol(), "rad");
    assert_eq!(snap.field("mass").unwrap().unit().unwrap().symbol(), "Msun");
}

#[test]
fn test_cartesian_volume_is_width_product() {
    let snap = cartesian();
    let dv = snap.grid_array("dV").unwrap().values();
    let dx1 = snap.grid_array("dx1").unwrap().values();
    let dx2 = snap.grid_array("dx2").unwrap().values();
    let dx3 = snap.grid_array("dx3").unwrap().values();
    for (idx, v) in dv.indexed_iter() {
        assert_eq!(*v, dx1[&idx] * dx2[&idx] * dx3[&idx]);
    }
    assert!(snap.grid_array("h1").unwrap().values().iter().all(|h| *h == 1.0));
}

#[test]
fn test_spherical_shell_area() {
    let snap = spherical();
    let r = snap.grid_array("x1").unwrap().values();
    let theta = snap.grid_array("x2").unwrap().values();
    let dtheta = snap.grid_array("dx2").unwrap().values();
    let dphi = snap.grid_array("dx3").unwrap().values();
    for (idx, a) in snap.grid_array("dA1").unwrap().values().indexed_iter() {
        let expected = r[&idx].powi(2) * theta[&idx].sin() * dtheta[&idx] * dphi[&idx];
        assert_approx_eq!(*a, expected, 1e-12 * expected.abs().max(1.0));
    }
}

#[test]
fn test_exact_coordinate_selects_that_index() {
    let mut snap = cartesian();
    let rho = snap.field("rho").unwrap().clone();

    for k in 0..3 {
        let x2 = snap.grid().axis(1).values()[k];
        let plane = snap.slice2d("rho", None, Some(x2), None).unwrap();
        assert_eq!(plane.shape(), &[5, 2]);
        for ((i, j), v) in plane.values().indexed_iter() {
            assert_eq!(*v, rho.values()[[i, k, j]]);
        }
    }

    let x1 = snap.grid().axis(0).values()[3];
    let x3 = snap.grid().axis(2).values()[1];
    let line = snap.slice1d("rho", Some(x1), None, Some(x3)).unwrap();
    assert_eq!(line.values().to_vec(), vec![301.0, 311.0, 321.0]);
}

#[test]
fn test_slice_in_astro_units_uses_astro_coordinates() {
    let mut snap = spherical();
    snap.to_astro_units().unwrap();
    // r centres are 1.25, 1.75, 2.25, 2.75 kpc
    let plane = snap.slice2d("vx1", Some(2.2), None, None).unwrap();
    assert_eq!(plane.shape(), &[3, 6]);
    assert_eq!(plane.unit().unwrap().symbol(), "km/s");
}

#[test]
fn test_slice2d_needs_exactly_one_coordinate() {
    let mut snap = cartesian();
    for coords in [
        [None, None, None],
        [Some(0.0), Some(1.0), None],
        [Some(0.0), Some(1.0), Some(0.1)],
    ] {
        assert!(matches!(
            snap.slice2d("rho", coords[0], coords[1], coords[2]),
            Err(PlutoError::InvalidSliceArguments(_))
        ));
    }
    assert!(matches!(
        snap.slice1d("rho", Some(0.0), None, None),
        Err(PlutoError::InvalidSliceArguments(_))
    ));
}

#[test]
fn test_speed_cached_then_refreshed_on_promotion() {
    let mut snap = cartesian();
    let speed = snap.field("speed").unwrap();
    assert!(speed.is_raw());
    assert!(speed.values().iter().all(|v| *v == 5.0));

    snap.to_code_units().unwrap();
    assert!(snap.fields().cached_names().contains(&"speed"));
    let speed = snap.fields().cached("speed").unwrap();
    assert_eq!(speed.unit().unwrap().symbol(), "code_velocity");
    assert!(speed.values().iter().all(|v| *v == 5.0));

    // a plain get returns what is cached
    let cached = snap.fields().cached("speed").unwrap().values().as_ptr();
    assert_eq!(snap.field("speed").unwrap().values().as_ptr(), cached);
}

#[test]
fn test_speed_computed_after_promotion() {
    let mut snap = cartesian();
    snap.to_code_units().unwrap();
    for name in ["rho", "vx1", "vx2", "vx3", "prs"] {
        assert!(snap.field(name).unwrap().unit().is_some(), "{} has no unit", name);
    }
    assert_eq!(snap.field("prs").unwrap().unit().unwrap().symbol(), "code_density*code_velocity**2");

    assert!(snap.fields().cached("speed").is_none());
    let speed = snap.field("velocity-magnitude").unwrap();
    assert_eq!(speed.unit().unwrap().symbol(), "code_velocity");
    assert!(speed.values().iter().all(|v| (*v - 5.0).abs() < 1e-12));
}

#[test]
fn test_spherical_to_cartesian_twice_fails() {
    let mut snap = spherical();
    let dv = snap.grid().dv().clone();
    snap.field("speed").unwrap();
    snap.to_cartesian().unwrap();

    assert_eq!(snap.geometry(), Geometry::Cartesian);
    assert_eq!(snap.native_geometry(), Geometry::Spherical);
    assert_all_close!(snap.grid().dv().values(), dv.values(), 1e-12);
    // rotation preserves the speed
    assert!(snap.field("speed").unwrap().values().iter().all(|v| (*v - 5.0).abs() < 1e-12));

    assert!(matches!(snap.to_cartesian(), Err(PlutoError::UnsupportedGeometry(_))));
}

#[test]
fn test_spherical_velocity_rotation() {
    let mut snap = spherical();
    let theta = snap.grid().center(1).values().clone();
    let phi = snap.grid().center(2).values().clone();
    snap.to_cartesian().unwrap();

    // (v_r, v_θ, v_φ) = (3, 4, 0)
    let vx = snap.field("vx1").unwrap().values().clone();
    let vy = snap.field("vx2").unwrap().values().clone();
    let vz = snap.field("vx3").unwrap().values().clone();
    for (idx, th) in theta.indexed_iter() {
        let ph = phi[&idx];
        assert_approx_eq!(vx[&idx], 3.0 * th.sin() * ph.cos() + 4.0 * th.cos() * ph.cos(), 1e-12);
        assert_approx_eq!(vy[&idx], 3.0 * th.sin() * ph.sin() + 4.0 * th.cos() * ph.sin(), 1e-12);
        assert_approx_eq!(vz[&idx], 3.0 * th.cos() - 4.0 * th.sin(), 1e-12);
    }
}

#[test]
fn test_units_then_cartesian_keep_lengths_in_kpc() {
    let mut snap = spherical();
    snap.to_astro_units().unwrap();
    snap.to_cartesian().unwrap();
    for key in ["x1", "x2", "x3", "dx2"] {
        assert_eq!(snap.grid_array(key).unwrap().unit().unwrap().symbol(), "kpc", "{}", key);
    }
    // native axes still carry (r, θ, φ)
    assert_eq!(snap.grid().axis(1).unit().unwrap().symbol(), "rad");
}

#[test]
fn test_remove_and_unknown_fields() {
    let mut snap = cartesian();
    assert!(matches!(snap.field("Bx1"), Err(PlutoError::UnknownField(_))));
    snap.remove_field("prs").unwrap();
    assert!(matches!(snap.field("prs"), Err(PlutoError::UnknownField(_))));
    // without prs the promotion no longer needs its unit
    snap.to_code_units().unwrap();
    assert_eq!(snap.info().primal_fields, vec!["rho", "vx1", "vx2", "vx3"]);
}
