//! Physical constants and unit symbols in CGS.

use super::{Dimension, Unit};

/// Physical constants (CGS) as defined in PLUTO's `pluto.h`.
///
/// These are the `CONST_*` names that may appear in `UNIT_*` defines of
/// `definitions.h`.
pub const PLUTO_CONSTANTS: &[(&str, f64)] = &[
    ("CONST_AH", 1.008),
    ("CONST_AHe", 4.004),
    ("CONST_AZ", 30.0),
    ("CONST_amu", 1.66053886e-24),
    ("CONST_au", 1.49597892e13),
    ("CONST_c", 2.99792458e10),
    ("CONST_e", 4.80320425e-10),
    ("CONST_eV", 1.602176463158e-12),
    ("CONST_G", 6.6726e-8),
    ("CONST_h", 6.62606876e-27),
    ("CONST_kB", 1.3806505e-16),
    ("CONST_ly", 0.9461e18),
    ("CONST_mp", 1.67262171e-24),
    ("CONST_mn", 1.67492728e-24),
    ("CONST_me", 9.1093826e-28),
    ("CONST_mH", 1.6733e-24),
    ("CONST_Msun", 2.0e33),
    ("CONST_Mearth", 5.9736e27),
    ("CONST_NA", 6.0221367e23),
    ("CONST_pc", 3.0856775807e18),
    ("CONST_PI", 3.14159265358979),
    ("CONST_Rearth", 6.378136e8),
    ("CONST_Rgas", 8.3144598e7),
    ("CONST_Rsun", 6.96e10),
    ("CONST_sigma", 5.67051e-5),
    ("CONST_sigmaT", 6.6524e-25),
];

/// Look up a PLUTO constant by name.
pub fn pluto_constant(name: &str) -> Option<f64> {
    PLUTO_CONSTANTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

const CM_PER_PC: f64 = 3.0856775814913673e18;
const SECONDS_PER_YEAR: f64 = 3.15576e7;
const GRAMS_PER_MSUN: f64 = 1.988409870698051e33;

/// Look up a physical unit symbol.
///
/// Angles are dimensionless; `rad` has scale 1.
pub fn physical_unit(symbol: &str) -> Option<Unit> {
    let length = Dimension::LENGTH;
    let mass = Dimension::MASS;
    let time = Dimension::TIME;

    let (scale, dim) = match symbol {
        "cm" => (1.0, length),
        "m" => (1.0e2, length),
        "km" => (1.0e5, length),
        "au" => (1.495978707e13, length),
        "pc" => (CM_PER_PC, length),
        "kpc" => (CM_PER_PC * 1.0e3, length),
        "Mpc" => (CM_PER_PC * 1.0e6, length),
        "g" => (1.0, mass),
        "kg" => (1.0e3, mass),
        "Msun" => (GRAMS_PER_MSUN, mass),
        "s" => (1.0, time),
        "yr" => (SECONDS_PER_YEAR, time),
        "Myr" => (SECONDS_PER_YEAR * 1.0e6, time),
        "K" => (1.0, Dimension::TEMPERATURE),
        "erg" => (1.0, mass.mul(length.powi(2)).mul(time.powi(-2))),
        "dyn" => (1.0, mass.mul(length).mul(time.powi(-2))),
        "rad" => (1.0, Dimension::NONE),
        "deg" => (std::f64::consts::PI / 180.0, Dimension::NONE),
        _ => return None,
    };

    Some(Unit::new(symbol, scale, dim))
}
