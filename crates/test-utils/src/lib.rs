//! Shared test utilities for the pluto-data workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Float assertion macros
//! - Synthetic axis and field generators
//! - `definitions.h` / step log fixtures and temporary run directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures, TempRunDir};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::TempRunDir;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for element-wise relative equality of two sequences of floats.
///
/// Both sides are anything iterable over `&f64` (slices, ndarray arrays).
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_all_close;
///
/// assert_all_close!(grid.dv().values(), expected.view(), 1e-12);
/// ```
#[macro_export]
macro_rules! assert_all_close {
    ($left:expr, $right:expr, $rtol:expr) => {{
        let left: Vec<f64> = $left.into_iter().copied().collect();
        let right: Vec<f64> = $right.into_iter().copied().collect();
        let rtol: f64 = $rtol as f64;
        assert_eq!(left.len(), right.len(), "length mismatch");
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let scale = l.abs().max(r.abs()).max(f64::MIN_POSITIVE);
            if (l - r).abs() > rtol * scale {
                panic!(
                    "assertion failed at index {}: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  rtol: `{:?}`",
                    i, l, r, rtol
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_all_close_passes() {
        let a = arr1(&[1.0e20, 2.0, 0.0]);
        let b = [1.0e20 * (1.0 + 1e-14), 2.0, 0.0];
        assert_all_close!(&a, &b, 1e-12);
    }

    #[test]
    #[should_panic(expected = "assertion failed at index 1")]
    fn test_assert_all_close_fails() {
        assert_all_close!(&[1.0, 2.0], &[1.0, 2.1], 1e-6);
    }
}
