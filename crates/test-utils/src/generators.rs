//! Synthetic axis and field data.
//!
//! Field generators return arrays in the on-disk `(x3, x2, x1)` axis order
//! that a snapshot reader hands over, so tests exercise the transposition
//! into logical `(x1, x2, x3)` order.

use ndarray::{Array1, ArrayD, Dimension, IxDyn};

/// `n + 1` equally spaced cell interfaces spanning `[lo, hi]`.
pub fn uniform_edges(n: usize, lo: f64, hi: f64) -> Array1<f64> {
    Array1::linspace(lo, hi, n + 1)
}

/// Cell centres of [`uniform_edges`].
pub fn uniform_centers(n: usize, lo: f64, hi: f64) -> Array1<f64> {
    let dx = (hi - lo) / n as f64;
    Array1::from_shape_fn(n, |i| lo + (i as f64 + 0.5) * dx)
}

/// On-disk array for a logical `shape`, with values `f(logical index)`.
///
/// `shape` lists the cell counts of the active axes in `(x1, x2, x3)`
/// order; the returned array has them reversed.
pub fn on_disk_field<F>(shape: &[usize], f: F) -> ArrayD<f64>
where
    F: Fn(&[usize]) -> f64,
{
    let reversed: Vec<usize> = shape.iter().rev().copied().collect();
    ArrayD::from_shape_fn(IxDyn(&reversed), |idx| {
        let logical: Vec<usize> = idx.slice().iter().rev().copied().collect();
        f(&logical)
    })
}

/// On-disk array whose value encodes the logical index: `100·i + 10·j + k`.
///
/// Makes transposition mistakes obvious in assertions.
pub fn encoded_field(shape: &[usize]) -> ArrayD<f64> {
    on_disk_field(shape, |idx| {
        idx.iter()
            .zip([100.0, 10.0, 1.0])
            .map(|(i, w)| *i as f64 * w)
            .sum()
    })
}

/// On-disk array filled with one value.
pub fn constant_field(shape: &[usize], value: f64) -> ArrayD<f64> {
    on_disk_field(shape, |_| value)
}
