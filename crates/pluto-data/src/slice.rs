//! Index selection for slices through a snapshot.

use ndarray::{ArrayD, ArrayView1, Axis};

use crate::error::{PlutoError, Result};
use crate::types::Dimensions;

/// Index of the axis value nearest to `target`.
///
/// Ties go to the lowest index; targets off the axis clamp to the nearest end.
pub fn nearest_index(axis: ArrayView1<'_, f64>, target: f64) -> Result<usize> {
    if !target.is_finite() {
        return Err(PlutoError::invalid_slice(format!("coordinate {} is not finite", target)));
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, x) in axis.iter().enumerate() {
        let distance = (x - target).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| PlutoError::invalid_slice("axis is empty"))
}

/// Axes to hold fixed for a 2D slice, as `(axis, coordinate)`.
pub(crate) fn plane_axes(dimensions: Dimensions, coords: [Option<f64>; 3]) -> Result<Vec<(usize, f64)>> {
    if dimensions != Dimensions::Three {
        return Err(PlutoError::invalid_slice(format!(
            "2D slices need a 3D snapshot, this one is {}",
            dimensions
        )));
    }
    let fixed = given(coords);
    if fixed.len() != 1 {
        return Err(PlutoError::invalid_slice(format!(
            "a 2D slice needs exactly one of x1, x2, x3, got {}",
            fixed.len()
        )));
    }
    Ok(fixed)
}

/// Axes to hold fixed for a 1D slice, as `(axis, coordinate)`.
pub(crate) fn line_axes(dimensions: Dimensions, coords: [Option<f64>; 3]) -> Result<Vec<(usize, f64)>> {
    let fixed = given(coords);
    match dimensions {
        Dimensions::Three if fixed.len() == 2 => Ok(fixed),
        Dimensions::Three => Err(PlutoError::invalid_slice(format!(
            "a 1D slice of a 3D snapshot needs exactly two of x1, x2, x3, got {}",
            fixed.len()
        ))),
        Dimensions::Two if coords[2].is_some() => Err(PlutoError::invalid_slice(
            "x3 is not an axis of a 2D snapshot",
        )),
        Dimensions::Two if fixed.len() == 1 => Ok(fixed),
        Dimensions::Two => Err(PlutoError::invalid_slice(format!(
            "a 1D slice of a 2D snapshot needs exactly one of x1, x2, got {}",
            fixed.len()
        ))),
        Dimensions::One => Err(PlutoError::invalid_slice("a 1D snapshot cannot be sliced")),
    }
}

fn given(coords: [Option<f64>; 3]) -> Vec<(usize, f64)> {
    coords
        .iter()
        .enumerate()
        .filter_map(|(k, c)| c.map(|c| (k, c)))
        .collect()
}

/// Sub-array with each `(axis, index)` pair held fixed.
///
/// `fixed` must be sorted by axis.
pub(crate) fn take(values: &ArrayD<f64>, fixed: &[(usize, usize)]) -> ArrayD<f64> {
    let mut view = values.view();
    for &(axis, index) in fixed.iter().rev() {
        view = view.index_axis_move(Axis(axis), index);
    }
    view.to_owned()
}
