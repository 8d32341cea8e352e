//! Arrays with an optional unit attached.

use ndarray::{Array, ArrayD, Dimension, IxDyn, Zip};

use crate::error::{PlutoError, Result};
use crate::units::Unit;

/// An array of values, either raw (no unit) or tagged with a [`Unit`].
#[derive(Debug, Clone)]
pub struct Quantity<D: Dimension = IxDyn> {
    values: Array<f64, D>,
    unit: Option<Unit>,
}

impl<D: Dimension> Quantity<D> {
    pub fn new(values: Array<f64, D>, unit: Option<Unit>) -> Self {
        Self { values, unit }
    }

    /// Raw values without a unit.
    pub fn raw(values: Array<f64, D>) -> Self {
        Self { values, unit: None }
    }

    pub fn values(&self) -> &Array<f64, D> {
        &self.values
    }

    pub fn into_values(self) -> Array<f64, D> {
        self.values
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn is_raw(&self) -> bool {
        self.unit.is_none()
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Tag the values with `unit` without changing them.
    pub fn attach(self, unit: Unit) -> Self {
        Self {
            values: self.values,
            unit: Some(unit),
        }
    }

    /// Re-express the values in `target`.
    pub fn to(self, target: &Unit) -> Result<Self> {
        let current = self.unit.as_ref().ok_or_else(|| {
            PlutoError::incompatible("raw value without unit", target.symbol())
        })?;
        let factor = current.conversion_factor(target)?;
        let values = if factor == 1.0 {
            self.values
        } else {
            self.values.mapv(|v| v * factor)
        };
        Ok(Self {
            values,
            unit: Some(target.clone()),
        })
    }

    /// Apply `f` to every value, keeping the unit.
    pub fn map_values<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            values: self.values.mapv(f),
            unit: self.unit.clone(),
        }
    }

    /// Element-wise product; units multiply.
    pub fn mul(&self, other: &Quantity<D>) -> Result<Self> {
        self.check_shape(other)?;
        let values = Zip::from(&self.values)
            .and(&other.values)
            .map_collect(|a, b| a * b);
        Ok(Self {
            values,
            unit: combine(&self.unit, &other.unit, |a, b| a.mul(b)),
        })
    }

    /// Element-wise quotient; units divide.
    pub fn div(&self, other: &Quantity<D>) -> Result<Self> {
        self.check_shape(other)?;
        let values = Zip::from(&self.values)
            .and(&other.values)
            .map_collect(|a, b| a / b);
        Ok(Self {
            values,
            unit: combine(&self.unit, &other.unit, |a, b| a.mul(&b.powi(-1))),
        })
    }

    /// Element-wise sum; `other` is converted into this quantity's unit.
    pub fn add(&self, other: &Quantity<D>) -> Result<Self> {
        self.check_shape(other)?;
        let factor = match (&self.unit, &other.unit) {
            (Some(a), Some(b)) => b.conversion_factor(a)?,
            (None, None) => 1.0,
            (a, b) => {
                return Err(PlutoError::incompatible(
                    unit_label(b.as_ref()),
                    unit_label(a.as_ref()),
                ))
            }
        };
        let values = Zip::from(&self.values)
            .and(&other.values)
            .map_collect(|a, b| a + b * factor);
        Ok(Self {
            values,
            unit: self.unit.clone(),
        })
    }

    /// Element-wise integer power.
    pub fn powi(&self, n: i32) -> Self {
        Self {
            values: self.values.mapv(|v| v.powi(n)),
            unit: self.unit.as_ref().map(|u| u.powi(n)),
        }
    }

    /// Element-wise square root; the unit's dimension must be a perfect square.
    pub fn sqrt(&self) -> Result<Self> {
        let unit = self.unit.as_ref().map(|u| u.sqrt()).transpose()?;
        Ok(Self {
            values: self.values.mapv(f64::sqrt),
            unit,
        })
    }

    /// Values as a dynamic-rank quantity.
    pub fn into_dyn(self) -> Quantity<IxDyn> {
        Quantity {
            values: self.values.into_dyn(),
            unit: self.unit,
        }
    }

    fn check_shape(&self, other: &Quantity<D>) -> Result<()> {
        if self.values.shape() != other.values.shape() {
            return Err(PlutoError::shape_mismatch(format!(
                "{:?} vs {:?}",
                self.values.shape(),
                other.values.shape()
            )));
        }
        Ok(())
    }
}

impl Quantity<IxDyn> {
    /// A single number as a zero-dimensional quantity.
    pub fn scalar(value: f64, unit: Option<Unit>) -> Self {
        Self {
            values: ArrayD::from_elem(IxDyn(&[]), value),
            unit,
        }
    }

    /// The single value of a zero-dimensional quantity.
    pub fn scalar_value(&self) -> Option<f64> {
        if self.values.ndim() == 0 {
            self.values.iter().next().copied()
        } else {
            None
        }
    }

    /// Convert into a fixed-rank quantity.
    pub fn into_dimensionality<E: Dimension>(self) -> Result<Quantity<E>> {
        Ok(Quantity {
            values: self.values.into_dimensionality::<E>()?,
            unit: self.unit,
        })
    }
}

fn combine<F>(a: &Option<Unit>, b: &Option<Unit>, f: F) -> Option<Unit>
where
    F: Fn(&Unit, &Unit) -> Unit,
{
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(f(&crate::units::Unit::dimensionless(), b)),
        (None, None) => None,
    }
}

fn unit_label(unit: Option<&Unit>) -> String {
    unit.map(|u| u.symbol().to_string())
        .unwrap_or_else(|| "raw".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{physical_unit, Dimension};
    use ndarray::{arr1, Ix1};

    #[test]
    fn test_raw_arithmetic_stays_raw() {
        let a = Quantity::<Ix1>::raw(arr1(&[3.0, 6.0]));
        let b = Quantity::<Ix1>::raw(arr1(&[4.0, 8.0]));
        let r = a.powi(2).add(&b.powi(2)).unwrap().sqrt().unwrap();
        assert!(r.is_raw());
        assert_eq!(r.values(), &arr1(&[5.0, 10.0]));
    }

    #[test]
    fn test_unit_arithmetic() {
        let km = physical_unit("km").unwrap();
        let s = physical_unit("s").unwrap();
        let d = Quantity::<Ix1>::new(arr1(&[10.0]), Some(km));
        let t = Quantity::<Ix1>::new(arr1(&[2.0]), Some(s));
        let v = d.div(&t).unwrap();
        assert_eq!(v.values()[0], 5.0);
        assert_eq!(
            v.unit().unwrap().dimension(),
            Dimension::LENGTH.mul(Dimension::TIME.powi(-1))
        );
    }

    #[test]
    fn test_add_converts_other() {
        let km = physical_unit("km").unwrap();
        let m = physical_unit("m").unwrap();
        let a = Quantity::<Ix1>::new(arr1(&[1.0]), Some(km));
        let b = Quantity::<Ix1>::new(arr1(&[500.0]), Some(m));
        let sum = a.add(&b).unwrap();
        assert!((sum.values()[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_add_raw_and_unit_fails() {
        let km = physical_unit("km").unwrap();
        let a = Quantity::<Ix1>::new(arr1(&[1.0]), Some(km));
        let b = Quantity::<Ix1>::raw(arr1(&[1.0]));
        assert!(matches!(a.add(&b), Err(PlutoError::IncompatibleUnits { .. })));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Quantity::<Ix1>::raw(arr1(&[1.0, 2.0]));
        let b = Quantity::<Ix1>::raw(arr1(&[1.0]));
        assert!(matches!(a.mul(&b), Err(PlutoError::ShapeMismatch(_))));
    }

    #[test]
    fn test_to_incompatible() {
        let km = physical_unit("km").unwrap();
        let g = physical_unit("g").unwrap();
        let a = Quantity::<Ix1>::new(arr1(&[1.0]), Some(km));
        assert!(matches!(a.to(&g), Err(PlutoError::IncompatibleUnits { .. })));
    }

    #[test]
    fn test_scalar_roundtrip() {
        let q = Quantity::scalar(2.5, None);
        assert_eq!(q.scalar_value(), Some(2.5));
    }
}
