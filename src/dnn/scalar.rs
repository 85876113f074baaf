//! Scaling parameters (`alpha`, `beta`) in the width the library expects.

use std::ffi::c_void;

use crate::error::{DnnError, DnnResult};
use crate::tensor::Precision;

/// A host scalar held in both widths.
///
/// The library reads `alpha`/`beta` through an untyped pointer whose width
/// depends on the tensor precision: `double` for double tensors and `float`
/// for single and half tensors. Both representations live inside the value,
/// so the pointer returned by [`Scalar::data`] is valid for as long as the
/// `Scalar` is.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    double_value: f64,
    float_value: f32,
    precision: Precision,
}

impl Scalar {
    pub fn new(value: f64, precision: Precision) -> DnnResult<Self> {
        if !precision.is_float() {
            return Err(DnnError::UnsupportedPrecision(precision));
        }

        Ok(Self {
            double_value: value,
            float_value: value as f32,
            precision,
        })
    }

    pub fn one(precision: Precision) -> DnnResult<Self> {
        Self::new(1.0, precision)
    }

    pub fn zero(precision: Precision) -> DnnResult<Self> {
        Self::new(0.0, precision)
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// The value as the library will read it back.
    pub fn value(&self) -> f64 {
        match self.precision {
            Precision::Double => self.double_value,
            _ => self.float_value as f64,
        }
    }

    pub fn data(&self) -> *const c_void {
        match self.precision {
            Precision::Double => &self.double_value as *const f64 as *const c_void,
            _ => &self.float_value as *const f32 as *const c_void,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnn::mock::MockLibrary;

    #[test]
    fn test_scalar_round_trip() {
        let values = [0.0, 1.0, -2.5, 1.0 / 3.0, 6.02e23, f64::MIN_POSITIVE];

        for &value in &values {
            let double = Scalar::new(value, Precision::Double).unwrap();
            let decoded = unsafe { MockLibrary::read_scalar(double.data(), Precision::Double.data_type()) };
            assert_eq!(decoded, value);

            let single = Scalar::new(value, Precision::Single).unwrap();
            let decoded = unsafe { MockLibrary::read_scalar(single.data(), Precision::Single.data_type()) };
            assert_eq!(decoded, value as f32 as f64);
            if value != 0.0 && value.abs() > f32::MIN_POSITIVE as f64 {
                assert!(((decoded - value) / value).abs() <= f32::EPSILON as f64);
            }
        }
    }

    #[test]
    fn test_half_uses_float_scalars() {
        let scalar = Scalar::new(0.1, Precision::Half).unwrap();
        let decoded = unsafe { MockLibrary::read_scalar(scalar.data(), Precision::Half.data_type()) };
        assert_eq!(decoded, 0.1f32 as f64);
        assert_eq!(scalar.value(), decoded);
    }

    #[test]
    fn test_integer_precision_rejected() {
        assert_eq!(
            Scalar::new(1.0, Precision::Int8).unwrap_err(),
            DnnError::UnsupportedPrecision(Precision::Int8)
        );
        assert!(Scalar::one(Precision::Int32).is_err());
        assert_eq!(Scalar::zero(Precision::Single).unwrap().value(), 0.0);
    }
}
