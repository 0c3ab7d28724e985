//! Errors raised while building calibrations and converting
//! raw sensor values.
//!
//! Construction-time variants ([`MissingField`],
//! [`InvalidConstant`], [`InvalidAtmosphere`],
//! [`SingularRadiance`], [`DegenerateTransmission`]) are
//! fatal for the image they concern. [`OutOfDomain`] is
//! raised per sample and is recovered by the pixel
//! converters as `NaN`.
//!
//! [`MissingField`]: CalibrationError::MissingField
//! [`InvalidConstant`]: CalibrationError::InvalidConstant
//! [`InvalidAtmosphere`]: CalibrationError::InvalidAtmosphere
//! [`SingularRadiance`]: CalibrationError::SingularRadiance
//! [`DegenerateTransmission`]: CalibrationError::DegenerateTransmission
//! [`OutOfDomain`]: CalibrationError::OutOfDomain
use std::fmt;

use itertools::Itertools;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalibrationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("missing or non-numeric calibration fields: {}", .0.iter().join(", "))]
    MissingField(Vec<&'static str>),

    #[error("invalid calibration constants: {}", .0.iter().join("; "))]
    InvalidConstant(Vec<FieldViolation>),

    #[error("invalid atmosphere: {quantity} = {value}")]
    InvalidAtmosphere { quantity: &'static str, value: f64 },

    #[error("singular radiance at {temperature} °C: exp(B/T) equals F")]
    SingularRadiance { temperature: f64 },

    #[error("degenerate transmission: emissivity * tau = {product:e}")]
    DegenerateTransmission { product: f64 },

    #[error("raw value {raw} is outside the Planck domain")]
    OutOfDomain { raw: f64 },

    #[error("scale term of raw minimum ({min}) exceeds that of raw maximum ({max})")]
    InvertedScale { min: f64, max: f64 },

    #[error("cannot normalize an empty dataset")]
    EmptyDataset,

    #[error("dataset scale range is degenerate: S_min = S_max = {bound}")]
    DegenerateRange { bound: f64 },
}

/// A single constant that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub value: f64,
    pub reason: &'static str,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` = {} ({})", self.field, self.value, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_list_every_field() {
        let err = CalibrationError::MissingField(vec!["PlanckR1", "PlanckB"]);
        assert_eq!(
            err.to_string(),
            "missing or non-numeric calibration fields: PlanckR1, PlanckB"
        );

        let err = CalibrationError::InvalidConstant(vec![
            FieldViolation {
                field: "emissivity",
                value: 0.,
                reason: "must lie in (0, 1]",
            },
            FieldViolation {
                field: "distance",
                value: -1.,
                reason: "must be non-negative",
            },
        ]);
        assert_eq!(
            err.to_string(),
            "invalid calibration constants: `emissivity` = 0 (must lie in (0, 1]); \
             `distance` = -1 (must be non-negative)"
        );
    }
}
