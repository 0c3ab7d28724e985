//! Functions to compute temperature from raw sensor values.
//!
//! The model follows the [Thermimage R library] (as does
//! [read_thermal.py]): raw sensor values are corrected for
//! atmospheric transmission and reflected radiance, then
//! Planck's law is inverted to obtain the object
//! temperature.
//!
//! Everything here is a pure function of its arguments.
//! Quantities that depend only on the constants of an
//! image are computed once by
//! [`ImageCalibration`][crate::calibration::ImageCalibration].
//!
//! [read_thermal.py]: //github.com/Nervengift/read_thermal.py/blob/master/flir_image_extractor.py
//! [Thermimage R library]: //github.com/gtatters/Thermimage/blob/master/R/raw2temp.R
use crate::constants::{AtmosphericCoefficients, PlanckConstants, SceneParameters};
use crate::error::{CalibrationError, Result};

pub const CELSIUS_OFFSET: f64 = 273.15;

/// Smallest accepted value of `emissivity * tau`.
pub const TRANSMISSION_EPSILON: f64 = 1e-9;

/// Decimal places temperatures are rounded to by default.
pub const DEFAULT_PRECISION: u32 = 2;

/// Finest rounding [`round_to`] applies. An `f64` carries
/// about 15 significant decimal digits.
pub const MAX_PRECISION: u32 = 15;

// h1 + h2 T - h3 T^2 + h4 T^3
const WATER_VAPOR_SERIES: [f64; 4] = [1.5587, 0.06939, -0.00027816, 0.00000068455];

// Excess over 1 accepted as rounding noise of the two-term
// transmission interpolation.
const TRANSMISSION_SLACK: f64 = 1e-12;

/// Water vapour content coefficient of the atmosphere.
///
/// `h2o = (RH/100) * exp(1.5587 + 0.06939 T - 0.00027816 T^2 + 0.00000068455 T^3)`
pub fn water_vapor(scene: &SceneParameters) -> Result<f64> {
    let omega = (scene.relative_humidity / 100.)
        * power_series_at(&WATER_VAPOR_SERIES, scene.atmospheric_temperature).exp();

    if !omega.is_finite() || omega < 0. {
        return Err(CalibrationError::InvalidAtmosphere {
            quantity: "omega",
            value: omega,
        });
    }
    Ok(omega)
}

/// Transmission of the atmosphere between object and
/// camera.
///
/// `tau = X exp(-sqrt(d) (a1 + b1 sqrt(h2o))) + (1 - X) exp(-sqrt(d) (a2 + b2 sqrt(h2o)))`
///
/// A result outside `(0, 1]` means the coefficient table is
/// corrupt and is reported, not clamped.
pub fn transmission(
    scene: &SceneParameters,
    coeffs: &AtmosphericCoefficients,
    omega: f64,
) -> Result<f64> {
    if !(scene.distance >= 0.) {
        return Err(CalibrationError::InvalidAtmosphere {
            quantity: "distance",
            value: scene.distance,
        });
    }

    let dist_factor = scene.distance.sqrt();
    let omega_sqrt = omega.sqrt();

    let affine1 = coeffs.alpha1 + coeffs.beta1 * omega_sqrt;
    let affine2 = coeffs.alpha2 + coeffs.beta2 * omega_sqrt;
    let tau = coeffs.x * (-dist_factor * affine1).exp()
        + (1. - coeffs.x) * (-dist_factor * affine2).exp();

    match tau {
        t if t > 0. && t <= 1. => Ok(t),
        t if t > 1. && t <= 1. + TRANSMISSION_SLACK => Ok(1.),
        t => Err(CalibrationError::InvalidAtmosphere {
            quantity: "tau",
            value: t,
        }),
    }
}

impl PlanckConstants {
    /// Raw value emitted by a black body at `temp` °C.
    ///
    /// `raw = R1/(R2 (exp(B/(temp + 273.15)) - F)) - O`
    pub fn temp_to_raw(&self, temp: f64) -> Result<f64> {
        let denom = self.r2 * ((self.b / (temp + CELSIUS_OFFSET)).exp() - self.f);
        let raw = self.r1 / denom - self.o;
        if denom == 0. || !raw.is_finite() {
            return Err(CalibrationError::SingularRadiance { temperature: temp });
        }
        Ok(raw)
    }

    /// Inverse of [`temp_to_raw`][Self::temp_to_raw], in °C
    /// and unrounded.
    pub fn raw_to_temp(&self, raw: f64) -> Result<f64> {
        Ok(self.scale_term(raw)? - CELSIUS_OFFSET)
    }

    /// `B / ln(R1/(R2 (raw + O)) + F)`: the Planck inversion
    /// in kelvin.
    ///
    /// The dataset-wide normalization bounds are expressed
    /// in this unit.
    pub fn scale_term(&self, raw: f64) -> Result<f64> {
        let shifted = raw + self.o;
        let arg = self.r1 / (self.r2 * shifted) + self.f;
        if shifted == 0. || !(arg > 0.) || !arg.is_finite() {
            return Err(CalibrationError::OutOfDomain { raw });
        }

        let term = self.b / arg.ln();
        if !term.is_finite() {
            return Err(CalibrationError::OutOfDomain { raw });
        }
        Ok(term)
    }
}

/// Rounds half away from zero to `precision` decimal
/// places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    (value * scale).round() / scale
}

#[inline]
fn power_series_at(coeffs: &[f64], x: f64) -> f64 {
    let mut pow = 1.;
    let mut sum = 0.;
    for coeff in coeffs.iter() {
        sum += pow * coeff;
        pow *= x;
    }
    sum
}
