//! Per-image calibration state.
use log::debug;
use serde_derive::*;

use crate::constants::CalibrationConstants;
use crate::error::{CalibrationError, Result};
use crate::temperature::{round_to, transmission, water_vapor, DEFAULT_PRECISION, TRANSMISSION_EPSILON};

/// Atmospheric quantities derived from the constants of an
/// image.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct DerivedAtmosphere {
    /// Water vapour content coefficient.
    pub omega: f64,
    /// Atmospheric transmission, in `(0, 1]`.
    pub tau: f64,
    /// Raw radiance contributed by the atmosphere.
    pub raw_atm: f64,
    /// Raw radiance reflected off the object.
    pub raw_refl: f64,
    // emissivity * tau, checked against TRANSMISSION_EPSILON
    #[serde(skip)]
    gain: f64,
}

impl DerivedAtmosphere {
    pub fn from_constants(constants: &CalibrationConstants) -> Result<Self> {
        let scene = constants.scene();
        let planck = constants.planck();

        let omega = water_vapor(scene)?;
        let tau = transmission(scene, constants.coefficients(), omega)?;
        let raw_atm = planck.temp_to_raw(scene.atmospheric_temperature)?;
        let raw_refl = planck.temp_to_raw(scene.reflected_temperature)?;

        let gain = scene.emissivity * tau;
        if !(gain >= TRANSMISSION_EPSILON) {
            return Err(CalibrationError::DegenerateTransmission { product: gain });
        }

        Ok(DerivedAtmosphere {
            omega,
            tau,
            raw_atm,
            raw_refl,
            gain,
        })
    }

    /// Raw radiance attributable to the object alone.
    ///
    /// `(raw - (1 - tau) raw_atm - (1 - e) tau raw_refl) / (e tau)`
    pub fn object_raw(&self, raw: f64, emissivity: f64) -> f64 {
        (raw - self.offset(emissivity)) / self.gain
    }

    /// Inverse of [`object_raw`][Self::object_raw].
    pub fn sensor_raw(&self, object_raw: f64, emissivity: f64) -> f64 {
        object_raw * self.gain + self.offset(emissivity)
    }

    fn offset(&self, emissivity: f64) -> f64 {
        (1. - self.tau) * self.raw_atm + (1. - emissivity) * self.tau * self.raw_refl
    }
}

/// Calibration of one image: constants, derived
/// atmosphere, and the temperature and scale extremes of
/// its raw range.
///
/// Everything is computed when the value is built; a
/// calibration that exists is valid for every accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCalibration {
    constants: CalibrationConstants,
    atmosphere: DerivedAtmosphere,
    t_min: f64,
    t_max: f64,
    scale_min: f64,
    scale_max: f64,
}

impl ImageCalibration {
    pub fn new(constants: CalibrationConstants) -> Result<Self> {
        let atmosphere = DerivedAtmosphere::from_constants(&constants)?;
        let planck = constants.planck();
        let emissivity = constants.scene().emissivity;
        let range = constants.raw_range();

        let raw_min_obj = atmosphere.object_raw(range.min as f64, emissivity);
        let raw_max_obj = atmosphere.object_raw(range.max as f64, emissivity);
        let t_min = round_to(planck.raw_to_temp(raw_min_obj)?, DEFAULT_PRECISION);
        let t_max = round_to(planck.raw_to_temp(raw_max_obj)?, DEFAULT_PRECISION);

        let scale_min = planck.scale_term(range.min as f64)?;
        let scale_max = planck.scale_term(range.max as f64)?;
        if scale_min > scale_max {
            return Err(CalibrationError::InvertedScale {
                min: scale_min,
                max: scale_max,
            });
        }

        debug!(
            "calibrated: omega = {:.6}, tau = {:.6}, raw_atm = {:.3}, raw_refl = {:.3}, T in [{}, {}]",
            atmosphere.omega, atmosphere.tau, atmosphere.raw_atm, atmosphere.raw_refl, t_min, t_max
        );

        Ok(ImageCalibration {
            constants,
            atmosphere,
            t_min,
            t_max,
            scale_min,
            scale_max,
        })
    }

    /// Object temperature (°C) for a raw sensor value,
    /// rounded to `precision` decimals.
    pub fn temperature(&self, raw: f64, precision: u32) -> Result<f64> {
        let raw_obj = self
            .atmosphere
            .object_raw(raw, self.constants.scene().emissivity);
        let temp = self.constants.planck().raw_to_temp(raw_obj)?;
        Ok(round_to(temp, precision))
    }

    /// Sensor raw value observed for an object at `temp` °C
    /// under this image's conditions.
    pub fn raw_for_temperature(&self, temp: f64) -> Result<f64> {
        let raw_obj = self.constants.planck().temp_to_raw(temp)?;
        Ok(self
            .atmosphere
            .sensor_raw(raw_obj, self.constants.scene().emissivity))
    }

    /// `B / ln(R1/(R2 (raw + O)) + F)` with this image's
    /// constants, on the uncorrected raw value.
    pub fn scale_term(&self, raw: f64) -> Result<f64> {
        self.constants.planck().scale_term(raw)
    }

    pub fn constants(&self) -> &CalibrationConstants {
        &self.constants
    }

    pub fn atmosphere(&self) -> &DerivedAtmosphere {
        &self.atmosphere
    }

    /// Temperature of the lowest raw value in the image, °C.
    pub fn t_min(&self) -> f64 {
        self.t_min
    }

    /// Temperature of the highest raw value in the image, °C.
    pub fn t_max(&self) -> f64 {
        self.t_max
    }

    /// Scale term of `raw_min`.
    pub fn scale_min(&self) -> f64 {
        self.scale_min
    }

    /// Scale term of `raw_max`.
    pub fn scale_max(&self) -> f64 {
        self.scale_max
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::tests::{constants, flir_coefficients, scene};
    use crate::constants::{PlanckConstants, RawRange, SceneParameters};
    use proptest::prelude::*;

    /// Constants under which small raw codes are still in the
    /// Planck domain: no offset, no atmosphere, black body.
    pub(crate) fn plain(min: u16, max: u16) -> ImageCalibration {
        let planck = PlanckConstants {
            r1: 14906.4,
            r2: 0.0122690,
            b: 1443.7,
            o: 0.,
            f: 1.,
        };
        let scene = SceneParameters {
            distance: 0.,
            emissivity: 1.,
            ..scene()
        };
        let constants =
            CalibrationConstants::new(planck, scene, flir_coefficients(), RawRange { min, max })
                .expect("valid constants");
        ImageCalibration::new(constants).expect("valid calibration")
    }

    #[test]
    fn reference_scene() -> anyhow::Result<()> {
        let cal = ImageCalibration::new(constants(12000, 16000))?;

        assert!(cal.t_min().is_finite() && cal.t_max().is_finite());
        assert!(cal.t_min() < cal.t_max());
        assert!(cal.t_max() > 0. && cal.t_max() < 100.);
        assert_eq!(cal.t_min(), -16.08);
        assert_eq!(cal.t_max(), 18.55);

        let atm = cal.atmosphere();
        assert!((atm.tau - 0.993943136).abs() < 1e-8);
        assert!((atm.raw_atm - 16204.457).abs() < 1e-2);
        assert_eq!(atm.raw_atm, atm.raw_refl);
        Ok(())
    }

    #[test]
    fn construction_is_deterministic() -> anyhow::Result<()> {
        let a = ImageCalibration::new(constants(12000, 16000))?;
        let b = ImageCalibration::new(constants(12000, 16000))?;
        assert_eq!(a.t_min().to_bits(), b.t_min().to_bits());
        assert_eq!(a.t_max().to_bits(), b.t_max().to_bits());
        assert_eq!(a.scale_min().to_bits(), b.scale_min().to_bits());
        assert_eq!(
            a.temperature(14321., 4)?.to_bits(),
            b.temperature(14321., 4)?.to_bits()
        );
        Ok(())
    }

    #[test]
    fn temperature_uses_requested_precision() -> anyhow::Result<()> {
        let cal = ImageCalibration::new(constants(12000, 16000))?;
        let coarse = cal.temperature(15000., 0)?;
        let fine = cal.temperature(15000., 6)?;
        assert_eq!(coarse, coarse.round());
        assert!((coarse - fine).abs() <= 0.5);
        Ok(())
    }

    #[test]
    fn excessive_precision_stays_in_domain() -> anyhow::Result<()> {
        let cal = ImageCalibration::new(constants(12000, 16000))?;
        let t = cal.temperature(14000., 400)?;
        assert!(t.is_finite());
        assert_eq!(t, cal.temperature(14000., crate::temperature::MAX_PRECISION)?);
        Ok(())
    }

    #[test]
    fn vanishing_emissivity_is_degenerate() {
        let scene = SceneParameters {
            emissivity: 1e-10,
            ..scene()
        };
        let constants = CalibrationConstants::new(
            crate::constants::tests::flir_planck(),
            scene,
            flir_coefficients(),
            RawRange {
                min: 12000,
                max: 16000,
            },
        )
        .unwrap();
        assert!(matches!(
            ImageCalibration::new(constants),
            Err(CalibrationError::DegenerateTransmission { .. })
        ));
    }

    #[test]
    fn raw_range_outside_domain_fails_construction() {
        assert!(matches!(
            ImageCalibration::new(constants(7314, 16000)),
            Err(CalibrationError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn scale_extremes_follow_raw_range() {
        let cal = plain(100, 200);
        assert_eq!(cal.scale_min(), cal.scale_term(100.).unwrap());
        assert_eq!(cal.scale_max(), cal.scale_term(200.).unwrap());
        assert!(cal.scale_min() < cal.scale_max());
    }

    proptest! {
        #[test]
        fn temperature_inverts_forward_model(t in -40f64..=150.) {
            let cal = ImageCalibration::new(constants(12000, 16000)).unwrap();
            let raw = cal.raw_for_temperature(t).unwrap();
            let back = cal.temperature(raw, DEFAULT_PRECISION).unwrap();
            prop_assert!((back - t).abs() <= 0.005 + 1e-9);
            prop_assert_eq!(cal.temperature(raw, DEFAULT_PRECISION).unwrap(), back);
        }
    }
}
