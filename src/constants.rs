//! Calibration constants for a single image.
//!
//! [`CalibrationConstants`] is built in one fallible step,
//! either directly from its four parts or from the
//! parameters reported by ExifTool
//! ([`ExiftoolParameters`]). All absent fields, and
//! afterwards all out-of-range values, are reported
//! together.
use std::convert::TryFrom;

use serde_derive::*;

use crate::error::{CalibrationError, FieldViolation, Result};
use crate::temperature::CELSIUS_OFFSET;

/// Sensor response model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanckConstants {
    pub r1: f64,
    pub r2: f64,
    pub b: f64,
    pub o: f64,
    pub f: f64,
}

/// Conditions of the scene at capture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneParameters {
    /// Reflected apparent temperature, °C.
    pub reflected_temperature: f64,
    /// Atmospheric temperature, °C.
    pub atmospheric_temperature: f64,
    /// Distance to the object, m.
    pub distance: f64,
    /// Relative humidity, percent.
    pub relative_humidity: f64,
    /// Emissivity of the object, in (0, 1].
    pub emissivity: f64,
}

/// Atmospheric attenuation coefficients from the
/// instrument calibration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphericCoefficients {
    pub alpha1: f64,
    pub alpha2: f64,
    pub beta1: f64,
    pub beta2: f64,
    /// Interpolation factor between the two terms
    /// (`k_atm`).
    pub x: f64,
}

/// Observed range of raw codes in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRange {
    pub min: u16,
    pub max: u16,
}

/// Validated, immutable calibration constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConstants {
    planck: PlanckConstants,
    scene: SceneParameters,
    coefficients: AtmosphericCoefficients,
    raw_range: RawRange,
}

impl CalibrationConstants {
    pub fn new(
        planck: PlanckConstants,
        scene: SceneParameters,
        coefficients: AtmosphericCoefficients,
        raw_range: RawRange,
    ) -> Result<Self> {
        let mut v = Violations::default();

        v.positive("planck_r1", planck.r1);
        v.positive("planck_r2", planck.r2);
        v.positive("planck_b", planck.b);
        v.finite("planck_o", planck.o);
        v.finite("planck_f", planck.f);

        v.temperature("reflected_temperature", scene.reflected_temperature);
        v.temperature("atmospheric_temperature", scene.atmospheric_temperature);
        if v.finite("distance", scene.distance) {
            v.check("distance", scene.distance, scene.distance >= 0., "must be non-negative");
        }
        if v.finite("relative_humidity", scene.relative_humidity) {
            v.check(
                "relative_humidity",
                scene.relative_humidity,
                (0. ..=100.).contains(&scene.relative_humidity),
                "must lie in [0, 100]",
            );
        }
        if v.finite("emissivity", scene.emissivity) {
            v.check(
                "emissivity",
                scene.emissivity,
                scene.emissivity > 0. && scene.emissivity <= 1.,
                "must lie in (0, 1]",
            );
        }

        v.finite("alpha1", coefficients.alpha1);
        v.finite("alpha2", coefficients.alpha2);
        v.finite("beta1", coefficients.beta1);
        v.finite("beta2", coefficients.beta2);
        v.finite("x", coefficients.x);

        v.check(
            "raw_min",
            raw_range.min as f64,
            raw_range.min <= raw_range.max,
            "must not exceed raw_max",
        );

        v.into_result(CalibrationConstants {
            planck,
            scene,
            coefficients,
            raw_range,
        })
    }

    /// Returns a copy with the object distance replaced.
    pub fn with_distance(&self, distance: f64) -> Result<Self> {
        let scene = SceneParameters {
            distance,
            ..self.scene
        };
        Self::new(self.planck, scene, self.coefficients, self.raw_range)
    }

    pub fn planck(&self) -> &PlanckConstants {
        &self.planck
    }

    pub fn scene(&self) -> &SceneParameters {
        &self.scene
    }

    pub fn coefficients(&self) -> &AtmosphericCoefficients {
        &self.coefficients
    }

    pub fn raw_range(&self) -> RawRange {
        self.raw_range
    }
}

#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn check(&mut self, field: &'static str, value: f64, ok: bool, reason: &'static str) -> bool {
        if !ok {
            self.0.push(FieldViolation {
                field,
                value,
                reason,
            });
        }
        ok
    }

    fn finite(&mut self, field: &'static str, value: f64) -> bool {
        self.check(field, value, value.is_finite(), "must be finite")
    }

    fn positive(&mut self, field: &'static str, value: f64) -> bool {
        self.finite(field, value) && self.check(field, value, value > 0., "must be positive")
    }

    fn temperature(&mut self, field: &'static str, value: f64) -> bool {
        self.finite(field, value)
            && self.check(
                field,
                value,
                value + CELSIUS_OFFSET > 0.,
                "must be above absolute zero",
            )
    }

    fn into_result<T>(self, value: T) -> Result<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(CalibrationError::InvalidConstant(self.0))
        }
    }
}

/// Calibration parameters as reported by ExifTool
/// (`exiftool -j`).
///
/// Every field is optional here: numbers may come as JSON
/// numbers or as strings with a unit suffix (`"20.0 C"`),
/// and anything else reads as absent. Conversion into
/// [`CalibrationConstants`] lists all absent fields at
/// once.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ExiftoolParameters {
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    planck_r1: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    planck_r2: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    planck_b: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    planck_o: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    planck_f: Option<f64>,

    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    reflected_apparent_temperature: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    atmospheric_temperature: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    object_distance: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    relative_humidity: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    emissivity: Option<f64>,

    #[serde(
        rename = "AtmosphericTransAlpha1",
        default,
        deserialize_with = "serde_helpers::lenient_float"
    )]
    alpha1: Option<f64>,
    #[serde(
        rename = "AtmosphericTransAlpha2",
        default,
        deserialize_with = "serde_helpers::lenient_float"
    )]
    alpha2: Option<f64>,
    #[serde(
        rename = "AtmosphericTransBeta1",
        default,
        deserialize_with = "serde_helpers::lenient_float"
    )]
    beta1: Option<f64>,
    #[serde(
        rename = "AtmosphericTransBeta2",
        default,
        deserialize_with = "serde_helpers::lenient_float"
    )]
    beta2: Option<f64>,
    #[serde(
        rename = "AtmosphericTransX",
        default,
        deserialize_with = "serde_helpers::lenient_float"
    )]
    x: Option<f64>,

    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    raw_value_median: Option<f64>,
    #[serde(default, deserialize_with = "serde_helpers::lenient_float")]
    raw_value_range: Option<f64>,
}

impl TryFrom<ExiftoolParameters> for CalibrationConstants {
    type Error = CalibrationError;

    fn try_from(p: ExiftoolParameters) -> Result<Self> {
        let mut missing = vec![];
        let mut take = |name: &'static str, value: Option<f64>| {
            value.unwrap_or_else(|| {
                missing.push(name);
                f64::NAN
            })
        };

        let planck = PlanckConstants {
            r1: take("PlanckR1", p.planck_r1),
            r2: take("PlanckR2", p.planck_r2),
            b: take("PlanckB", p.planck_b),
            o: take("PlanckO", p.planck_o),
            f: take("PlanckF", p.planck_f),
        };
        let scene = SceneParameters {
            reflected_temperature: take(
                "ReflectedApparentTemperature",
                p.reflected_apparent_temperature,
            ),
            atmospheric_temperature: take("AtmosphericTemperature", p.atmospheric_temperature),
            distance: take("ObjectDistance", p.object_distance),
            relative_humidity: take("RelativeHumidity", p.relative_humidity),
            emissivity: take("Emissivity", p.emissivity),
        };
        let coefficients = AtmosphericCoefficients {
            alpha1: take("AtmosphericTransAlpha1", p.alpha1),
            alpha2: take("AtmosphericTransAlpha2", p.alpha2),
            beta1: take("AtmosphericTransBeta1", p.beta1),
            beta2: take("AtmosphericTransBeta2", p.beta2),
            x: take("AtmosphericTransX", p.x),
        };
        let median = take("RawValueMedian", p.raw_value_median);
        let range = take("RawValueRange", p.raw_value_range);

        if !missing.is_empty() {
            return Err(CalibrationError::MissingField(missing));
        }

        let raw_range = raw_range_from_median(median, range)?;
        CalibrationConstants::new(planck, scene, coefficients, raw_range)
    }
}

/// The camera reports the raw range as a median and a
/// width; the extremes sit half a width on either side.
fn raw_range_from_median(median: f64, range: f64) -> Result<RawRange> {
    let mut v = Violations::default();
    let is_code = |x: f64| x.fract() == 0. && (0. ..=u16::MAX as f64).contains(&x);
    v.check("raw_value_median", median, is_code(median), "must be a 16-bit raw code");
    v.check("raw_value_range", range, is_code(range), "must be a 16-bit raw code");
    if !v.0.is_empty() {
        return v.into_result(RawRange { min: 0, max: 0 });
    }

    let max = median as i64 + range as i64 / 2;
    let min = max - range as i64;
    let fits = |x: i64| (0..=u16::MAX as i64).contains(&x);
    v.check("raw_max", max as f64, fits(max), "exceeds the 16-bit raw code range");
    v.check("raw_min", min as f64, fits(min), "exceeds the 16-bit raw code range");
    v.into_result(RawRange {
        min: min as u16,
        max: max as u16,
    })
}

mod serde_helpers {
    use lazy_static::lazy_static;
    use regex::Regex;
    use serde::*;
    use serde_json::Value;

    /// Reads a number, or a string that begins with one
    /// (`"20.0 C"`, `"1.00 m"`). Anything else is `None`.
    pub fn lenient_float<'de, D>(de: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^\s*[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?").unwrap();
        }

        Ok(match Value::deserialize(de)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => RE.find(&s).and_then(|m| m.as_str().trim().parse().ok()),
            _ => None,
        })
    }
}
