//! Element-wise conversion of raw pixel matrices.
//!
//! Both modes map every pixel independently (in parallel)
//! and return a matrix of the same shape as the input.
//! Pixels outside the Planck domain become `NaN` and are
//! counted; they never abort the conversion.
use log::warn;
use ndarray::{parallel::prelude::*, Array2, ArrayView2, Zip};

use crate::calibration::ImageCalibration;
use crate::dataset::DatasetBounds;
use crate::error::Result;
use crate::temperature::DEFAULT_PRECISION;

/// Calibrated temperatures, °C.
#[derive(Debug, Clone)]
pub struct TemperatureMatrix {
    pub values: Array2<f64>,
    /// Number of `NaN` cells.
    pub out_of_domain: usize,
}

/// Pixel scale terms mapped into the dataset bounds.
///
/// Values are not clipped: pixels beyond the extremes
/// observed in the dataset fall outside `[0, 1]`.
#[derive(Debug, Clone)]
pub struct NormalizedMatrix {
    pub values: Array2<f64>,
    /// Number of `NaN` cells.
    pub out_of_domain: usize,
    /// The dataset range was zero; every value is `0`, and
    /// `out_of_domain` still counts undefined pixels.
    pub degenerate: bool,
}

impl NormalizedMatrix {
    /// Quantizes to 16-bit codes, saturating outside
    /// `[0, 1]`. `NaN` maps to `0`.
    pub fn to_u16(&self) -> Array2<u16> {
        const MAX: f64 = u16::MAX as f64;
        Zip::from(&self.values).par_map_collect(|&v| {
            if v.is_nan() {
                0
            } else {
                (v * MAX).round().max(0.).min(MAX) as u16
            }
        })
    }
}

/// Converts raw pixels of one image.
#[derive(Debug, Clone, Copy)]
pub struct PixelConverter<'a> {
    calibration: &'a ImageCalibration,
    precision: u32,
}

impl<'a> PixelConverter<'a> {
    pub fn new(calibration: &'a ImageCalibration) -> Self {
        PixelConverter {
            calibration,
            precision: DEFAULT_PRECISION,
        }
    }

    /// Decimal places of [`temperatures`][Self::temperatures],
    /// at most [`MAX_PRECISION`](crate::temperature::MAX_PRECISION).
    pub fn with_precision(self, precision: u32) -> Self {
        PixelConverter { precision, ..self }
    }

    /// Absolute mode: per-pixel temperature in °C.
    pub fn temperatures(&self, raw: ArrayView2<u16>) -> TemperatureMatrix {
        let cal = self.calibration;
        let precision = self.precision;
        let values = map_pixels(raw, |r| cal.temperature(r, precision));
        let out_of_domain = count_nan(&values);
        if out_of_domain > 0 {
            warn!("{} pixels outside the Planck domain", out_of_domain);
        }

        TemperatureMatrix {
            values,
            out_of_domain,
        }
    }

    /// Normalized mode: `(scale_term(raw) - S_min) / (S_max - S_min)`.
    pub fn normalized(&self, raw: ArrayView2<u16>, bounds: &DatasetBounds) -> NormalizedMatrix {
        let cal = self.calibration;
        if bounds.is_degenerate() {
            // values stay zero, but undefined pixels are still counted
            let out_of_domain = raw
                .into_par_iter()
                .filter(|&&r| cal.scale_term(r as f64).is_err())
                .count();
            return NormalizedMatrix {
                values: Array2::zeros(raw.raw_dim()),
                out_of_domain,
                degenerate: true,
            };
        }

        let s_min = bounds.s_min();
        let range = bounds.range();
        let values = map_pixels(raw, |r| Ok((cal.scale_term(r)? - s_min) / range));
        let out_of_domain = count_nan(&values);
        if out_of_domain > 0 {
            warn!("{} pixels outside the Planck domain", out_of_domain);
        }

        NormalizedMatrix {
            values,
            out_of_domain,
            degenerate: false,
        }
    }

    /// The normalized-mode transform of this image, as an
    /// equation in the raw value `raw`.
    pub fn transform_description(&self, bounds: &DatasetBounds) -> String {
        if bounds.is_degenerate() {
            return "V = 0".into();
        }

        let p = self.calibration.constants().planck();
        format!(
            "V = ({b} / ln({r1} / ({r2} * (raw + {o})) + {f}) - {s_min}) / {range}",
            b = p.b,
            r1 = p.r1,
            r2 = p.r2,
            o = p.o,
            f = p.f,
            s_min = bounds.s_min(),
            range = bounds.range(),
        )
    }
}

fn map_pixels<F>(raw: ArrayView2<u16>, f: F) -> Array2<f64>
where
    F: Fn(f64) -> Result<f64> + Sync + Send,
{
    Zip::from(&raw).par_map_collect(|&r| f(r as f64).unwrap_or(f64::NAN))
}

fn count_nan(values: &Array2<f64>) -> usize {
    values.par_iter().filter(|v| v.is_nan()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::tests::plain;
    use crate::constants::tests::constants;
    use ndarray::array;

    fn reference() -> ImageCalibration {
        ImageCalibration::new(constants(12000, 16000)).unwrap()
    }

    #[test]
    fn absolute_mode_keeps_shape() {
        let cal = reference();
        let raw = Array2::from_shape_fn((3, 5), |(r, c)| 12000 + 250 * (r * 5 + c) as u16);
        let out = PixelConverter::new(&cal).temperatures(raw.view());

        assert_eq!(out.values.dim(), (3, 5));
        assert_eq!(out.out_of_domain, 0);
        assert_eq!(out.values[(0, 0)], cal.t_min());
        assert_eq!(out.values[(0, 0)], cal.temperature(12000., 2).unwrap());
        assert_eq!(out.values[(2, 4)], cal.temperature(15500., 2).unwrap());
    }

    #[test]
    fn out_of_domain_pixel_becomes_nan() {
        let cal = reference();
        let raw = array![[12000, 13000], [7314, 16000]];
        let out = PixelConverter::new(&cal).temperatures(raw.view());

        assert_eq!(out.out_of_domain, 1);
        assert!(out.values[(1, 0)].is_nan());
        assert_eq!(out.values[(0, 1)], cal.temperature(13000., 2).unwrap());
        assert_eq!(out.values[(1, 1)], cal.t_max());
    }

    #[test]
    fn precision_is_applied() {
        let cal = reference();
        let raw = array![[14321u16]];
        let out = PixelConverter::new(&cal)
            .with_precision(0)
            .temperatures(raw.view());
        assert_eq!(out.values[(0, 0)], out.values[(0, 0)].round());
    }

    #[test]
    fn excessive_precision_is_not_out_of_domain() {
        let cal = reference();
        let raw = array![[13000u16, 14000]];
        let out = PixelConverter::new(&cal)
            .with_precision(400)
            .temperatures(raw.view());
        assert_eq!(out.out_of_domain, 0);
        assert!(out.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn normalized_mode_is_not_clipped() -> anyhow::Result<()> {
        let first = plain(100, 200);
        let second = plain(150, 250);
        let bounds = DatasetBounds::from_images(&[first.clone(), second])?;

        let raw = array![[100u16, 250], [50, 400]];
        let out = PixelConverter::new(&first).normalized(raw.view(), &bounds);

        assert!(!out.degenerate);
        assert_eq!(out.out_of_domain, 0);
        assert_eq!(out.values[(0, 0)], 0.);
        assert!((out.values[(0, 1)] - 1.).abs() < 1e-12);
        assert!(out.values[(1, 0)] < 0.);
        assert!(out.values[(1, 1)] > 1.);

        let codes = out.to_u16();
        assert_eq!(codes[(0, 0)], 0);
        assert_eq!(codes[(0, 1)], u16::MAX);
        assert_eq!(codes[(1, 0)], 0);
        assert_eq!(codes[(1, 1)], u16::MAX);
        Ok(())
    }

    #[test]
    fn normalized_out_of_domain_pixel_becomes_nan() -> anyhow::Result<()> {
        let cal = reference();
        let bounds = DatasetBounds::from_images(std::slice::from_ref(&cal))?;
        let raw = array![[7314u16, 14000]];
        let out = PixelConverter::new(&cal).normalized(raw.view(), &bounds);

        assert_eq!(out.out_of_domain, 1);
        assert!(out.values[(0, 0)].is_nan());
        assert!(out.values[(0, 1)] > 0. && out.values[(0, 1)] < 1.);
        assert_eq!(out.to_u16()[(0, 0)], 0);
        Ok(())
    }

    #[test]
    fn degenerate_bounds_map_to_zero() -> anyhow::Result<()> {
        let cal = plain(180, 180);
        let bounds = DatasetBounds::from_images(std::slice::from_ref(&cal))?;
        let raw = array![[170u16, 180, 190]];
        let converter = PixelConverter::new(&cal);
        let out = converter.normalized(raw.view(), &bounds);

        assert!(out.degenerate);
        assert_eq!(out.values, Array2::<f64>::zeros((1, 3)));
        assert_eq!(converter.transform_description(&bounds), "V = 0");
        Ok(())
    }

    #[test]
    fn degenerate_bounds_still_count_undefined_pixels() -> anyhow::Result<()> {
        let cal = reference();
        let bounds = DatasetBounds::from_images(&[plain(180, 180)])?;
        let raw = array![[7314u16, 14000, 7000]];
        let out = PixelConverter::new(&cal).normalized(raw.view(), &bounds);

        assert!(out.degenerate);
        assert_eq!(out.out_of_domain, 2);
        assert_eq!(out.values, Array2::<f64>::zeros((1, 3)));
        Ok(())
    }

    #[test]
    fn description_names_the_bounds() -> anyhow::Result<()> {
        let cal = reference();
        let bounds = DatasetBounds::from_images(std::slice::from_ref(&cal))?;
        let desc = PixelConverter::new(&cal).transform_description(&bounds);
        assert!(desc.starts_with("V = (1443.7 / ln(14906.4 / (0.012269 * (raw + -7314)) + 1) - "));
        assert!(desc.ends_with(&format!("{}", bounds.range())));
        Ok(())
    }
}
