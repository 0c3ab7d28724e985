//! Library to calibrate radiometric thermal images.
//!
//! This crate provides two functionalities:
//!
//! 1. Compute object [temperature]s from raw 16-bit sensor
//! values, correcting for atmospheric transmission,
//! reflected radiance and emissivity before inverting
//! Planck's law. The model follows the [Thermimage R
//! library].
//!
//! 2. Normalize a [batch of images][Dataset] onto one
//! intensity scale, so that images of a survey can be
//! rendered and compared together.
//!
//! # Usage
//!
//! Calibration constants are validated once per image into
//! [`CalibrationConstants`], from which an
//! [`ImageCalibration`] derives everything that does not
//! depend on pixel data.
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use radiometric::{
//!     constants::{AtmosphericCoefficients, PlanckConstants, RawRange, SceneParameters},
//!     CalibrationConstants, ImageCalibration,
//! };
//!
//! let constants = CalibrationConstants::new(
//!     PlanckConstants { r1: 14906.4, r2: 0.012269, b: 1443.7, o: -7314., f: 1. },
//!     SceneParameters {
//!         reflected_temperature: 20.,
//!         atmospheric_temperature: 20.,
//!         distance: 1.,
//!         relative_humidity: 50.,
//!         emissivity: 0.95,
//!     },
//!     AtmosphericCoefficients {
//!         alpha1: 0.006569, alpha2: 0.01262, beta1: -0.002276, beta2: -0.00667, x: 1.9,
//!     },
//!     RawRange { min: 12000, max: 16000 },
//! )?;
//! let calibration = ImageCalibration::new(constants)?;
//! let celsius = calibration.temperature(14000., 2)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Reading ExifTool output
//!
//! Constants and raw sensor values are usually read from
//! the JSON output of `exiftool -j -b` via
//! [`ThermalExiftoolJson`] and [`serde_json`]:
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use std::{convert::TryInto, fs::File, io::BufReader};
//! use radiometric::{ThermalExiftoolJson, ThermalImage};
//!
//! let json: Vec<ThermalExiftoolJson> = serde_json::from_reader(
//!     BufReader::new(File::open("metadata.json")?)
//! )?;
//! let images = json
//!     .into_iter()
//!     .map(|j| j.try_into())
//!     .collect::<anyhow::Result<Vec<ThermalImage>>>()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Converting pixels
//!
//! [`PixelConverter`] maps a raw matrix to temperatures
//! (absolute mode) or onto the bounds of a [`Dataset`]
//! (normalized mode). Pixels outside the Planck domain
//! become `NaN` and are counted, never aborting the image.
//!
//! [Thermimage R library]: //github.com/gtatters/Thermimage/blob/master/R/raw2temp.R

pub mod calibration;
pub mod constants;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod export;
pub mod image;
pub mod stats;
pub mod temperature;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::calibration::{DerivedAtmosphere, ImageCalibration};
pub use crate::constants::CalibrationConstants;
pub use crate::convert::{NormalizedMatrix, PixelConverter, TemperatureMatrix};
pub use crate::dataset::{Dataset, DatasetBounds};
pub use crate::error::CalibrationError;
pub use crate::image::{ThermalExiftoolJson, ThermalImage};
