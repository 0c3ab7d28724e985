//! Dataset-wide scaling bounds.
//!
//! Images of a batch are rendered on one intensity scale by
//! mapping the scale term of every pixel into
//! `[S_min, S_max]`, the extremes of the scale terms of all
//! images' raw ranges.
use log::{debug, warn};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde_derive::*;

use crate::calibration::ImageCalibration;
use crate::error::{CalibrationError, Result};

/// Global scaling bounds of a batch, in the unit of
/// [`ImageCalibration::scale_term`].
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct DatasetBounds {
    s_min: f64,
    s_max: f64,
}

impl DatasetBounds {
    /// Reduces the scale extremes of `images`: the minimum
    /// over `scale_min` and the maximum over `scale_max`.
    pub fn from_images(images: &[ImageCalibration]) -> Result<Self> {
        if images.is_empty() {
            return Err(CalibrationError::EmptyDataset);
        }

        let (s_min, s_max) = images
            .par_iter()
            .map(|img| (img.scale_min(), img.scale_max()))
            .reduce(
                || (f64::INFINITY, f64::NEG_INFINITY),
                |(min1, max1), (min2, max2)| (min1.min(min2), max1.max(max2)),
            );

        let bounds = DatasetBounds { s_min, s_max };
        debug!(
            "dataset bounds over {} images: [{}, {}]",
            images.len(),
            s_min,
            s_max
        );
        if bounds.is_degenerate() {
            warn!("dataset scale range is degenerate: S_min = S_max = {}", s_min);
        }
        Ok(bounds)
    }

    /// Bounds of one image on its own: its scale term at
    /// `raw_min` and `raw_max`.
    pub fn for_image(image: &ImageCalibration) -> Self {
        DatasetBounds {
            s_min: image.scale_min(),
            s_max: image.scale_max(),
        }
    }

    pub fn s_min(&self) -> f64 {
        self.s_min
    }

    pub fn s_max(&self) -> f64 {
        self.s_max
    }

    /// `S_max - S_min`, possibly zero.
    pub fn range(&self) -> f64 {
        self.s_max - self.s_min
    }

    pub fn is_degenerate(&self) -> bool {
        self.s_max == self.s_min
    }

    /// Like [`range`][Self::range], but a zero range is an
    /// error.
    pub fn checked_range(&self) -> Result<f64> {
        if self.is_degenerate() {
            return Err(CalibrationError::DegenerateRange { bound: self.s_min });
        }
        Ok(self.range())
    }
}

/// A batch of calibrated images normalized together.
///
/// The bounds are computed on first access and kept until
/// the set of images changes.
#[derive(Debug, Default)]
pub struct Dataset {
    images: Vec<ImageCalibration>,
    bounds: OnceCell<DatasetBounds>,
}

impl Dataset {
    pub fn new(images: Vec<ImageCalibration>) -> Self {
        Dataset {
            images,
            bounds: OnceCell::new(),
        }
    }

    pub fn images(&self) -> &[ImageCalibration] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn push(&mut self, image: ImageCalibration) {
        self.images.push(image);
        self.bounds = OnceCell::new();
    }

    /// Removes the image at `idx`; `None` if out of bounds.
    pub fn remove(&mut self, idx: usize) -> Option<ImageCalibration> {
        if idx >= self.images.len() {
            return None;
        }
        self.bounds = OnceCell::new();
        Some(self.images.remove(idx))
    }

    /// Dataset bounds, computed once per set of images.
    pub fn bounds(&self) -> Result<&DatasetBounds> {
        self.bounds
            .get_or_try_init(|| DatasetBounds::from_images(&self.images))
    }
}

impl std::iter::FromIterator<ImageCalibration> for Dataset {
    fn from_iter<I: IntoIterator<Item = ImageCalibration>>(iter: I) -> Self {
        Dataset::new(iter.into_iter().collect())
    }
}
