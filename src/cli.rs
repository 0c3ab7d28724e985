//! Helpers for the accompanying binaries: argument parsing,
//! parallel loading of ExifTool JSON, and logging.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use std::{
    convert::{TryFrom, TryInto},
    fs::File,
    io::{BufReader, Read},
};

use anyhow::{Context, Result};
pub use clap::{App, Arg};
use flexi_logger::{Logger, LoggerHandle};
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;
use log::{info, warn};
use rayon::iter::{once, Either, IntoParallelIterator, ParallelIterator};
use serde_derive::*;

use crate::{
    calibration::ImageCalibration,
    dataset::Dataset,
    image::{ThermalExiftoolJson, ThermalImage},
};

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Logs to stderr at `level`, unless `RUST_LOG` is set.
pub fn setup_logging(level: &str) -> Result<LoggerHandle> {
    Ok(Logger::try_with_env_or_str(level)?.log_to_stderr().start()?)
}

/// A loaded image and the file it was captured as.
#[derive(Debug)]
pub struct ThermalInput {
    pub filename: String,
    pub image: ThermalImage,
}

impl ThermalInput {
    fn try_from_exiftool_json<R: Read>(rdr: R) -> Result<Vec<Result<Self>>> {
        Ok(serde_json::from_reader::<R, Vec<JsonFormat>>(rdr)?
            .into_iter()
            .map(|j| j.try_into())
            .collect())
    }
}

#[derive(Deserialize)]
struct JsonFormat {
    #[serde(rename = "SourceFile")]
    pub filename: String,

    #[serde(flatten)]
    pub image: ThermalExiftoolJson,
}
impl TryFrom<JsonFormat> for ThermalInput {
    type Error = anyhow::Error;

    fn try_from(j: JsonFormat) -> Result<Self> {
        let JsonFormat { filename, image } = j;
        let image = ThermalImage::try_from(image).with_context(|| filename.clone())?;
        Ok(Self { filename, image })
    }
}

/// Loads ExifTool JSON files (`exiftool -j -b`) in parallel.
/// Every record of every file yields one item; a file that
/// cannot be read or parsed yields a single error.
pub fn process_paths_par(paths: Vec<String>) -> impl ParallelIterator<Item = Result<ThermalInput>> {
    let bar = ProgressBar::new(paths.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7}"),
    );
    let bar_dup = bar.clone();

    paths
        .into_par_iter()
        .map(move |p| {
            let vec = File::open(&p)
                .map_err(|e| e.into())
                .and_then(|f| ThermalInput::try_from_exiftool_json(BufReader::new(f)))
                .with_context(|| p.clone());
            match vec {
                Ok(vec) => {
                    if vec.len() > 1 {
                        bar.inc_length(vec.len() as u64 - 1);
                    }
                    Either::Left(vec.into_par_iter())
                }
                Err(e) => Either::Right(once(Err(e))),
            }
        })
        .flatten()
        .inspect(move |_| bar_dup.inc(1))
}

/// Images of a batch that calibrated successfully, and
/// the reasons the others did not.
pub struct CalibratedBatch {
    /// `inputs[i]` is calibrated by `dataset.images()[i]`.
    pub inputs: Vec<ThermalInput>,
    pub dataset: Dataset,
    pub failures: Vec<String>,
}

/// Loads and calibrates every record of `paths`, optionally
/// overriding the object distance. Images that fail to load
/// or calibrate are logged and skipped.
pub fn calibrate_paths_par(paths: Vec<String>, distance: Option<f64>) -> CalibratedBatch {
    let results: Vec<Result<(ThermalInput, ImageCalibration)>> = process_paths_par(paths)
        .map(|input| -> Result<_> {
            let ThermalInput {
                filename,
                mut image,
            } = input?;
            if let Some(distance) = distance {
                image = image
                    .with_distance(distance)
                    .with_context(|| filename.clone())?;
            }
            let calibration = image.calibration().with_context(|| filename.clone())?;
            Ok((ThermalInput { filename, image }, calibration))
        })
        .collect();

    let mut inputs = vec![];
    let mut dataset = Dataset::default();
    let mut failures = vec![];
    for result in results {
        match result {
            Ok((input, calibration)) => {
                inputs.push(input);
                dataset.push(calibration);
            }
            Err(e) => {
                warn!("skipping: {:#}", e);
                failures.push(format!("{:#}", e));
            }
        }
    }
    info!(
        "calibrated {} images, skipped {}",
        inputs.len(),
        failures.len()
    );

    CalibratedBatch {
        inputs,
        dataset,
        failures,
    }
}
