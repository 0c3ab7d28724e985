//! Per-image output files, named after the image's source
//! file: `<stem>.ir.csv` temperature grids, and `<stem>.tif`
//! normalized 16-bit rasters with a `<stem>.transform.txt`
//! sidecar.
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use image::{codecs::tiff::TiffEncoder, ColorType};
use itertools::Itertools;
use log::debug;
use ndarray::ArrayView2;
use zerocopy::AsBytes;

use crate::{
    calibration::ImageCalibration,
    convert::{PixelConverter, TemperatureMatrix},
    dataset::DatasetBounds,
};

/// `<output>/<stem of filename>.<extension>`. Only the last
/// extension of `filename` is dropped.
pub fn output_path_for(output: &Path, filename: &str, extension: &str) -> Result<PathBuf> {
    let stem = Path::new(filename)
        .file_stem()
        .ok_or_else(|| anyhow!("no file name in `{}`", filename))?;
    Ok(output.join(format!("{}.{}", stem.to_string_lossy(), extension)))
}

/// Writes one comma-separated line per row of `temps`.
/// Undefined pixels are written as `NaN`.
pub fn write_temperature_csv(
    output: &Path,
    filename: &str,
    temps: &TemperatureMatrix,
) -> Result<PathBuf> {
    let path = output_path_for(output, filename, "ir.csv")?;

    let mut out = BufWriter::new(File::create(&path)?);
    for row in temps.values.rows() {
        writeln!(out, "{}", row.iter().join(","))?;
    }
    out.flush()?;
    Ok(path)
}

pub struct NormalizedTiff {
    pub path: PathBuf,
    pub transform_path: PathBuf,
    pub out_of_domain: usize,
    pub degenerate: bool,
}

/// Writes the normalized image as a 16-bit grayscale TIFF,
/// with the per-pixel transform alongside in a text file.
pub fn write_normalized_tiff(
    output: &Path,
    filename: &str,
    raw: ArrayView2<u16>,
    cal: &ImageCalibration,
    bounds: &DatasetBounds,
) -> Result<NormalizedTiff> {
    let converter = PixelConverter::new(cal);
    let normalized = converter.normalized(raw, bounds);
    let (ht, wid) = normalized.values.dim();
    let pixels: Vec<u16> = normalized.to_u16().iter().copied().collect();

    let path = output_path_for(output, filename, "tif")?;
    let image_writer = BufWriter::new(File::create(&path)?);
    TiffEncoder::new(image_writer).encode(
        pixels.as_bytes(),
        wid as u32,
        ht as u32,
        ColorType::L16,
    )?;

    let description = converter.transform_description(bounds);
    debug!("{}: {}", filename, description);
    let transform_path = output_path_for(output, filename, "transform.txt")?;
    fs::write(
        &transform_path,
        format!("{}\nV in [0, 1] is stored as round(65535 V)\n", description),
    )?;

    Ok(NormalizedTiff {
        path,
        transform_path,
        out_of_domain: normalized.out_of_domain,
        degenerate: normalized.degenerate,
    })
}
