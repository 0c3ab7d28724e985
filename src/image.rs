//! Calibration parameters and raw sensor values from
//! ExifTool JSON (`exiftool -j -b`).
use std::{
    convert::{TryFrom, TryInto},
    io::Cursor,
};

use anyhow::{anyhow, bail, Context, Error, Result};
use image::{
    codecs::{png::PngDecoder, tiff::TiffDecoder},
    ColorType, ImageDecoder,
};
use ndarray::Array2;
use serde_derive::*;

use crate::{
    calibration::ImageCalibration,
    constants::{CalibrationConstants, ExiftoolParameters},
};

/// Raw sensor values of an image with the constants needed
/// to calibrate them.
#[derive(Debug, Clone)]
pub struct ThermalImage {
    pub constants: CalibrationConstants,
    pub raw: Array2<u16>,
}

impl ThermalImage {
    pub fn calibration(&self) -> crate::error::Result<ImageCalibration> {
        ImageCalibration::new(self.constants)
    }

    /// Replaces the object distance of the constants.
    pub fn with_distance(self, distance: f64) -> crate::error::Result<Self> {
        Ok(ThermalImage {
            constants: self.constants.with_distance(distance)?,
            raw: self.raw,
        })
    }
}

/// One record of `exiftool -j -b` output.
#[derive(Deserialize, Debug)]
pub struct ThermalExiftoolJson {
    #[serde(flatten)]
    pub parameters: ExiftoolParameters,

    #[serde(flatten)]
    pub raw: ThermalRawBytes,
}

impl TryFrom<ThermalExiftoolJson> for ThermalImage {
    type Error = Error;

    fn try_from(json: ThermalExiftoolJson) -> Result<Self> {
        let constants: CalibrationConstants = json.parameters.try_into()?;
        let raw = json.raw.thermal_image()?;
        Ok(ThermalImage { constants, raw })
    }
}

/// The embedded raw thermal image, base64 encoded by
/// ExifTool.
#[derive(Deserialize, Debug, Default)]
pub struct ThermalRawBytes {
    #[serde(rename = "RawThermalImageType", default)]
    ty: Option<String>,

    #[serde(
        rename = "RawThermalImage",
        default,
        deserialize_with = "serde_helpers::base64_bytes"
    )]
    base64_bytes: Option<Vec<u8>>,
}

impl ThermalRawBytes {
    /// Decodes the raw sensor values as a `height x width`
    /// matrix.
    pub fn thermal_image(&self) -> Result<Array2<u16>> {
        let bytes = self
            .base64_bytes
            .as_deref()
            .ok_or_else(|| anyhow!("no raw thermal image (was exiftool run with -b?)"))?;

        match self.ty.as_deref() {
            Some("TIFF") => decode_raw(TiffDecoder::new(Cursor::new(bytes))?, false),
            // FLIR stores PNG raw data with swapped bytes
            Some("PNG") => decode_raw(PngDecoder::new(Cursor::new(bytes))?, true),
            Some(ty) => bail!("unsupported raw image type: {}", ty),
            None => bail!("raw image type not specified"),
        }
    }
}

pub(crate) fn decode_raw<'a, D: ImageDecoder<'a>>(decoder: D, swap_bytes: bool) -> Result<Array2<u16>> {
    use zerocopy::AsBytes;

    let (width, height) = decoder.dimensions();
    let (width, height) = (width as usize, height as usize);
    let color_type = decoder.color_type();

    let values = match color_type {
        ColorType::L16 => {
            let mut image = vec![0u16; width * height];
            decoder.read_image(image.as_bytes_mut())?;
            if swap_bytes {
                image.iter_mut().for_each(|v| *v = v.swap_bytes());
            }
            image
        }
        ColorType::L8 => {
            let mut image = vec![0u8; width * height];
            decoder.read_image(&mut image)?;
            image.into_iter().map(u16::from).collect()
        }
        _ => bail!("unsupported color type: {:?}", color_type),
    };

    Array2::from_shape_vec((height, width), values).context("raw image dimensions")
}

mod serde_helpers {
    use lazy_static::lazy_static;
    use regex::Regex;
    use serde::*;

    pub fn base64_bytes<'de, D>(de: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^base64:").unwrap();
        }

        use serde::de::Error;
        let str_rep = match <Option<String> as Deserialize>::deserialize(de)? {
            Some(s) => s,
            None => return Ok(None),
        };

        let prefix = RE
            .find(&str_rep)
            .ok_or_else(|| D::Error::custom("unexpected format: must begin with `base64:`"))?;

        let bytes = base64::decode(&str_rep[prefix.end()..]).map_err(D::Error::custom)?;
        Ok(Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3x2 little-endian 16-bit grayscale TIFF, values
    // 12000..=12005 row by row.
    const RAW_TIFF_BASE64: &str = include_str!("../tests/data/raw_3x2.tiff.b64");

    fn record(raw: Option<(&str, &str)>) -> serde_json::Value {
        let mut json = serde_json::json!({
            "SourceFile": "IR_0001.jpg",
            "Emissivity": 0.95,
            "ObjectDistance": "1.00 m",
            "ReflectedApparentTemperature": "20.0 C",
            "AtmosphericTemperature": "20.0 C",
            "RelativeHumidity": "50.0 %",
            "PlanckR1": 14906.4,
            "PlanckB": 1443.7,
            "PlanckF": 1,
            "PlanckO": -7314,
            "PlanckR2": 0.012269,
            "AtmosphericTransAlpha1": 0.006569,
            "AtmosphericTransAlpha2": 0.012620,
            "AtmosphericTransBeta1": -0.002276,
            "AtmosphericTransBeta2": -0.006670,
            "AtmosphericTransX": 1.9,
            "RawValueMedian": 14000,
            "RawValueRange": 4000
        });
        if let Some((ty, data)) = raw {
            let obj = json.as_object_mut().unwrap();
            obj.insert("RawThermalImageType".into(), ty.into());
            obj.insert("RawThermalImage".into(), data.into());
        }
        json
    }

    #[test]
    fn decodes_tiff_raw_image() -> Result<()> {
        let data = format!("base64:{}", RAW_TIFF_BASE64.trim());
        let json: ThermalExiftoolJson = serde_json::from_value(record(Some(("TIFF", data.as_str()))))?;
        let image: ThermalImage = json.try_into()?;

        assert_eq!(image.raw.dim(), (2, 3));
        assert_eq!(image.raw[(0, 0)], 12000);
        assert_eq!(image.raw[(0, 2)], 12002);
        assert_eq!(image.raw[(1, 2)], 12005);
        assert_eq!(image.constants.raw_range().max, 16000);
        Ok(())
    }

    #[test]
    fn missing_raw_image_is_reported() -> Result<()> {
        let json: ThermalExiftoolJson = serde_json::from_value(record(None))?;
        let err = ThermalImage::try_from(json).unwrap_err();
        assert!(err.to_string().contains("no raw thermal image"));
        Ok(())
    }

    #[test]
    fn rejects_unprefixed_raw_data() {
        let parsed =
            serde_json::from_value::<ThermalExiftoolJson>(record(Some(("TIFF", "AAAA"))));
        assert!(parsed.is_err());
    }

    #[test]
    fn rejects_unknown_raw_type() -> Result<()> {
        let json: ThermalExiftoolJson =
            serde_json::from_value(record(Some(("JPEG", "base64:AAAA"))))?;
        let err = json.raw.thermal_image().unwrap_err();
        assert_eq!(err.to_string(), "unsupported raw image type: JPEG");
        Ok(())
    }

    #[test]
    fn distance_override_recalibrates() -> Result<()> {
        let data = format!("base64:{}", RAW_TIFF_BASE64.trim());
        let json: ThermalExiftoolJson = serde_json::from_value(record(Some(("TIFF", data.as_str()))))?;
        let image = ThermalImage::try_from(json)?;

        let near = image.calibration()?;
        let far = image.with_distance(30.)?.calibration()?;
        assert!(far.atmosphere().tau < near.atmosphere().tau);
        Ok(())
    }
}
