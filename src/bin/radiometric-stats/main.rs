mod args;

use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use rayon::prelude::*;
use serde_derive::*;

use radiometric::{
    cli::{calibrate_paths_par, setup_logging, ThermalInput},
    export::write_temperature_csv,
    stats::Stats,
    DatasetBounds, ImageCalibration, PixelConverter,
};

use args::Args;

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;
    let _logger = setup_logging(&args.log_level)?;

    let Args {
        paths,
        distance,
        precision,
        csv,
        ..
    } = args;

    if let Some(dir) = &csv {
        std::fs::create_dir_all(dir)?;
    }

    let batch = calibrate_paths_par(paths, distance);
    let bounds = match batch.dataset.bounds() {
        Ok(bounds) => Some(*bounds),
        Err(e) => {
            warn!("no dataset bounds: {}", e);
            None
        }
    };

    let (image_stats, cumulative) = batch
        .inputs
        .par_iter()
        .zip(batch.dataset.images().par_iter())
        .map(|(input, cal)| ImageStats::from_input(input, cal, precision, csv.as_deref()))
        .try_fold(
            || (vec![], Stats::default()),
            |mut acc, try_img| -> Result<_> {
                let item = try_img?;
                acc.1 += &item.stats;
                acc.0.push(item);
                Ok(acc)
            },
        )
        .try_reduce(
            || (vec![], Stats::default()),
            |mut acc1, acc2| -> Result<_> {
                acc1.0.extend(acc2.0);
                acc1.1 += &acc2.1;
                Ok(acc1)
            },
        )?;

    info!("Processed {} images", image_stats.len());

    #[derive(Debug, Serialize)]
    struct OutputJson {
        image_stats: Vec<ImageStats>,
        cumulative: Stats,
        bounds: Option<DatasetBounds>,
        failures: Vec<String>,
    }

    serde_json::to_writer(
        std::io::stdout().lock(),
        &OutputJson {
            image_stats,
            cumulative,
            bounds,
            failures: batch.failures,
        },
    )?;

    Ok(())
}

#[derive(Serialize, Debug)]
pub struct ImageStats {
    path: String,
    width: usize,
    height: usize,
    t_min: f64,
    t_max: f64,
    out_of_domain: usize,
    stats: Stats,
}

impl ImageStats {
    pub fn from_input(
        input: &ThermalInput,
        cal: &ImageCalibration,
        precision: u32,
        csv: Option<&Path>,
    ) -> Result<Self> {
        let temps = PixelConverter::new(cal)
            .with_precision(precision)
            .temperatures(input.image.raw.view());
        let (ht, wid) = temps.values.dim();

        if temps.out_of_domain > 0 {
            warn!(
                "{}: {} pixels outside the Planck domain",
                input.filename, temps.out_of_domain
            );
        }
        if let Some(dir) = csv {
            write_temperature_csv(dir, &input.filename, &temps)?;
        }

        let mut stats = Stats::default();
        for &temp in temps.values.iter() {
            stats += temp;
        }
        Ok(ImageStats {
            path: input.filename.clone(),
            width: wid,
            height: ht,
            t_min: cal.t_min(),
            t_max: cal.t_max(),
            out_of_domain: temps.out_of_domain,
            stats,
        })
    }
}
