mod args;

use anyhow::Result;
use log::{info, warn};
use rayon::prelude::*;

use radiometric::{
    cli::{calibrate_paths_par, setup_logging},
    export::write_normalized_tiff,
    DatasetBounds,
};

use crate::args::Args;

fn main() -> Result<()> {
    let args = Args::from_cmd_line()?;
    let _logger = setup_logging(&args.log_level)?;
    let Args {
        paths,
        output,
        distance,
        per_image,
        ..
    } = args;

    std::fs::create_dir_all(&output)?;

    let batch = calibrate_paths_par(paths, distance);
    let dataset_bounds = if per_image {
        None
    } else {
        let bounds = *batch.dataset.bounds()?;
        if let Err(e) = bounds.checked_range() {
            warn!("{}; every pixel maps to 0", e);
        }
        info!(
            "Dataset bounds: S_min = {}, S_max = {}",
            bounds.s_min(),
            bounds.s_max()
        );
        Some(bounds)
    };

    let count = batch
        .inputs
        .par_iter()
        .zip(batch.dataset.images().par_iter())
        .map(|(input, cal)| -> Result<()> {
            let bounds = dataset_bounds.unwrap_or_else(|| DatasetBounds::for_image(cal));
            let out = write_normalized_tiff(
                &output,
                &input.filename,
                input.image.raw.view(),
                cal,
                &bounds,
            )?;
            if out.degenerate {
                warn!("{}: degenerate scale range, written as 0", input.filename);
            }
            if out.out_of_domain > 0 {
                warn!(
                    "{}: {} pixels outside the Planck domain",
                    input.filename, out.out_of_domain
                );
            }
            info!("{} -> {}", input.filename, out.path.display());
            Ok(())
        })
        .try_fold(
            || 0usize,
            |acc, res| -> Result<_> {
                res?;
                Ok(acc + 1)
            },
        )
        .try_reduce(|| 0, |a, b| Ok(a + b))?;

    info!("Processed {} images", count);
    for failure in &batch.failures {
        warn!("skipped: {}", failure);
    }
    Ok(())
}
