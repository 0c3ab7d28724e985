use anyhow::{ensure, Result};
use clap::value_t_or_exit;
use radiometric::{arg, args_parser, opt, temperature::{DEFAULT_PRECISION, MAX_PRECISION}};
use std::path::PathBuf;

pub struct Args {
    pub paths: Vec<String>,
    pub distance: Option<f64>,
    pub precision: u32,
    pub csv: Option<PathBuf>,
    pub log_level: String,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("radiometric-stats")
            .about("Compute temperature stats of a batch of images.")
            .arg(
                opt!("distance")
                    .short("d")
                    .help("Object distance (m) overriding the image metadata"),
            )
            .arg(
                opt!("precision")
                    .short("p")
                    .help("Decimal places of temperatures, at most 15.  Default is 2"),
            )
            .arg(
                opt!("csv")
                    .short("c")
                    .help("Directory to write per-image temperature CSVs to"),
            )
            .arg(opt!("log level").help("Log level when RUST_LOG is unset.  Default is info"))
            .arg(
                arg!("paths")
                    .required(true)
                    .multiple(true)
                    .help("Json paths created using `exiftool -j -b`"),
            )
            .get_matches();

        let paths = matches
            .values_of("paths")
            .map(|v| v.map(|f| f.into()).collect())
            .unwrap_or_default();
        let distance = matches
            .is_present("distance")
            .then(|| value_t_or_exit!(matches.value_of("distance"), f64));
        let precision = matches
            .is_present("precision")
            .then(|| value_t_or_exit!(matches.value_of("precision"), u32))
            .unwrap_or(DEFAULT_PRECISION);
        ensure!(
            precision <= MAX_PRECISION,
            "precision must be at most {}, got {}",
            MAX_PRECISION,
            precision
        );
        let csv = matches.value_of("csv").map(PathBuf::from);
        let log_level = matches.value_of("log level").unwrap_or("info").into();

        Ok(Args {
            paths,
            distance,
            precision,
            csv,
            log_level,
        })
    }
}
