use anyhow::Result;
use clap::value_t_or_exit;
use radiometric::{arg, args_parser, cli::Arg, opt};
use std::path::PathBuf;

pub struct Args {
    pub paths: Vec<String>,
    pub output: PathBuf,
    pub distance: Option<f64>,
    pub per_image: bool,
    pub log_level: String,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("radiometric-normalize")
            .about("Render a batch of images on one 16-bit intensity scale.")
            .arg(
                opt!("output")
                    .short("o")
                    .required(true)
                    .help("Directory to write the normalized TIFFs to"),
            )
            .arg(
                opt!("distance")
                    .short("d")
                    .help("Object distance (m) overriding the image metadata"),
            )
            .arg(
                Arg::with_name("per image")
                    .long("per-image")
                    .help("Scale each image by its own raw range instead of the dataset's"),
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
        let output = value_t_or_exit!(matches, "output", PathBuf);
        let distance = matches
            .is_present("distance")
            .then(|| value_t_or_exit!(matches.value_of("distance"), f64));
        let per_image = matches.is_present("per image");
        let log_level = matches.value_of("log level").unwrap_or("info").into();

        Ok(Args {
            paths,
            output,
            distance,
            per_image,
            log_level,
        })
    }
}
