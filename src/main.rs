//! Command-line front end: analyze one experiment directory.
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use log::{error, info};
use tcpsync::{analyze, Config, Inputs};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[clap(name = "tcpsync")]
pub struct Opt {
    /// Experiment directory holding the captures and host logs.
    #[clap(default_value = ".", value_name = "DIR")]
    pub path: PathBuf,

    /// JSON file with analysis parameters.
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Capture taken before the bottleneck (default: s1.pcap).
    #[clap(short = '1', long = "pcap1", value_name = "FILE")]
    pub ingress_capture: Option<PathBuf>,

    /// Capture taken behind the bottleneck (default: s3.pcap).
    #[clap(short = '2', long = "pcap2", value_name = "FILE")]
    pub egress_capture: Option<PathBuf>,

    /// Window width in seconds (default: 0.2).
    #[clap(short = 't', long, value_name = "SECS")]
    pub delta_t: Option<f64>,

    /// Write the full dataset as JSON.
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Log level, support OFF/ERROR/WARN/INFO/DEBUG/TRACE.
    #[clap(long, default_value = "INFO")]
    pub log_level: log::LevelFilter,
}

impl Opt {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(path) = &self.ingress_capture {
            config.ingress_capture = path.clone();
        }
        if let Some(path) = &self.egress_capture {
            config.egress_capture = path.clone();
        }
        if let Some(delta_t) = self.delta_t {
            config.delta_t = delta_t;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(opt: &Opt) -> Result<()> {
    let config = opt.config()?;
    let inputs = Inputs::discover(&opt.path, &config)?;
    let dataset = analyze(&inputs, &config)?;
    info!("{}:\n{}", opt.path.display(), dataset);

    if let Some(path) = &opt.output {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &dataset)?;
        info!("dataset written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let opt = Opt::parse();

    // RUST_LOG overrides the command-line level
    env_logger::builder()
        .filter_level(opt.log_level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&opt) {
        error!("{}", e);
        std::process::exit(1);
    }
}
