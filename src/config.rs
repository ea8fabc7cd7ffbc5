//! Analysis parameters and input discovery for one experiment directory.
use crate::error::{Error, Result};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const BBR_LOG_EXT: &str = "bbr";
const BACKLOG_LOG_EXT: &str = "buffer";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Window width in seconds.
    pub delta_t: f64,
    /// Capture taken before the bottleneck, relative to the experiment directory.
    pub ingress_capture: PathBuf,
    /// Capture taken behind the bottleneck.
    pub egress_capture: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            delta_t: 0.2,
            ingress_capture: PathBuf::from("s1.pcap"),
            egress_capture: PathBuf::from("s3.pcap"),
        }
    }
}

impl Config {
    /// Reads a JSON config file; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.delta_t.is_finite() && self.delta_t > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "delta_t must be a positive number of seconds, got {}",
                self.delta_t
            )));
        }
        Ok(())
    }
}

/// Every file one analysis run reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    pub ingress_capture: PathBuf,
    pub egress_capture: PathBuf,
    /// One BBR/cwnd log per sender host.
    pub bbr_logs: Vec<PathBuf>,
    /// Bottleneck queue logs.
    pub backlog_logs: Vec<PathBuf>,
}

impl Inputs {
    /// Resolves the captures and collects the logs lying directly in `dir`,
    /// sorted by file name.
    pub fn discover(dir: &Path, config: &Config) -> Result<Inputs> {
        let mut bbr_logs = Vec::new();
        let mut backlog_logs = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::from_io(dir, e))? {
            let path = entry.map_err(|e| Error::from_io(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            match path.extension().and_then(|e| e.to_str()) {
                Some(BBR_LOG_EXT) => bbr_logs.push(path),
                Some(BACKLOG_LOG_EXT) => backlog_logs.push(path),
                _ => {}
            }
        }
        bbr_logs.sort();
        backlog_logs.sort();
        debug!(
            "{}: {} bbr logs, {} backlog logs",
            dir.display(),
            bbr_logs.len(),
            backlog_logs.len()
        );

        Ok(Inputs {
            ingress_capture: dir.join(&config.ingress_capture),
            egress_capture: dir.join(&config.egress_capture),
            bbr_logs,
            backlog_logs,
        })
    }

    /// Fails with `MissingInput` for the first required file that is absent.
    pub fn verify(&self) -> Result<()> {
        let all = [&self.ingress_capture, &self.egress_capture]
            .into_iter()
            .chain(&self.bbr_logs)
            .chain(&self.backlog_logs);
        for path in all {
            if !path.is_file() {
                return Err(Error::MissingInput(path.clone()));
            }
        }
        Ok(())
    }
}
