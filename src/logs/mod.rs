//! Parsers for the per-host text logs written next to the captures.
//!
//! Every line is one sample. A malformed line costs that sample only: it is
//! logged and skipped, and the rest of the file is still read.
mod backlog;
mod bbr;
mod time;

pub use self::backlog::{parse_backlog_line, read_backlog_log, BacklogLog};
pub use self::bbr::{parse_bbr_line, read_bbr_log, BbrLine, BbrLog, BbrSample, CwndSample};
pub use self::time::{parse_clock, DayClock};

use crate::error::{Error, Result};
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Why a log line was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("bad timestamp {0:?}")]
    Timestamp(String),
    #[error("bad {field} value {value:?}")]
    Number { field: &'static str, value: String },
    #[error("missing {0}")]
    Missing(&'static str),
}

/// Line counters for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineStats {
    pub lines: u64,
    pub skipped: u64,
}

/// Feeds every non-empty line of `reader` to `f`. A failed line is counted as
/// skipped; `f` may still have kept the line's good samples.
pub(crate) fn read_lines<R, F>(name: &str, reader: R, mut f: F) -> std::io::Result<LineStats>
where
    R: BufRead,
    F: FnMut(&str) -> std::result::Result<(), LineError>,
{
    let mut stats = LineStats::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;
        if let Err(e) = f(&line) {
            warn!("{}:{}: {}, skipped", name, lineno + 1, e);
            stats.skipped += 1;
        }
    }
    Ok(stats)
}

pub(crate) fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::from_io(path, e))
}

/// Name of a log source: its file name without extension, e.g. the host IP.
pub(crate) fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// All auxiliary logs of one experiment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuxLogs {
    pub bbr: Vec<BbrLog>,
    pub backlog: Vec<BacklogLog>,
}

impl AuxLogs {
    pub fn load<P: AsRef<Path>>(bbr: &[P], backlog: &[P]) -> Result<AuxLogs> {
        let bbr = bbr
            .iter()
            .map(|p| read_bbr_log(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let backlog = backlog
            .iter()
            .map(|p| read_backlog_log(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "loaded {} bbr logs ({} samples), {} backlog logs",
            bbr.len(),
            bbr.iter().map(|l| l.bbr.len()).sum::<usize>(),
            backlog.len()
        );
        Ok(AuxLogs { bbr, backlog })
    }

    /// Earliest timestamp across every log.
    pub fn origin(&self) -> Option<f64> {
        let bbr = self.bbr.iter().flat_map(|l| {
            l.bbr
                .first()
                .map(|s| s.time)
                .into_iter()
                .chain(l.cwnd.first().map(|s| s.time))
        });
        let backlog = self.backlog.iter().filter_map(|l| l.samples.first().map(|p| p.time));
        bbr.chain(backlog).reduce(f64::min)
    }

    /// Shifts every timestamp so that `origin` becomes zero. All logs share
    /// one origin so samples of different hosts stay aligned.
    pub fn rebase(&mut self, origin: f64) {
        for log in &mut self.bbr {
            log.bbr.iter_mut().for_each(|s| s.time -= origin);
            log.cwnd.iter_mut().for_each(|s| s.time -= origin);
        }
        for log in &mut self.backlog {
            log.samples.iter_mut().for_each(|p| p.time -= origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_rebases_to_common_origin() {
        let dir = tempfile::tempdir().unwrap();
        let h1 = dir.path().join("10.1.0.1.bbr");
        let h2 = dir.path().join("10.1.0.2.bbr");
        let q = dir.path().join("s2-eth2-tbf.buffer");
        writeln!(
            File::create(&h1).unwrap(),
            "10:00:01.000000;bbr:(bw:10Mbps,mrtt:20,pacing_gain:1.25,cwnd_gain:2);cwnd:10;ssthresh:7"
        )
        .unwrap();
        writeln!(
            File::create(&h2).unwrap(),
            "10:00:00.500000;bbr:(bw:5Mbps,mrtt:40,pacing_gain:1,cwnd_gain:2);cwnd:20;ssthresh:7"
        )
        .unwrap();
        writeln!(File::create(&q).unwrap(), "10:00:00.750000 backlog 3Kb").unwrap();

        let mut logs = AuxLogs::load(&[h1, h2], &[q]).unwrap();
        assert_eq!(logs.bbr[0].name, "10.1.0.1");
        let origin = logs.origin().unwrap();
        assert!((origin - 36000.5).abs() < 1e-9);

        logs.rebase(origin);
        assert!((logs.bbr[0].bbr[0].time - 0.5).abs() < 1e-9);
        assert!(logs.bbr[1].bbr[0].time.abs() < 1e-9);
        assert!((logs.backlog[0].samples[0].time - 0.25).abs() < 1e-9);
        assert_eq!(logs.backlog[0].samples[0].value, 24_000.0);
    }

    #[test]
    fn missing_log_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = AuxLogs::load(&[dir.path().join("nope.bbr")], &[]).err().unwrap();
        assert!(matches!(err, Error::MissingInput(_)));
    }
}
