//! Congestion-window / BBR state samples polled from a sender host.
//!
//! One line per poll, `;` separated:
//!
//! ```text
//! 10:00:00.120000 bbr:(bw:9.8Mbps,mrtt:20.1,pacing_gain:1.25,cwnd_gain:2); cwnd:42; ssthresh:30
//! 10:00:00.160000;bbr:(bw:9.8Mbps,mrtt:20.1,pacing_gain:1,cwnd_gain:2);cwnd:42;ssthresh:30
//! 10:00:00.200000;;cwnd:17;ssthresh:12
//! ```
//!
//! Fields are recognised by their label, or by position when unlabelled.
use crate::error::{Error, Result};
use crate::logs::{open, parse_clock, read_lines, source_name, DayClock, LineError, LineStats};
use serde::Serialize;
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BbrSample {
    pub time: f64,
    /// Bottleneck bandwidth estimate, bits per second.
    pub bandwidth: f64,
    /// Minimum RTT estimate, milliseconds.
    pub min_rtt: f64,
    pub pacing_gain: f64,
    pub cwnd_gain: f64,
    /// Bandwidth-delay product, bits.
    pub bdp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CwndSample {
    pub time: f64,
    pub cwnd: u64,
    pub ssthresh: u64,
}

/// The samples carried by one line. A bad field spoils only the sample it
/// belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct BbrLine {
    pub time: f64,
    pub bbr: Option<std::result::Result<BbrSample, LineError>>,
    pub cwnd: Option<std::result::Result<CwndSample, LineError>>,
}

/// Samples of one sender host.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BbrLog {
    pub name: String,
    pub bbr: Vec<BbrSample>,
    pub cwnd: Vec<CwndSample>,
    pub stats: LineStats,
}

enum Field {
    Bbr,
    Cwnd,
    Ssthresh,
}

pub fn parse_bbr_line(line: &str) -> std::result::Result<BbrLine, LineError> {
    let mut fields: Vec<&str> = line.split(';').map(str::trim).collect();
    // "<time> bbr:(...)" carries the first field after the timestamp
    if let Some((time, rest)) = fields[0].split_once(char::is_whitespace) {
        fields[0] = time;
        fields.insert(1, rest.trim());
    }

    let time = parse_clock(fields[0])?;
    let mut bbr = None;
    let mut cwnd = None;
    let mut ssthresh = None;

    for (pos, field) in fields.iter().enumerate().skip(1) {
        let (kind, value) = if let Some(v) = field.strip_prefix("bbr:") {
            (Field::Bbr, v)
        } else if let Some(v) = field.strip_prefix("cwnd:") {
            (Field::Cwnd, v)
        } else if let Some(v) = field.strip_prefix("ssthresh:") {
            (Field::Ssthresh, v)
        } else {
            match pos {
                1 => (Field::Bbr, *field),
                2 => (Field::Cwnd, *field),
                3 => (Field::Ssthresh, *field),
                _ => continue,
            }
        };
        let value = value.trim();
        match kind {
            Field::Bbr if !value.is_empty() => bbr = Some(parse_bbr(time, value)),
            Field::Bbr => {}
            Field::Cwnd => cwnd = Some(parse_count("cwnd", value)),
            Field::Ssthresh => ssthresh = Some(parse_count("ssthresh", value)),
        }
    }

    let has_cwnd = cwnd.is_some() || ssthresh.is_some() || fields.len() >= 4;
    let cwnd = has_cwnd.then(|| -> std::result::Result<CwndSample, LineError> {
        Ok(CwndSample {
            time,
            cwnd: cwnd.transpose()?.unwrap_or(0),
            ssthresh: ssthresh.transpose()?.unwrap_or(0),
        })
    });
    Ok(BbrLine { time, bbr, cwnd })
}

// "(bw:9.8Mbps,mrtt:20.1,pacing_gain:1.25,cwnd_gain:2)"
fn parse_bbr(time: f64, block: &str) -> std::result::Result<BbrSample, LineError> {
    let block = block.trim_start_matches('(').trim_end_matches(')');
    let parts: Vec<&str> = block
        .split(',')
        .map(|p| {
            let p = p.trim();
            p.split_once(':').map_or(p, |(_, v)| v.trim())
        })
        .collect();

    let bandwidth = parse_bandwidth(parts[0]);
    let min_rtt = match parts.get(1) {
        Some(v) if !v.is_empty() => parse_float("mrtt", v)?,
        _ => return Err(LineError::Missing("mrtt")),
    };
    let (pacing_gain, cwnd_gain) = if parts.len() < 4 {
        (0.0, 0.0)
    } else {
        (
            parse_gain("pacing_gain", parts[2])?,
            parse_gain("cwnd_gain", parts[3])?,
        )
    };

    Ok(BbrSample {
        time,
        bandwidth,
        min_rtt,
        pacing_gain,
        cwnd_gain,
        bdp: bandwidth * min_rtt / 1000.0,
    })
}

/// `<v>{bps,Kbps,Mbps,Gbps}` in bits per second; anything else reads as 0.
fn parse_bandwidth(s: &str) -> f64 {
    const UNITS: [(&str, f64); 4] = [("Gbps", 1e9), ("Mbps", 1e6), ("Kbps", 1e3), ("bps", 1.0)];
    UNITS
        .iter()
        .find_map(|(unit, scale)| {
            s.strip_suffix(unit)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|v| v * scale)
        })
        .unwrap_or(0.0)
}

fn parse_float(field: &'static str, s: &str) -> std::result::Result<f64, LineError> {
    s.trim().parse().map_err(|_| LineError::Number {
        field,
        value: s.to_string(),
    })
}

// an empty gain reads as 0
fn parse_gain(field: &'static str, s: &str) -> std::result::Result<f64, LineError> {
    if s.is_empty() {
        return Ok(0.0);
    }
    parse_float(field, s)
}

fn parse_count(field: &'static str, s: &str) -> std::result::Result<u64, LineError> {
    if s.is_empty() {
        return Ok(0);
    }
    s.parse().map_err(|_| LineError::Number {
        field,
        value: s.to_string(),
    })
}

/// Reads one host's log from any buffered reader.
pub fn parse_bbr_log<R: BufRead>(name: &str, reader: R) -> std::io::Result<BbrLog> {
    let mut log = BbrLog {
        name: name.to_string(),
        ..Default::default()
    };
    let mut clock = DayClock::default();
    let (bbr, cwnd) = (&mut log.bbr, &mut log.cwnd);
    log.stats = read_lines(name, reader, |line| {
        let parsed = parse_bbr_line(line)?;
        let time = clock.adjust(parsed.time);
        let mut first_err = None;
        match parsed.bbr {
            Some(Ok(mut s)) => {
                s.time = time;
                bbr.push(s);
            }
            Some(Err(e)) => first_err = Some(e),
            None => {}
        }
        match parsed.cwnd {
            Some(Ok(mut s)) => {
                s.time = time;
                cwnd.push(s);
            }
            Some(Err(e)) => first_err = first_err.or(Some(e)),
            None => {}
        }
        first_err.map_or(Ok(()), Err)
    })?;
    Ok(log)
}

pub fn read_bbr_log(path: &Path) -> Result<BbrLog> {
    let reader = open(path)?;
    parse_bbr_log(&source_name(path), reader).map_err(|e| Error::from_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_space_separated_timestamp() {
        let line = parse_bbr_line(
            "10:00:00.500000 bbr:(bw:9.5Mbps,mrtt:20.5,pacing_gain:1.25,cwnd_gain:2); cwnd:42; ssthresh:30",
        )
        .unwrap();
        assert!((line.time - 36000.5).abs() < 1e-9);
        let bbr = line.bbr.unwrap().unwrap();
        assert_eq!(bbr.bandwidth, 9.5e6);
        assert_eq!(bbr.min_rtt, 20.5);
        assert_eq!(bbr.pacing_gain, 1.25);
        assert_eq!(bbr.cwnd_gain, 2.0);
        assert!((bbr.bdp - 194_750.0).abs() < 1e-6);
        let cwnd = line.cwnd.unwrap().unwrap();
        assert_eq!((cwnd.cwnd, cwnd.ssthresh), (42, 30));
    }

    #[test]
    fn parses_semicolon_separated_timestamp() {
        let line = parse_bbr_line("0:0:1.0;bbr:(bw:800Kbps,mrtt:10);cwnd:;ssthresh:").unwrap();
        let bbr = line.bbr.unwrap().unwrap();
        assert_eq!(bbr.bandwidth, 800_000.0);
        assert_eq!((bbr.pacing_gain, bbr.cwnd_gain), (0.0, 0.0));
        let cwnd = line.cwnd.unwrap().unwrap();
        assert_eq!((cwnd.cwnd, cwnd.ssthresh), (0, 0));
    }

    #[test]
    fn non_bbr_host_only_has_cwnd() {
        let line = parse_bbr_line("0:0:1.0;;cwnd:10;ssthresh:7").unwrap();
        assert!(line.bbr.is_none());
        assert_eq!(line.cwnd.unwrap().unwrap().cwnd, 10);

        let line = parse_bbr_line("0:0:1.0;bbr:(bw:1bps,mrtt:1)").unwrap();
        assert!(line.cwnd.is_none());
    }

    #[test]
    fn empty_bandwidth_reads_as_zero() {
        let line = parse_bbr_line("0:0:1.0;bbr:(bw:,mrtt:12.5,pacing_gain:1,cwnd_gain:1);cwnd:5;ssthresh:2")
            .unwrap();
        let bbr = line.bbr.unwrap().unwrap();
        assert_eq!(bbr.bandwidth, 0.0);
        assert_eq!(bbr.min_rtt, 12.5);
        assert_eq!(bbr.bdp, 0.0);
    }

    #[test]
    fn empty_gains_read_as_zero() {
        let line =
            parse_bbr_line("0:0:1.0;bbr:(bw:1Mbps,mrtt:10,pacing_gain:,cwnd_gain:);cwnd:10;ssthresh:5")
                .unwrap();
        let bbr = line.bbr.unwrap().unwrap();
        assert_eq!((bbr.pacing_gain, bbr.cwnd_gain), (0.0, 0.0));
        assert_eq!(bbr.bandwidth, 1e6);
        let cwnd = line.cwnd.unwrap().unwrap();
        assert_eq!((cwnd.cwnd, cwnd.ssthresh), (10, 5));
    }

    #[test]
    fn bad_bbr_block_keeps_cwnd_sample() {
        let line = parse_bbr_line("0:0:1.0;bbr:(bw:1Mbps,mrtt:x,pacing_gain:1,cwnd_gain:2);cwnd:10;ssthresh:5")
            .unwrap();
        assert!(matches!(
            line.bbr,
            Some(Err(LineError::Number { field: "mrtt", .. }))
        ));
        assert_eq!(line.cwnd.unwrap().unwrap().cwnd, 10);

        let line = parse_bbr_line("0:0:1.0;bbr:(bw:1Mbps,mrtt:10,pacing_gain:1,cwnd_gain:2);cwnd:ten;ssthresh:5")
            .unwrap();
        assert!(matches!(line.bbr, Some(Ok(_))));
        assert!(matches!(
            line.cwnd,
            Some(Err(LineError::Number { field: "cwnd", .. }))
        ));
    }

    #[test]
    fn unknown_unit_reads_as_zero() {
        assert_eq!(parse_bandwidth("12Tbit"), 0.0);
        assert_eq!(parse_bandwidth("1.5Gbps"), 1.5e9);
        assert_eq!(parse_bandwidth("300bps"), 300.0);
    }

    #[test]
    fn malformed_lines_do_not_stop_the_file() {
        let text = "\
10:00:00.0;bbr:(bw:1Mbps,mrtt:10,pacing_gain:1,cwnd_gain:2);cwnd:10;ssthresh:5
garbage
10:00:00.1;bbr:(bw:1Mbps);cwnd:10;ssthresh:5
10:00:00.2;bbr:(bw:1Mbps,mrtt:10,pacing_gain:x,cwnd_gain:2);cwnd:10;ssthresh:5

10:00:00.3;bbr:(bw:,mrtt:11,pacing_gain:1,cwnd_gain:1);cwnd:11;ssthresh:5
";
        let log = parse_bbr_log("h1", Cursor::new(text)).unwrap();
        assert_eq!(log.stats, LineStats { lines: 5, skipped: 3 });
        assert_eq!(log.bbr.len(), 2);
        assert_eq!(log.bbr[1].bandwidth, 0.0);
        assert_eq!(log.bbr[1].min_rtt, 11.0);
        // the two lines with a bad BBR block still carry their cwnd
        assert_eq!(log.cwnd.len(), 4);
        assert!((log.cwnd[1].time - 36000.1).abs() < 1e-6);
    }
}
