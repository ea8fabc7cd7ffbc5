//! Bottleneck queue backlog polled from the shaping qdisc.
//!
//! `10:00:00.120000 backlog 15Kb`: the third token is the queued size in
//! bytes with an optional K/M/G multiplier and a trailing `b`.
use crate::error::{Error, Result};
use crate::logs::{open, parse_clock, read_lines, source_name, DayClock, LineError, LineStats};
use crate::series::Point;
use serde::Serialize;
use std::io::BufRead;
use std::path::Path;

/// Queue occupancy over time, values in bits.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BacklogLog {
    pub name: String,
    pub samples: Vec<Point>,
    pub stats: LineStats,
}

/// Returns `(seconds since midnight, backlog in bits)`.
pub fn parse_backlog_line(line: &str) -> std::result::Result<(f64, f64), LineError> {
    let mut tokens = line.split_whitespace();
    let time = parse_clock(tokens.next().ok_or(LineError::Missing("timestamp"))?)?;
    let size = tokens.nth(1).ok_or(LineError::Missing("backlog size"))?;

    let digits = size.strip_suffix('b').unwrap_or(size);
    let (number, scale) = match digits.char_indices().last() {
        Some((i, 'K')) => (&digits[..i], 1e3),
        Some((i, 'M')) => (&digits[..i], 1e6),
        Some((i, 'G')) => (&digits[..i], 1e9),
        _ => (digits, 1.0),
    };
    let bytes: f64 = number.parse().map_err(|_| LineError::Number {
        field: "backlog",
        value: size.to_string(),
    })?;
    Ok((time, bytes * scale * 8.0))
}

pub fn parse_backlog_log<R: BufRead>(name: &str, reader: R) -> std::io::Result<BacklogLog> {
    let mut samples = Vec::new();
    let mut clock = DayClock::default();
    let stats = read_lines(name, reader, |line| {
        let (time, bits) = parse_backlog_line(line)?;
        samples.push(Point::new(clock.adjust(time), bits));
        Ok(())
    })?;
    Ok(BacklogLog {
        name: name.to_string(),
        samples,
        stats,
    })
}

pub fn read_backlog_log(path: &Path) -> Result<BacklogLog> {
    let reader = open(path)?;
    parse_backlog_log(&source_name(path), reader).map_err(|e| Error::from_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scales_units_to_bits() {
        let cases = [
            ("0:0:1.5 backlog 1514b", 1514.0 * 8.0),
            ("0:0:1.5 backlog 15Kb", 15e3 * 8.0),
            ("0:0:1.5 backlog 1.5Mb", 1.5e6 * 8.0),
            ("0:0:1.5 backlog 2Gb", 2e9 * 8.0),
            ("0:0:1.5 backlog 0b", 0.0),
        ];
        for (line, bits) in cases {
            let (time, parsed) = parse_backlog_line(line).unwrap();
            assert_eq!(time, 1.5);
            assert!((parsed - bits).abs() < 1e-6, "{}", line);
        }
    }

    #[test]
    fn skips_malformed_lines() {
        let text = "0:0:1 backlog 1Kb\n0:0:2 backlog\n0:0:3 backlog zzb\nnope x 1b\n0:0:4 backlog 2Kb\n";
        let log = parse_backlog_log("q", Cursor::new(text)).unwrap();
        assert_eq!(log.stats, LineStats { lines: 5, skipped: 3 });
        assert_eq!(log.samples, vec![Point::new(1.0, 8000.0), Point::new(4.0, 16000.0)]);
    }
}
