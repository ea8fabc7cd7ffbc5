use crate::logs::LineError;

const DAY: f64 = 24.0 * 3600.0;

/// Parses a wall-clock `H:M:S[.frac]` into seconds since midnight.
pub fn parse_clock(s: &str) -> Result<f64, LineError> {
    let bad = || LineError::Timestamp(s.to_string());
    let mut parts = s.trim().split(':');
    let (h, m, sec) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(sec), None) => (h, m, sec),
        _ => return Err(bad()),
    };
    let h: f64 = h.parse().map_err(|_| bad())?;
    let m: f64 = m.parse().map_err(|_| bad())?;
    let sec: f64 = sec.parse().map_err(|_| bad())?;
    if !(h.is_finite() && m.is_finite() && sec.is_finite()) {
        return Err(bad());
    }
    Ok(h * 3600.0 + m * 60.0 + sec)
}

/// Keeps one file's timestamps increasing across midnight.
#[derive(Debug, Default)]
pub struct DayClock {
    last: Option<f64>,
    offset: f64,
}

impl DayClock {
    /// A jump back of more than half a day is taken as a midnight rollover.
    pub fn adjust(&mut self, seconds: f64) -> f64 {
        if let Some(last) = self.last {
            if seconds + self.offset < last - DAY / 2.0 {
                self.offset += DAY;
            }
        }
        let t = seconds + self.offset;
        self.last = Some(t);
        t
    }
}
