//! Jain's fairness index across connections, per window.
use crate::series::Point;
use std::collections::HashMap;

/// One connection's value for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowValue {
    pub window: u64,
    pub start: f64,
    pub value: f64,
}

/// `(Σx)² / (n·Σx²)`; `None` for an empty set or when every value is zero.
pub fn jain_index(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    let sum_sq: f64 = values.iter().map(|v| v * v).sum();
    if sum_sq == 0.0 {
        return None;
    }
    Some(sum * sum / (values.len() as f64 * sum_sq))
}

/// Computes the index for every window of the longest series, over the
/// connections holding a value for exactly that window.
pub fn fairness(series: &[Vec<WindowValue>]) -> Vec<Point> {
    // first of the longest wins
    let longest = match series.iter().reduce(|best, s| if s.len() > best.len() { s } else { best }) {
        Some(s) => s,
        None => return Vec::new(),
    };

    let lookup: Vec<HashMap<u64, f64>> = series
        .iter()
        .map(|s| s.iter().map(|v| (v.window, v.value)).collect())
        .collect();

    let mut values = Vec::with_capacity(series.len());
    longest
        .iter()
        .filter_map(|w| {
            values.clear();
            values.extend(lookup.iter().filter_map(|m| m.get(&w.window).copied()));
            jain_index(&values).map(|index| Point::new(w.start, index))
        })
        .collect()
}
