//! Histogram binning with fixed, non-uniform edges.
//!
//! Bins are half-open `[edges[i], edges[i + 1])`, so a value sitting exactly on
//! an edge is counted in the upper bin. Labels are rendered in Russian for the
//! frontend and must stay byte-for-byte stable.

use serde::Serialize;

/// Open-time histogram edges, in days.
pub const OPEN_TIME_EDGES_DAYS: [f64; 7] = [0.0, 7.0, 14.0, 30.0, 60.0, 90.0, f64::INFINITY];

/// Lifetime (a.k.a. worklog) histogram edges, in hours.
pub const LIFETIME_EDGES_HOURS: [f64; 8] =
    [0.0, 1.0, 4.0, 8.0, 24.0, 168.0, 720.0, f64::INFINITY];

/// Per-status time histogram edges, in days.
pub const STATUS_TIME_EDGES_DAYS: [f64; 9] =
    [0.0, 1.0, 3.0, 7.0, 14.0, 30.0, 60.0, 90.0, f64::INFINITY];

const HOURS_PER_DAY: f64 = 24.0;

/// Unit the edges (and values) are expressed in. Drives label rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Days,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
}

/// Counts `values` into every bin defined by `edges`, zero-count bins included.
///
/// `edges` must be strictly increasing, start at `0` and end at infinity.
pub fn bucket(values: &[f64], edges: &[f64], unit: TimeUnit) -> Vec<Bucket> {
    debug_assert!(edges.windows(2).all(|pair| pair[0] < pair[1]));

    edges
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let count = values.iter().filter(|&&v| v >= start && v < end).count();
            Bucket {
                label: label(start, end, unit),
                count,
            }
        })
        .collect()
}

fn whole_days(hours: f64) -> i64 {
    (hours / HOURS_PER_DAY) as i64
}

fn label(start: f64, end: f64, unit: TimeUnit) -> String {
    match unit {
        TimeUnit::Hours => {
            if end.is_infinite() {
                format!("{}+ дней", whole_days(start))
            } else if start == 0.0 {
                if end <= HOURS_PER_DAY {
                    format!("<{end} часов")
                } else {
                    format!("<{} дней", whole_days(end))
                }
            } else if end <= HOURS_PER_DAY {
                format!("{start}-{end} часов")
            } else {
                format!("{}-{} дней", whole_days(start), whole_days(end))
            }
        }
        TimeUnit::Days => {
            if end.is_infinite() {
                format!("{start}+ дней")
            } else if start == 0.0 {
                if end == 1.0 {
                    "<1 дня".to_string()
                } else {
                    format!("<{end} дней")
                }
            } else {
                format!("{start}-{end} дней")
            }
        }
    }
}
