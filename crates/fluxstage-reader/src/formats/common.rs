use std::path::Path;

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::errors::ReaderError;

/// Grid coordinates plus the time axis; consumed for keys, never kept as values.
pub const EXCLUDED_VARIABLES: [&str; 3] = ["x", "y", TIME_AXIS];
pub const TIME_AXIS: &str = "time";
pub const FLAG_SUFFIX: &str = "_qc";

/// Returns the text before the first occurrence of `marker` that has a non-empty prefix.
pub(crate) fn site_label(path: &Path, marker: &str) -> Result<String, ReaderError> {
    let basename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    basename
        .match_indices(marker)
        .find(|(idx, _)| *idx > 0)
        .map(|(idx, _)| basename[..idx].to_string())
        .ok_or_else(|| ReaderError::SiteLabel {
            path: path.display().to_string(),
            marker: marker.to_string(),
        })
}

/// Parses the origin out of a CF-style `"<unit> since <timestamp>"` string.
pub(crate) fn parse_origin(units: &str) -> Option<NaiveDateTime> {
    static FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    let start = units.find(|c: char| c.is_ascii_digit())?;
    let trimmed = units[start..].trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Step between records in minutes.
///
/// Archives whose origin sits on the hour are hourly; otherwise the origin's minute
/// doubles as the step (half-hourly files start at hh:30).
pub(crate) fn timestep_minutes(origin: &NaiveDateTime) -> i64 {
    match origin.minute() {
        0 => 60,
        minute => i64::from(minute),
    }
}

pub(crate) fn timestream(origin: NaiveDateTime, periods: usize) -> Vec<NaiveDateTime> {
    let step = Duration::minutes(timestep_minutes(&origin));
    let mut current = origin;
    let mut stamps = Vec::with_capacity(periods);
    for _ in 0..periods {
        stamps.push(current);
        current += step;
    }
    stamps
}

pub(crate) fn flag_name(variable: &str) -> String {
    format!("{variable}{FLAG_SUFFIX}")
}

pub(crate) fn is_flag_name(name: &str) -> bool {
    name.len() > FLAG_SUFFIX.len() && name.ends_with(FLAG_SUFFIX)
}

/// Converts raw decoded numbers to optional values, treating NaN and declared fill values as gaps.
pub(crate) fn clean_values<I>(values: I, fill_values: &[f64]) -> Vec<Option<f64>>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .map(|value| {
            if value.is_nan() || fill_values.iter().any(|fill| *fill == value) {
                None
            } else {
                Some(value)
            }
        })
        .collect()
}
