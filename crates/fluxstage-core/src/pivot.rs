use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use fluxstage_reader::model::timestamp_column;
use fluxstage_reader::{SiteMetadata, METADATA_FIELDS};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::masking::MaskedTable;

pub const SITE_COLUMN: &str = "site";
pub const DATE_COLUMN: &str = "Date";

/// A time-of-day bucket, stored as minutes past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot(u32);

impl TimeSlot {
    /// Buckets a wall-clock time, flooring to `granularity_minutes` when given.
    pub fn from_time(time: NaiveTime, granularity_minutes: Option<u32>) -> Self {
        let minute_of_day = time.hour() * 60 + time.minute();
        match granularity_minutes {
            Some(step) if step > 0 => Self(minute_of_day / step * step),
            _ => Self(minute_of_day),
        }
    }

    pub fn from_hm(hour: u32, minute: u32) -> Self {
        Self(hour * 60 + minute)
    }

    pub fn minute_of_day(&self) -> u32 {
        self.0
    }

    /// Compact `HHMM` form used in column names.
    pub fn label(&self) -> String {
        format!("{:02}{:02}", self.0 / 60, self.0 % 60)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

pub fn value_column_name(variable: &str, slot: TimeSlot) -> String {
    format!("{variable}_{}", slot.label())
}

/// Column names in staged order: variable-major, slots ascending.
pub fn value_column_names(variables: &[String], slots: &[TimeSlot]) -> Vec<String> {
    variables
        .iter()
        .flat_map(|var| slots.iter().map(move |slot| value_column_name(var, *slot)))
        .collect()
}

/// Leading key columns of every staged frame.
pub fn key_column_names() -> Vec<&'static str> {
    let mut names = vec![SITE_COLUMN];
    names.extend(METADATA_FIELDS);
    names.push(DATE_COLUMN);
    names
}

/// One site's observations reshaped to one row per calendar date.
#[derive(Debug, Clone)]
pub struct StagedMatrix {
    pub metadata: SiteMetadata,
    pub variables: Vec<String>,
    pub slots: Vec<TimeSlot>,
    pub frame: DataFrame,
}

impl StagedMatrix {
    pub fn value_columns(&self) -> Vec<String> {
        value_column_names(&self.variables, &self.slots)
    }
}

#[derive(Clone, Copy, Default)]
struct SlotAccumulator {
    sum: f64,
    count: u32,
    missing: u32,
}

impl SlotAccumulator {
    /// Null unless every observation in the slot survived masking.
    fn mean(&self) -> Option<f64> {
        (self.count > 0 && self.missing == 0).then(|| self.sum / f64::from(self.count))
    }
}

/// Pivots a masked table into a date by (variable, time-of-day) matrix.
///
/// A cell is null when it has no observation or when any observation in it was
/// masked. Several observations landing in one slot are averaged.
pub fn pivot_site(
    masked: &MaskedTable,
    granularity_minutes: Option<u32>,
) -> Result<StagedMatrix, PolarsError> {
    let keys: Vec<Option<(NaiveDate, TimeSlot)>> = timestamp_column(&masked.frame)?
        .into_iter()
        .map(|ts| ts.map(|ts| (ts.date(), TimeSlot::from_time(ts.time(), granularity_minutes))))
        .collect();

    let dates: Vec<NaiveDate> = keys
        .iter()
        .flatten()
        .map(|(date, _)| *date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let slots: Vec<TimeSlot> = keys
        .iter()
        .flatten()
        .map(|(_, slot)| *slot)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let date_index: HashMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(idx, date)| (*date, idx)).collect();
    let slot_index: HashMap<TimeSlot, usize> =
        slots.iter().enumerate().map(|(idx, slot)| (*slot, idx)).collect();

    let height = dates.len();
    let mut columns = key_columns(&masked.metadata, &dates)?;
    let variables: Vec<String> = masked.variables.iter().map(|spec| spec.name.clone()).collect();

    for variable in &variables {
        let values = masked.frame.column(variable)?.f64()?;
        let mut cells = vec![SlotAccumulator::default(); height * slots.len()];

        for (row, key) in keys.iter().enumerate() {
            let Some((date, slot)) = key else {
                continue;
            };
            let cell = &mut cells[slot_index[slot] * height + date_index[date]];
            match values.get(row) {
                Some(value) => {
                    cell.sum += value;
                    cell.count += 1;
                }
                None => cell.missing += 1,
            }
        }

        for (slot_pos, slot) in slots.iter().enumerate() {
            let column: Vec<Option<f64>> = cells[slot_pos * height..(slot_pos + 1) * height]
                .iter()
                .map(SlotAccumulator::mean)
                .collect();
            let name = value_column_name(variable, *slot);
            columns.push(Series::new(name.as_str().into(), column).into());
        }
    }

    debug!(
        site = masked.site(),
        dates = height,
        slots = slots.len(),
        variables = variables.len(),
        "pivoted site"
    );

    Ok(StagedMatrix {
        metadata: masked.metadata.clone(),
        variables,
        slots,
        frame: DataFrame::new(columns)?,
    })
}

fn key_columns(metadata: &SiteMetadata, dates: &[NaiveDate]) -> Result<Vec<Column>, PolarsError> {
    let height = dates.len();
    let mut columns: Vec<Column> = Vec::with_capacity(METADATA_FIELDS.len() + 2);
    columns.push(Series::new(SITE_COLUMN.into(), vec![metadata.site.as_str(); height]).into());
    for (name, value) in metadata.fields() {
        columns.push(Series::new(name.into(), vec![value; height]).into());
    }

    let epoch = DateTime::<Utc>::UNIX_EPOCH.date_naive();
    let days: Vec<i32> = dates
        .iter()
        .map(|date| date.signed_duration_since(epoch).num_days() as i32)
        .collect();
    columns.push(
        Series::new(DATE_COLUMN.into(), days)
            .cast(&DataType::Date)?
            .into(),
    );
    Ok(columns)
}
