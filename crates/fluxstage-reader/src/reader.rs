use std::collections::HashMap;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::errors::ReaderError;
use crate::formats::common::{
    flag_name, is_flag_name, parse_origin, timestream, EXCLUDED_VARIABLES, FLAG_SUFFIX, TIME_AXIS,
};
use crate::model::{
    timestamp_series, ArchiveContents, ArchiveVariable, SiteMetadata, SiteTable, VariableSpec,
    TIMESTAMP_COLUMN,
};

/// Builds a site table from decoded archive contents.
///
/// `path` only labels errors and log lines.
pub fn build_site_table(
    site: &str,
    contents: &ArchiveContents,
    path: &str,
) -> Result<SiteTable, ReaderError> {
    let time = contents
        .variable(TIME_AXIS)
        .ok_or_else(|| ReaderError::MissingTimeAxis {
            path: path.to_string(),
            variable: TIME_AXIS.to_string(),
        })?;

    let origin = time
        .units
        .as_deref()
        .and_then(parse_origin)
        .ok_or_else(|| ReaderError::MissingMetadata {
            path: path.to_string(),
            variable: TIME_AXIS.to_string(),
            units: time.units.clone(),
        })?;

    let row_count = time.values.len();
    let timestamps = timestream(origin, row_count);

    let mut metadata = SiteMetadata::new(site);
    let mut series: Vec<&ArchiveVariable> = Vec::new();

    for var in &contents.variables {
        if EXCLUDED_VARIABLES.contains(&var.name.as_str()) {
            continue;
        }

        if !var.has_dim(TIME_AXIS) && var.values.len() == 1 {
            if !metadata.set_field(&var.name, var.values[0]) {
                debug!(site, variable = %var.name, "ignoring scalar variable");
            }
            continue;
        }

        if var.values.len() != row_count {
            return Err(ReaderError::ShapeMismatch {
                path: path.to_string(),
                variable: var.name.clone(),
                expected: row_count,
                found: var.values.len(),
            });
        }
        series.push(var);
    }

    let by_name: HashMap<&str, &ArchiveVariable> =
        series.iter().map(|var| (var.name.as_str(), *var)).collect();

    let mut schema = Vec::new();
    let mut unpaired = Vec::new();
    let mut columns: Vec<Column> = vec![timestamp_series(TIMESTAMP_COLUMN, &timestamps)?.into()];

    for var in series.iter().filter(|var| !is_flag_name(&var.name)) {
        let flag = flag_name(&var.name);
        let Some(flag_var) = by_name.get(flag.as_str()) else {
            warn!(site, variable = %var.name, "variable has no quality flag; dropping");
            unpaired.push(var.name.clone());
            continue;
        };
        columns.push(Series::new(var.name.as_str().into(), var.values.clone()).into());
        columns.push(Series::new(flag.as_str().into(), flag_var.values.clone()).into());
        schema.push(VariableSpec::new(var.name.clone(), var.units.clone(), flag));
    }

    for var in series.iter().filter(|var| is_flag_name(&var.name)) {
        let base = &var.name[..var.name.len() - FLAG_SUFFIX.len()];
        if !by_name.contains_key(base) {
            warn!(site, flag = %var.name, "quality flag has no variable; dropping");
            unpaired.push(var.name.clone());
        }
    }

    let frame = DataFrame::new(columns)?;
    let mut table = SiteTable::new(metadata, schema, frame)?;
    table.unpaired = unpaired;

    debug!(
        site,
        rows = table.height(),
        variables = table.schema.len(),
        origin = %origin,
        "built site table"
    );
    Ok(table)
}
