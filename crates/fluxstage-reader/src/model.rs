use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Names of the scalar variables that describe where a site sits.
pub const METADATA_FIELDS: [&str; 4] = ["elevation", "latitude", "longitude", "reference_height"];

/// One physical variable and the flag column that qualifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub units: Option<String>,
    pub flag: String,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, units: Option<String>, flag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units,
            flag: flag.into(),
        }
    }
}

impl fmt::Display for VariableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.units {
            Some(units) => write!(f, "{} [{}] (flag {})", self.name, units, self.flag),
            None => write!(f, "{} (flag {})", self.name, self.flag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub site: String,
    pub elevation: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub reference_height: Option<f64>,
}

impl SiteMetadata {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            ..Self::default()
        }
    }

    pub(crate) fn set_field(&mut self, field: &str, value: Option<f64>) -> bool {
        let slot = match field {
            "elevation" => &mut self.elevation,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "reference_height" => &mut self.reference_height,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Metadata fields in the fixed key order used by staged outputs.
    pub fn fields(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("elevation", self.elevation),
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("reference_height", self.reference_height),
        ]
    }
}

/// Where a site table came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub path: String,
    pub file_hash: String,
}

/// A single site's time-indexed observations.
///
/// The frame holds a `timestamp` column followed by one value column and one flag
/// column per entry in `schema`.
#[derive(Debug, Clone)]
pub struct SiteTable {
    pub metadata: SiteMetadata,
    pub schema: Vec<VariableSpec>,
    pub frame: DataFrame,
    pub unpaired: Vec<String>,
    pub provenance: Option<Provenance>,
}

impl SiteTable {
    pub fn new(
        metadata: SiteMetadata,
        schema: Vec<VariableSpec>,
        frame: DataFrame,
    ) -> Result<Self, PolarsError> {
        frame.column(TIMESTAMP_COLUMN)?.datetime()?;
        for spec in &schema {
            frame.column(&spec.name)?.f64()?;
            frame.column(&spec.flag)?.f64()?;
        }
        Ok(Self {
            metadata,
            schema,
            frame,
            unpaired: Vec::new(),
            provenance: None,
        })
    }

    pub fn site(&self) -> &str {
        &self.metadata.site
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.schema.iter().map(|spec| spec.name.as_str())
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.schema.iter().find(|spec| spec.name == name)
    }

    pub fn values(&self, column: &str) -> Result<Vec<Option<f64>>, PolarsError> {
        Ok(self.frame.column(column)?.f64()?.into_iter().collect())
    }

    pub fn timestamps(&self) -> Result<Vec<Option<NaiveDateTime>>, PolarsError> {
        timestamp_column(&self.frame)
    }

    /// Restricts the table to the named variables, keeping their flags.
    pub fn project(&self, names: &[String]) -> Result<SiteTable, PolarsError> {
        let mut schema = Vec::with_capacity(names.len());
        let mut columns: Vec<Column> = vec![self.frame.column(TIMESTAMP_COLUMN)?.clone()];
        for name in names {
            let spec = self.variable(name).ok_or_else(|| {
                PolarsError::ColumnNotFound(format!("{name} in site {}", self.site()).into())
            })?;
            columns.push(self.frame.column(&spec.name)?.clone());
            columns.push(self.frame.column(&spec.flag)?.clone());
            schema.push(spec.clone());
        }
        Ok(SiteTable {
            metadata: self.metadata.clone(),
            schema,
            frame: DataFrame::new(columns)?,
            unpaired: self.unpaired.clone(),
            provenance: self.provenance.clone(),
        })
    }
}

pub fn timestamp_column(frame: &DataFrame) -> Result<Vec<Option<NaiveDateTime>>, PolarsError> {
    let timestamps = frame.column(TIMESTAMP_COLUMN)?.datetime()?;
    Ok((0..frame.height())
        .map(|idx| {
            timestamps
                .get(idx)
                .and_then(DateTime::<Utc>::from_timestamp_micros)
                .map(|dt| dt.naive_utc())
        })
        .collect())
}

pub fn timestamp_series(name: &str, timestamps: &[NaiveDateTime]) -> Result<Series, PolarsError> {
    let micros: Vec<i64> = timestamps
        .iter()
        .map(|ts| ts.and_utc().timestamp_micros())
        .collect();
    Series::new(name.into(), micros).cast(&DataType::Datetime(TimeUnit::Microseconds, None))
}

/// A decoded archive, independent of the on-disk format.
#[derive(Debug, Clone, Default)]
pub struct ArchiveContents {
    pub variables: Vec<ArchiveVariable>,
}

impl ArchiveContents {
    pub fn variable(&self, name: &str) -> Option<&ArchiveVariable> {
        self.variables.iter().find(|var| var.name == name)
    }
}

/// A variable with its values flattened; degenerate axes are implied by `dims`.
#[derive(Debug, Clone, Default)]
pub struct ArchiveVariable {
    pub name: String,
    pub dims: Vec<String>,
    pub units: Option<String>,
    pub values: Vec<Option<f64>>,
}

impl ArchiveVariable {
    pub fn new(
        name: impl Into<String>,
        dims: &[&str],
        units: Option<&str>,
        values: Vec<Option<f64>>,
    ) -> Self {
        Self {
            name: name.into(),
            dims: dims.iter().map(|dim| dim.to_string()).collect(),
            units: units.map(str::to_string),
            values,
        }
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|name| name == dim)
    }
}
