use fluxstage_reader::{SiteMetadata, SiteTable, VariableSpec, TIMESTAMP_COLUMN};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskWarning {
    /// Not a single row survived masking with every variable present.
    AllMasked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskDiagnostics {
    pub site: String,
    pub total_rows: usize,
    pub complete_rows: usize,
    pub percent_retained: f64,
    pub warning: Option<MaskWarning>,
}

/// Site observations with unreliable cells blanked and flag columns removed.
#[derive(Debug, Clone)]
pub struct MaskedTable {
    pub metadata: SiteMetadata,
    pub variables: Vec<VariableSpec>,
    pub frame: DataFrame,
}

impl MaskedTable {
    pub fn site(&self) -> &str {
        &self.metadata.site
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// Blanks every value whose flag is not exactly `reliable`; a missing flag blanks too.
pub fn mask_values(
    values: &[Option<f64>],
    flags: &[Option<f64>],
    reliable: f64,
) -> Vec<Option<f64>> {
    values
        .iter()
        .zip(flags)
        .map(|(value, flag)| match flag {
            Some(flag) if *flag == reliable => *value,
            _ => None,
        })
        .collect()
}

pub fn percent_retained(complete_rows: usize, total_rows: usize) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }
    let pct = complete_rows as f64 / total_rows as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Masks one site table and reports how much data is left.
pub fn mask_site(
    table: &SiteTable,
    reliable: f64,
) -> Result<(MaskedTable, MaskDiagnostics), PolarsError> {
    let total_rows = table.height();
    let mut columns: Vec<Column> = vec![table.frame.column(TIMESTAMP_COLUMN)?.clone()];
    let mut complete = vec![true; total_rows];

    for spec in &table.schema {
        let values = table.values(&spec.name)?;
        let flags = table.values(&spec.flag)?;
        let masked = mask_values(&values, &flags, reliable);
        for (keep, value) in complete.iter_mut().zip(&masked) {
            *keep &= value.is_some();
        }
        columns.push(Series::new(spec.name.as_str().into(), masked).into());
    }

    let complete_rows = complete.iter().filter(|keep| **keep).count();
    let percent = percent_retained(complete_rows, total_rows);
    let warning = (complete_rows == 0).then_some(MaskWarning::AllMasked);

    let diagnostics = MaskDiagnostics {
        site: table.site().to_string(),
        total_rows,
        complete_rows,
        percent_retained: percent,
        warning,
    };

    info!(
        site = table.site(),
        unfiltered = total_rows,
        reliable_rows = complete_rows,
        percent_retained = percent,
        "masked unreliable observations"
    );
    if warning.is_some() {
        warn!(site = table.site(), "no fully reliable rows remain after masking");
    }

    let masked = MaskedTable {
        metadata: table.metadata.clone(),
        variables: table.schema.clone(),
        frame: DataFrame::new(columns)?,
    };
    Ok((masked, diagnostics))
}

/// Per-variable breakdown of flag outcomes for quick inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSummary {
    pub site: String,
    pub variable: String,
    pub reliable: usize,
    pub unreliable: usize,
    pub missing_flag: usize,
    pub missing_value: usize,
}

pub fn flag_summary(
    table: &SiteTable,
    variable: &str,
    reliable: f64,
) -> Result<FlagSummary, PolarsError> {
    let spec = table.variable(variable).ok_or_else(|| {
        PolarsError::ColumnNotFound(format!("{variable} in site {}", table.site()).into())
    })?;
    let values = table.values(&spec.name)?;
    let flags = table.values(&spec.flag)?;

    let mut summary = FlagSummary {
        site: table.site().to_string(),
        variable: spec.name.clone(),
        reliable: 0,
        unreliable: 0,
        missing_flag: 0,
        missing_value: 0,
    };
    for (value, flag) in values.iter().zip(&flags) {
        match flag {
            Some(flag) if *flag == reliable => summary.reliable += 1,
            Some(_) => summary.unreliable += 1,
            None => summary.missing_flag += 1,
        }
        if value.is_none() {
            summary.missing_value += 1;
        }
    }
    Ok(summary)
}
