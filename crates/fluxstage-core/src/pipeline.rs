use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alignment::align_corpus;
use crate::config::{PipelineConfig, DEFAULT_RELIABLE_FLAG};
use crate::error::{PipelineError, Result};
use crate::loader::{LoadFailure, RawCorpus};
use crate::masking::{mask_site, MaskDiagnostics};
use crate::pivot::{key_column_names, pivot_site, value_column_names, StagedMatrix, TimeSlot};
use crate::snapshot::{self, DatasetManifest};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub reliable_flag_value: f64,
    pub granularity_minutes: Option<u32>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            reliable_flag_value: DEFAULT_RELIABLE_FLAG,
            granularity_minutes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub sites: Vec<MaskDiagnostics>,
    pub common_variables: Vec<String>,
    pub slots: Vec<TimeSlot>,
    /// Sites missing some time-of-day slots; their absent cells were filled with nulls.
    pub padded_sites: Vec<String>,
    pub load_failures: Vec<LoadFailure>,
    pub rows_before_cleanup: usize,
    pub row_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub dataset: DataFrame,
    pub summary: PipelineSummary,
}

/// Aligns, masks and pivots every site, then stacks them and drops incomplete rows.
pub fn run_pipeline(corpus: &RawCorpus, options: &PipelineOptions) -> Result<PipelineOutput> {
    if corpus.sites.is_empty() {
        return Err(PipelineError::EmptyCorpus);
    }

    let aligned = align_corpus(&corpus.sites)?;

    let mut staged = Vec::with_capacity(aligned.sites.len());
    let mut diagnostics = Vec::with_capacity(aligned.sites.len());
    for site in &aligned.sites {
        let (masked, report) = mask_site(site, options.reliable_flag_value)?;
        staged.push(pivot_site(&masked, options.granularity_minutes)?);
        diagnostics.push(report);
    }

    let stacked = concatenate(&staged, &aligned.variables)?;
    let rows_before_cleanup = stacked.frame.height();
    let value_columns = value_column_names(&aligned.variables, &stacked.slots);
    let dataset = drop_incomplete_rows(&stacked.frame, &value_columns)?;

    info!(
        sites = staged.len(),
        rows_before_cleanup,
        rows = dataset.height(),
        columns = dataset.width(),
        "staged final dataset"
    );

    let summary = PipelineSummary {
        sites: diagnostics,
        common_variables: aligned.variables,
        slots: stacked.slots,
        padded_sites: stacked.padded_sites,
        load_failures: corpus.failures.clone(),
        rows_before_cleanup,
        row_count: dataset.height(),
        column_count: dataset.width(),
    };

    Ok(PipelineOutput { dataset, summary })
}

/// Runs the pipeline and writes the final dataset snapshot to the configured location.
pub fn run_and_persist(
    corpus: &RawCorpus,
    config: &PipelineConfig,
) -> Result<(PipelineOutput, DatasetManifest)> {
    config.validate()?;
    let output = run_pipeline(corpus, &config.pipeline_options())?;
    let path = config.output_path();
    let manifest = snapshot::write_dataset(&path, &output.dataset, &output.summary, config)?;
    info!(path = %path.display(), run_id = %manifest.run_id, "wrote final dataset snapshot");
    Ok((output, manifest))
}

#[derive(Debug, Clone)]
pub struct StackedMatrices {
    pub frame: DataFrame,
    pub slots: Vec<TimeSlot>,
    pub padded_sites: Vec<String>,
}

/// Stacks staged matrices under one shared column layout.
pub fn concatenate(staged: &[StagedMatrix], variables: &[String]) -> Result<StackedMatrices> {
    let slots: Vec<TimeSlot> = staged
        .iter()
        .flat_map(|matrix| matrix.slots.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let value_columns = value_column_names(variables, &slots);

    let mut combined: Option<DataFrame> = None;
    let mut padded_sites = Vec::new();

    for matrix in staged {
        let height = matrix.frame.height();
        if matrix.slots != slots {
            warn!(
                site = %matrix.metadata.site,
                slots = matrix.slots.len(),
                expected = slots.len(),
                "site lacks some time-of-day slots; filling with nulls"
            );
            padded_sites.push(matrix.metadata.site.clone());
        }

        let mut columns: Vec<Column> = Vec::with_capacity(value_columns.len() + 6);
        for name in key_column_names() {
            columns.push(matrix.frame.column(name)?.clone());
        }
        for name in &value_columns {
            let column = match matrix.frame.column(name) {
                Ok(column) => column.clone(),
                Err(_) => {
                    Series::full_null(name.as_str().into(), height, &DataType::Float64).into()
                }
            };
            columns.push(column);
        }
        let frame = DataFrame::new(columns)?;

        match combined.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&frame)?;
            }
            None => combined = Some(frame),
        }
    }

    Ok(StackedMatrices {
        frame: combined.unwrap_or_default(),
        slots,
        padded_sites,
    })
}

/// Keeps rows where every listed value column is present.
pub fn drop_incomplete_rows(
    frame: &DataFrame,
    value_columns: &[String],
) -> std::result::Result<DataFrame, PolarsError> {
    let mut keep = BooleanChunked::full("keep".into(), true, frame.height());
    for name in value_columns {
        let present = frame.column(name)?.as_materialized_series().is_not_null();
        keep = &keep & &present;
    }
    frame.filter(&keep)
}
