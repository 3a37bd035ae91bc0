use std::fs;
use std::path::{Path, PathBuf};

use fluxstage_reader::ReadOptions;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::PipelineOptions;

pub const DEFAULT_INPUT_DIR: &str = "~/Work/Research_Work/Drought_Workshop/PALS_site_datasets/flux/";
pub const DEFAULT_CORPUS_FILE: &str = "fluxnet_raw_dataframes.zip";
pub const DEFAULT_DATASET_FILE: &str = "fluxnet_data.zip";
pub const DEFAULT_RELIABLE_FLAG: f64 = 1.0;
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "nc";

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Locations and knobs for a pipeline run.
///
/// Unset snapshot paths resolve to the default file names inside `input_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub corpus_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub reliable_flag_value: f64,
    pub time_of_day_granularity_minutes: Option<u32>,
    pub archive_extension: String,
    pub site_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            corpus_path: None,
            output_path: None,
            reliable_flag_value: DEFAULT_RELIABLE_FLAG,
            time_of_day_granularity_minutes: None,
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            site_marker: fluxstage_reader::DEFAULT_SITE_MARKER.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| PipelineError::Config(format!("failed to parse config TOML: {err}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn input_dir(&self) -> PathBuf {
        expand_home(&self.input_dir)
    }

    pub fn corpus_path(&self) -> PathBuf {
        match &self.corpus_path {
            Some(path) => expand_home(path),
            None => self.input_dir().join(DEFAULT_CORPUS_FILE),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output_path {
            Some(path) => expand_home(path),
            None => self.input_dir().join(DEFAULT_DATASET_FILE),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.reliable_flag_value.is_finite() {
            return Err(PipelineError::Config(format!(
                "reliable flag value must be finite, got {}",
                self.reliable_flag_value
            )));
        }
        if let Some(minutes) = self.time_of_day_granularity_minutes {
            if minutes == 0 || MINUTES_PER_DAY % minutes != 0 {
                return Err(PipelineError::Config(format!(
                    "time-of-day granularity must be a positive divisor of {MINUTES_PER_DAY} minutes, got {minutes}"
                )));
            }
        }
        if self.archive_extension.trim_start_matches('.').is_empty() {
            return Err(PipelineError::Config(
                "archive extension must not be empty".to_string(),
            ));
        }
        if self.site_marker.is_empty() {
            return Err(PipelineError::Config(
                "site marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            reliable_flag_value: self.reliable_flag_value,
            granularity_minutes: self.time_of_day_granularity_minutes,
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            site_marker: self.site_marker.clone(),
        }
    }
}

/// Expands a leading `~` against `HOME`; other paths pass through untouched.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
