use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{path}: time axis '{variable}' has unusable units {units:?}")]
    MissingMetadata {
        path: String,
        variable: String,
        units: Option<String>,
    },

    #[error("{path}: variable '{variable}' has {found} values, expected {expected} from the time axis")]
    ShapeMismatch {
        path: String,
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("{path}: archive has no '{variable}' variable")]
    MissingTimeAxis { path: String, variable: String },

    #[error("{path}: file name does not contain the site marker '{marker}'")]
    SiteLabel { path: String, marker: String },

    #[error("{source_name} could not decode {path}: {message}")]
    Decode {
        source_name: &'static str,
        path: String,
        message: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

impl ReaderError {
    /// Short machine-friendly tag for diagnostics and manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            ReaderError::MissingMetadata { .. } => "missing_metadata",
            ReaderError::ShapeMismatch { .. } => "shape_mismatch",
            ReaderError::MissingTimeAxis { .. } => "missing_time_axis",
            ReaderError::SiteLabel { .. } => "site_label",
            ReaderError::Decode { .. } => "decode",
            ReaderError::Io { .. } => "io",
            ReaderError::Polars(_) => "polars",
        }
    }
}
