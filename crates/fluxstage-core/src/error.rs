// crates/fluxstage-core/src/error.rs

use fluxstage_reader::ReaderError;
use thiserror::Error;

use crate::snapshot::SnapshotError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no variables are shared by every site")]
    NoCommonVariables,

    #[error("corpus contains no sites")]
    EmptyCorpus,

    #[error("none of the {attempted} archives under {root} could be loaded")]
    NoSitesLoaded { root: String, attempted: usize },

    #[error("Archive read failed: {0}")]
    Reader(#[from] ReaderError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Archive discovery failed: {0}")]
    Pattern(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
