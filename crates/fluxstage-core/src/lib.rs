pub mod alignment;
pub mod config;
pub mod error;
pub mod loader;
pub mod masking;
pub mod pipeline;
pub mod pivot;
pub mod snapshot;

pub use error::{PipelineError, Result};
