pub mod errors;
pub mod formats;
pub mod model;
mod reader;
mod source;

pub use errors::ReaderError;
pub use formats::NetCdf3Source;
pub use model::{
    ArchiveContents, ArchiveVariable, Provenance, SiteMetadata, SiteTable, VariableSpec,
    METADATA_FIELDS, TIMESTAMP_COLUMN,
};
pub use reader::build_site_table;
pub use source::{read_site, ArchiveSource, ReadOptions, DEFAULT_SITE_MARKER};
