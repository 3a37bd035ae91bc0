use std::path::Path;

use crate::errors::ReaderError;
use crate::formats::common::site_label;
use crate::model::{ArchiveContents, SiteTable};
use crate::reader::build_site_table;

pub const DEFAULT_SITE_MARKER: &str = "Fluxnet";

/// A decoder for one on-disk archive layout.
pub trait ArchiveSource {
    fn name(&self) -> &'static str;
    fn open(&self, path: &Path) -> Result<ArchiveContents, ReaderError>;
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub site_marker: String,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            site_marker: DEFAULT_SITE_MARKER.to_string(),
        }
    }
}

/// Reads one archive into a site table.
pub fn read_site(
    source: &dyn ArchiveSource,
    path: &Path,
    options: &ReadOptions,
) -> Result<SiteTable, ReaderError> {
    let site = site_label(path, &options.site_marker)?;
    let contents = source.open(path)?;
    build_site_table(&site, &contents, &path.display().to_string())
}
