use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use fluxstage_reader::{read_site, ArchiveSource, Provenance, ReadOptions, ReaderError, SiteTable};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// An archive that could not be turned into a site table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub path: String,
    pub kind: String,
    pub message: String,
}

impl LoadFailure {
    fn from_error(path: &Path, err: &ReaderError) -> Self {
        Self {
            path: path.display().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawCorpus {
    pub sites: Vec<SiteTable>,
    pub failures: Vec<LoadFailure>,
}

impl RawCorpus {
    pub fn site_names(&self) -> Vec<&str> {
        self.sites.iter().map(SiteTable::site).collect()
    }
}

/// Recursively lists files under `root` ending in `.{extension}`, sorted by path.
pub fn discover_archives(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input directory {} does not exist", root.display()),
        )));
    }

    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        extension.trim_start_matches('.')
    );

    let mut paths = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "skipping unreadable path during discovery"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reads every discovered archive, isolating per-file failures.
///
/// Fails only when no archive at all produced a site table.
pub fn load_corpus(
    root: &Path,
    extension: &str,
    source: &dyn ArchiveSource,
    options: &ReadOptions,
) -> Result<RawCorpus> {
    let paths = discover_archives(root, extension)?;
    info!(
        root = %root.display(),
        archives = paths.len(),
        source = source.name(),
        "discovered archives"
    );

    let mut corpus = RawCorpus::default();
    let mut seen_sites = HashSet::new();

    for path in &paths {
        match load_archive(source, path, options) {
            Ok(table) => {
                if !seen_sites.insert(table.site().to_string()) {
                    warn!(
                        site = table.site(),
                        path = %path.display(),
                        "site label appears in more than one archive"
                    );
                }
                info!(
                    site = table.site(),
                    rows = table.height(),
                    variables = table.schema.len(),
                    "loaded site"
                );
                corpus.sites.push(table);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load archive");
                corpus.failures.push(LoadFailure::from_error(path, &err));
            }
        }
    }

    if corpus.sites.is_empty() {
        return Err(PipelineError::NoSitesLoaded {
            root: root.display().to_string(),
            attempted: paths.len(),
        });
    }

    info!(
        loaded = corpus.sites.len(),
        failed = corpus.failures.len(),
        "corpus load finished"
    );
    Ok(corpus)
}

pub fn load_corpus_with_config(
    config: &PipelineConfig,
    source: &dyn ArchiveSource,
) -> Result<RawCorpus> {
    load_corpus(
        &config.input_dir(),
        &config.archive_extension,
        source,
        &config.read_options(),
    )
}

fn load_archive(
    source: &dyn ArchiveSource,
    path: &Path,
    options: &ReadOptions,
) -> std::result::Result<SiteTable, ReaderError> {
    let file_hash = compute_hash(path).map_err(|err| ReaderError::Io {
        path: path.display().to_string(),
        source: err,
    })?;
    let mut table = read_site(source, path, options)?;
    table.provenance = Some(Provenance {
        path: path.display().to_string(),
        file_hash,
    });
    Ok(table)
}

/// Streams the file through BLAKE3 without holding it in memory.
fn compute_hash(path: &Path) -> std::io::Result<String> {
    let mut hasher = Hasher::new();
    hasher.update_reader(File::open(path)?)?;
    Ok(hasher.finalize().to_hex().to_string())
}
