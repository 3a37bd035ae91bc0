use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use fluxstage_reader::{Provenance, SiteMetadata, SiteTable, VariableSpec};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use ::zip::write::FileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::PipelineConfig;
use crate::loader::{LoadFailure, RawCorpus};
use crate::pipeline::PipelineSummary;

/// Bumped whenever the manifest layout or the stored table layout changes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const MANIFEST_PATH: &str = "manifest.json";
const DATASET_PATH: &str = "dataset.parquet";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("JSON operation failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ZIP operation failed: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Manifest is missing or corrupt")]
    MissingManifest,
    #[error("Data file '{0}' is missing from snapshot")]
    MissingDataFile(String),
    #[error("snapshot format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("expected a {expected:?} snapshot but found {found:?}")]
    WrongKind {
        expected: SnapshotKind,
        found: SnapshotKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    RawCorpus,
    FinalDataset,
}

#[derive(Debug, Deserialize)]
struct ManifestHeader {
    format_version: u32,
    kind: SnapshotKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub format_version: u32,
    pub kind: SnapshotKind,
    pub created_at: DateTime<Utc>,
    pub sites: Vec<ManifestSite>,
    pub failures: Vec<LoadFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSite {
    pub metadata: SiteMetadata,
    pub schema: Vec<VariableSpec>,
    pub unpaired: Vec<String>,
    pub provenance: Option<Provenance>,
    pub rows: usize,
    pub frame_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub format_version: u32,
    pub kind: SnapshotKind,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub config: PipelineConfig,
    pub summary: PipelineSummary,
    pub data_path: String,
}

#[derive(Debug, Clone)]
pub struct FinalDataset {
    pub manifest: DatasetManifest,
    pub frame: DataFrame,
}

pub fn write_corpus(path: &Path, corpus: &RawCorpus) -> Result<CorpusManifest, SnapshotError> {
    let sites = corpus
        .sites
        .iter()
        .enumerate()
        .map(|(idx, table)| ManifestSite {
            metadata: table.metadata.clone(),
            schema: table.schema.clone(),
            unpaired: table.unpaired.clone(),
            provenance: table.provenance.clone(),
            rows: table.height(),
            frame_path: format!("site_{idx:04}.parquet"),
        })
        .collect();

    let manifest = CorpusManifest {
        format_version: SNAPSHOT_FORMAT_VERSION,
        kind: SnapshotKind::RawCorpus,
        created_at: Utc::now(),
        sites,
        failures: corpus.failures.clone(),
    };

    let mut zip = ZipWriter::new(create_file(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_PATH, options)?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

    for (entry, table) in manifest.sites.iter().zip(&corpus.sites) {
        zip.start_file(entry.frame_path.as_str(), options)?;
        zip.write_all(&parquet_bytes(&table.frame)?)?;
    }

    zip.finish()?;
    Ok(manifest)
}

pub fn read_corpus(path: &Path) -> Result<RawCorpus, SnapshotError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let manifest_bytes = read_manifest(&mut archive, SnapshotKind::RawCorpus)?;
    let manifest: CorpusManifest = serde_json::from_slice(&manifest_bytes)?;

    let mut sites = Vec::with_capacity(manifest.sites.len());
    for entry in manifest.sites {
        let frame = read_parquet_entry(&mut archive, &entry.frame_path)?;
        let mut table = SiteTable::new(entry.metadata, entry.schema, frame)?;
        table.unpaired = entry.unpaired;
        table.provenance = entry.provenance;
        sites.push(table);
    }

    Ok(RawCorpus {
        sites,
        failures: manifest.failures,
    })
}

pub fn write_dataset(
    path: &Path,
    frame: &DataFrame,
    summary: &PipelineSummary,
    config: &PipelineConfig,
) -> Result<DatasetManifest, SnapshotError> {
    let manifest = DatasetManifest {
        format_version: SNAPSHOT_FORMAT_VERSION,
        kind: SnapshotKind::FinalDataset,
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        columns: frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect(),
        row_count: frame.height(),
        config: config.clone(),
        summary: summary.clone(),
        data_path: DATASET_PATH.to_string(),
    };

    let mut zip = ZipWriter::new(create_file(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_PATH, options)?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    zip.start_file(DATASET_PATH, options)?;
    zip.write_all(&parquet_bytes(frame)?)?;

    zip.finish()?;
    Ok(manifest)
}

pub fn read_dataset(path: &Path) -> Result<FinalDataset, SnapshotError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let manifest_bytes = read_manifest(&mut archive, SnapshotKind::FinalDataset)?;
    let manifest: DatasetManifest = serde_json::from_slice(&manifest_bytes)?;
    let frame = read_parquet_entry(&mut archive, &manifest.data_path)?;
    Ok(FinalDataset { manifest, frame })
}

fn create_file(path: &Path) -> Result<File, SnapshotError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

fn parquet_bytes(frame: &DataFrame) -> Result<Vec<u8>, SnapshotError> {
    let mut clone = frame.clone();
    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer).finish(&mut clone)?;
    Ok(buffer)
}

fn read_manifest<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    expected: SnapshotKind,
) -> Result<Vec<u8>, SnapshotError> {
    let bytes = {
        let mut file = archive
            .by_name(MANIFEST_PATH)
            .map_err(|_| SnapshotError::MissingManifest)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        bytes
    };

    let header: ManifestHeader =
        serde_json::from_slice(&bytes).map_err(|_| SnapshotError::MissingManifest)?;
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: header.format_version,
            expected: SNAPSHOT_FORMAT_VERSION,
        });
    }
    if header.kind != expected {
        return Err(SnapshotError::WrongKind {
            expected,
            found: header.kind,
        });
    }
    Ok(bytes)
}

fn read_parquet_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<DataFrame, SnapshotError> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| SnapshotError::MissingDataFile(name.to_string()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(ParquetReader::new(Cursor::new(bytes)).finish()?)
}
