mod common;

use std::fs::File;
use std::io::Write;

use anyhow::Result;
use fluxstage_core::config::PipelineConfig;
use fluxstage_core::loader::{LoadFailure, RawCorpus};
use fluxstage_core::pipeline::{run_pipeline, PipelineOptions};
use fluxstage_core::snapshot::{
    read_corpus, read_dataset, write_corpus, write_dataset, SnapshotError, SnapshotKind,
    SNAPSHOT_FORMAT_VERSION,
};
use fluxstage_reader::Provenance;

use common::reliable_site;

fn sample_corpus() -> RawCorpus {
    let mut first = reliable_site("Amplero", "2002-01-01 00:30:00", 6, &["NEE", "Qle"]);
    first.unpaired = vec!["LWdown".to_string()];
    first.provenance = Some(Provenance {
        path: "/data/AmpleroFluxnet.1.4_flux.nc".to_string(),
        file_hash: "abc123".to_string(),
    });
    let second = reliable_site("Bugac", "2003-01-01 00:00:00", 4, &["NEE"]);

    RawCorpus {
        sites: vec![first, second],
        failures: vec![LoadFailure {
            path: "/data/broken.nc".to_string(),
            kind: "decode".to_string(),
            message: "truncated header".to_string(),
        }],
    }
}

#[test]
fn corpus_snapshot_round_trips_tables_and_provenance() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("corpus.zip");
    let corpus = sample_corpus();

    let manifest = write_corpus(&path, &corpus)?;
    assert_eq!(manifest.format_version, SNAPSHOT_FORMAT_VERSION);
    assert_eq!(manifest.kind, SnapshotKind::RawCorpus);
    assert_eq!(manifest.sites[1].frame_path, "site_0001.parquet");

    let restored = read_corpus(&path)?;
    assert_eq!(restored.site_names(), vec!["Amplero", "Bugac"]);
    assert_eq!(restored.failures, corpus.failures);

    for (original, restored) in corpus.sites.iter().zip(&restored.sites) {
        assert_eq!(restored.metadata, original.metadata);
        assert_eq!(restored.schema, original.schema);
        assert_eq!(restored.unpaired, original.unpaired);
        assert_eq!(restored.provenance, original.provenance);
        assert_eq!(restored.timestamps()?, original.timestamps()?);
        assert_eq!(restored.values("NEE")?, original.values("NEE")?);
        assert_eq!(restored.values("NEE_qc")?, original.values("NEE_qc")?);
    }
    Ok(())
}

#[test]
fn unknown_format_version_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("future.zip");

    let mut zip = zip::ZipWriter::new(File::create(&path)?);
    zip.start_file("manifest.json", zip::write::FileOptions::default())?;
    zip.write_all(br#"{"format_version": 99, "kind": "raw_corpus"}"#)?;
    zip.finish()?;

    let err = read_corpus(&path).unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::UnsupportedVersion {
            found: 99,
            expected: SNAPSHOT_FORMAT_VERSION
        }
    ));
    Ok(())
}

#[test]
fn archive_without_manifest_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.zip");

    let mut zip = zip::ZipWriter::new(File::create(&path)?);
    zip.start_file("readme.txt", zip::write::FileOptions::default())?;
    zip.write_all(b"nothing here")?;
    zip.finish()?;

    assert!(matches!(
        read_dataset(&path).unwrap_err(),
        SnapshotError::MissingManifest
    ));
    Ok(())
}

#[test]
fn snapshots_are_not_interchangeable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let corpus = sample_corpus();
    let corpus_path = dir.path().join("corpus.zip");
    let dataset_path = dir.path().join("dataset.zip");

    write_corpus(&corpus_path, &corpus)?;
    let output = run_pipeline(&corpus, &PipelineOptions::default())?;
    write_dataset(
        &dataset_path,
        &output.dataset,
        &output.summary,
        &PipelineConfig::default(),
    )?;

    assert!(matches!(
        read_corpus(&dataset_path).unwrap_err(),
        SnapshotError::WrongKind {
            expected: SnapshotKind::RawCorpus,
            found: SnapshotKind::FinalDataset
        }
    ));
    assert!(matches!(
        read_dataset(&corpus_path).unwrap_err(),
        SnapshotError::WrongKind {
            expected: SnapshotKind::FinalDataset,
            found: SnapshotKind::RawCorpus
        }
    ));
    Ok(())
}
