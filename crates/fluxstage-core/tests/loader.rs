use std::fs;
use std::path::Path;

use anyhow::Result;
use fluxstage_core::loader::{discover_archives, load_corpus};
use fluxstage_core::PipelineError;
use fluxstage_reader::{ArchiveContents, ArchiveSource, ArchiveVariable, ReadOptions, ReaderError};

/// Decodes a text file holding the number of half-hourly steps, or fails on anything else.
struct StepCountSource;

impl ArchiveSource for StepCountSource {
    fn name(&self) -> &'static str {
        "step-count"
    }

    fn open(&self, path: &Path) -> Result<ArchiveContents, ReaderError> {
        let raw = fs::read_to_string(path).map_err(|source| ReaderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let steps: usize = raw.trim().parse().map_err(|_| ReaderError::Decode {
            source_name: "step-count",
            path: path.display().to_string(),
            message: format!("not a step count: {raw:?}"),
        })?;

        let dims = ["time", "y", "x"];
        Ok(ArchiveContents {
            variables: vec![
                ArchiveVariable::new(
                    "time",
                    &["time"],
                    Some("seconds since 2002-01-01 00:30:00"),
                    (0..steps).map(|i| Some(i as f64 * 1800.0)).collect(),
                ),
                ArchiveVariable::new("latitude", &["y", "x"], None, vec![Some(41.9)]),
                ArchiveVariable::new("NEE", &dims, None, vec![Some(0.5); steps]),
                ArchiveVariable::new("NEE_qc", &dims, None, vec![Some(1.0); steps]),
            ],
        })
    }
}

fn write(root: &Path, relative: &str, contents: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[test]
fn discovery_recurses_filters_and_sorts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "TumbaFluxnet.1.4_flux.nc", "4")?;
    write(dir.path(), "sub/AmpleroFluxnet.1.4_flux.nc", "4")?;
    write(dir.path(), "notes.txt", "not an archive")?;
    fs::create_dir_all(dir.path().join("empty.nc"))?;

    let found = discover_archives(dir.path(), "nc")?;
    let relative: Vec<String> = found
        .iter()
        .map(|path| {
            path.strip_prefix(dir.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();

    assert_eq!(
        relative,
        vec!["TumbaFluxnet.1.4_flux.nc", "sub/AmpleroFluxnet.1.4_flux.nc"]
    );
    Ok(())
}

#[test]
fn failing_archives_are_collected_without_aborting() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "AmpleroFluxnet.1.4_flux.nc", "48")?;
    write(dir.path(), "sub/BugacFluxnet.1.4_flux.nc", "6")?;
    write(dir.path(), "CorruptFluxnet.1.4_flux.nc", "garbage")?;
    write(dir.path(), "unlabelled.nc", "6")?;

    let corpus = load_corpus(dir.path(), "nc", &StepCountSource, &ReadOptions::default())?;

    assert_eq!(corpus.site_names(), vec!["Amplero", "Bugac"]);
    assert_eq!(corpus.sites[0].height(), 48);
    assert_eq!(corpus.sites[0].metadata.latitude, Some(41.9));

    let kinds: Vec<&str> = corpus.failures.iter().map(|f| f.kind.as_str()).collect();
    assert_eq!(kinds, vec!["decode", "site_label"]);

    let provenance = corpus.sites[0].provenance.as_ref().unwrap();
    assert!(provenance.path.ends_with("AmpleroFluxnet.1.4_flux.nc"));
    assert_eq!(provenance.file_hash, blake3::hash(b"48").to_hex().to_string());
    Ok(())
}

#[test]
fn custom_site_marker_changes_labels() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "Harvard_flux_2004.nc", "2")?;

    let options = ReadOptions {
        site_marker: "_flux".to_string(),
    };
    let corpus = load_corpus(dir.path(), "nc", &StepCountSource, &options)?;

    assert_eq!(corpus.site_names(), vec!["Harvard"]);
    Ok(())
}

#[test]
fn all_failures_means_no_sites_loaded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "AmpleroFluxnet.nc", "garbage")?;

    let err = load_corpus(dir.path(), "nc", &StepCountSource, &ReadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NoSitesLoaded { attempted: 1, .. }
    ));
    Ok(())
}

#[test]
fn empty_directory_means_no_sites_loaded() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let err = load_corpus(dir.path(), "nc", &StepCountSource, &ReadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NoSitesLoaded { attempted: 0, .. }
    ));
    Ok(())
}

#[test]
fn missing_input_directory_is_an_io_error() {
    let err = discover_archives(Path::new("/definitely/not/a/flux/dir"), "nc").unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}
