use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use fluxstage_core::config::PipelineConfig;
use fluxstage_core::loader::{load_corpus_with_config, LoadFailure, RawCorpus};
use fluxstage_core::masking::flag_summary;
use fluxstage_core::pipeline::{run_and_persist, PipelineSummary};
use fluxstage_core::snapshot;
use fluxstage_reader::NetCdf3Source;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stage per-site flux archives into a modelling dataset", long_about = None)]
struct Cli {
    /// TOML file with pipeline settings; flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read every archive under the input directory into a raw corpus snapshot
    Load(LoadArgs),
    /// Align, mask and pivot a raw corpus snapshot into the final dataset
    Stage(StageArgs),
    /// Load and stage in one pass
    Run(RunArgs),
    /// Print the head of a final dataset snapshot
    Inspect(InspectArgs),
    /// List the sites held in a raw corpus snapshot
    CorpusSummary(CorpusSummaryArgs),
}

#[derive(Args, Debug, Default)]
struct LoadArgs {
    /// Directory searched recursively for site archives
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Where the raw corpus snapshot is written
    #[arg(long)]
    corpus_path: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct StageKnobs {
    /// Where the final dataset snapshot is written
    #[arg(long)]
    output_path: Option<PathBuf>,
    /// Flag value marking an observation as reliable
    #[arg(long)]
    reliable_flag_value: Option<f64>,
    /// Width of time-of-day slots in minutes (defaults to the native timestep)
    #[arg(long, value_name = "MINUTES")]
    time_of_day_granularity: Option<u32>,
}

#[derive(Args, Debug, Default)]
struct StageArgs {
    /// Raw corpus snapshot to stage
    #[arg(long)]
    corpus_path: Option<PathBuf>,
    #[command(flatten)]
    knobs: StageKnobs,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    load: LoadArgs,
    #[command(flatten)]
    knobs: StageKnobs,
}

#[derive(Args, Debug, Default)]
struct InspectArgs {
    /// Final dataset snapshot (defaults to the configured output path)
    #[arg(long)]
    path: Option<PathBuf>,
    /// Number of rows to print
    #[arg(long, default_value_t = 10)]
    rows: usize,
}

#[derive(Args, Debug, Default)]
struct CorpusSummaryArgs {
    /// Raw corpus snapshot (defaults to the configured corpus path)
    #[arg(long)]
    corpus_path: Option<PathBuf>,
    /// Also break down quality flags for this variable
    #[arg(long)]
    variable: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Load(args) => {
            let config = apply_load_args(config, args);
            handle_load(&config).map(|_| ())
        }
        Command::Stage(args) => {
            let mut config = apply_stage_knobs(config, args.knobs);
            if let Some(path) = args.corpus_path {
                config.corpus_path = Some(path);
            }
            handle_stage(&config)
        }
        Command::Run(args) => {
            let config = apply_stage_knobs(apply_load_args(config, args.load), args.knobs);
            let corpus = handle_load(&config)?;
            stage_corpus(&corpus, &config)
        }
        Command::Inspect(args) => handle_inspect(&config, args),
        Command::CorpusSummary(args) => handle_corpus_summary(&config, args),
    }
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn apply_load_args(mut config: PipelineConfig, args: LoadArgs) -> PipelineConfig {
    if let Some(dir) = args.input_dir {
        config.input_dir = dir;
    }
    if let Some(path) = args.corpus_path {
        config.corpus_path = Some(path);
    }
    config
}

fn apply_stage_knobs(mut config: PipelineConfig, knobs: StageKnobs) -> PipelineConfig {
    if let Some(path) = knobs.output_path {
        config.output_path = Some(path);
    }
    if let Some(flag) = knobs.reliable_flag_value {
        config.reliable_flag_value = flag;
    }
    if let Some(minutes) = knobs.time_of_day_granularity {
        config.time_of_day_granularity_minutes = Some(minutes);
    }
    config
}

fn handle_load(config: &PipelineConfig) -> Result<RawCorpus> {
    config.validate()?;
    let corpus = load_corpus_with_config(config, &NetCdf3Source)
        .with_context(|| format!("failed to load archives from {}", config.input_dir().display()))?;

    let path = config.corpus_path();
    snapshot::write_corpus(&path, &corpus)
        .with_context(|| format!("failed to write corpus snapshot {}", path.display()))?;
    info!(path = %path.display(), sites = corpus.sites.len(), "wrote raw corpus snapshot");

    println!(
        "Loaded {} sites into {}",
        corpus.sites.len(),
        path.display()
    );
    print_failures(&corpus.failures);
    Ok(corpus)
}

fn handle_stage(config: &PipelineConfig) -> Result<()> {
    let path = config.corpus_path();
    let corpus = snapshot::read_corpus(&path)
        .with_context(|| format!("failed to read corpus snapshot {}", path.display()))?;
    stage_corpus(&corpus, config)
}

fn stage_corpus(corpus: &RawCorpus, config: &PipelineConfig) -> Result<()> {
    let (output, manifest) = run_and_persist(corpus, config).context("staging failed")?;
    print_summary(&output.summary);
    println!(
        "Wrote {} rows x {} columns to {} (run {})",
        manifest.row_count,
        manifest.columns.len(),
        config.output_path().display(),
        manifest.run_id
    );
    Ok(())
}

fn handle_inspect(config: &PipelineConfig, args: InspectArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| config.output_path());
    let dataset = snapshot::read_dataset(&path)
        .with_context(|| format!("failed to read dataset snapshot {}", path.display()))?;

    let manifest = &dataset.manifest;
    println!("Run {} generated at {}", manifest.run_id, manifest.generated_at);
    println!(
        "{} rows x {} columns from {} sites",
        manifest.row_count,
        manifest.columns.len(),
        manifest.summary.sites.len()
    );
    println!("{}", dataset.frame.head(Some(args.rows)));
    Ok(())
}

fn handle_corpus_summary(config: &PipelineConfig, args: CorpusSummaryArgs) -> Result<()> {
    let path = args.corpus_path.unwrap_or_else(|| config.corpus_path());
    let corpus = snapshot::read_corpus(&path)
        .with_context(|| format!("failed to read corpus snapshot {}", path.display()))?;

    let mut table = Table::new();
    table.set_header(vec!["site", "rows", "variables", "names"]);
    for site in &corpus.sites {
        table.add_row(vec![
            site.site().to_string(),
            site.height().to_string(),
            site.schema.len().to_string(),
            site.variable_names().collect::<Vec<_>>().join(", "),
        ]);
    }
    println!("{table}");
    print_failures(&corpus.failures);

    if let Some(variable) = args.variable {
        let mut table = Table::new();
        table.set_header(vec![
            "site",
            "reliable",
            "unreliable",
            "missing flag",
            "missing value",
        ]);
        for site in &corpus.sites {
            if site.variable(&variable).is_none() {
                table.add_row(vec![site.site().to_string(), "absent".to_string()]);
                continue;
            }
            let summary = flag_summary(site, &variable, config.reliable_flag_value)?;
            table.add_row(vec![
                summary.site,
                summary.reliable.to_string(),
                summary.unreliable.to_string(),
                summary.missing_flag.to_string(),
                summary.missing_value.to_string(),
            ]);
        }
        println!("{variable}");
        println!("{table}");
    }
    Ok(())
}

fn print_summary(summary: &PipelineSummary) {
    let mut table = Table::new();
    table.set_header(vec!["site", "unfiltered", "reliable", "% reliable", "warning"]);
    for site in &summary.sites {
        table.add_row(vec![
            site.site.clone(),
            site.total_rows.to_string(),
            site.complete_rows.to_string(),
            format!("{:.2}", site.percent_retained),
            site.warning
                .map(|warning| format!("{warning:?}"))
                .unwrap_or_default(),
        ]);
    }
    println!("{table}");
    println!("Common variables: {}", summary.common_variables.join(", "));
    if !summary.padded_sites.is_empty() {
        println!(
            "Sites missing time-of-day slots: {}",
            summary.padded_sites.join(", ")
        );
    }
    println!(
        "Rows before cleanup: {}, after: {}",
        summary.rows_before_cleanup, summary.row_count
    );
    print_failures(&summary.load_failures);
}

fn print_failures(failures: &[LoadFailure]) {
    if failures.is_empty() {
        return;
    }
    println!("{} archives failed to load:", failures.len());
    for failure in failures {
        println!("  [{}] {}: {}", failure.kind, failure.path, failure.message);
    }
}
