// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tabflow::utils::logging::{format_error, format_step, format_success, format_warning};
use tabflow::{
    CleanRequest, Config, ModelType, PipelineId, PipelineService, RunTiming, ScaleRequest,
    SplitRequest, StageProgress, TrainReport, Validator,
};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(version = "0.1.0")]
#[command(about = "Staged tabular machine-learning pipelines", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file and print its profile
    Inspect {
        file: PathBuf,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Run every stage on one file and print the results
    Run {
        file: PathBuf,

        #[arg(short, long)]
        target: String,

        #[arg(short, long, default_value = "random_forest_classifier")]
        model: String,

        #[command(flatten)]
        prepare: PrepareArgs,

        #[arg(long)]
        charts: bool,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Train several models on the same data and rank them
    Compare {
        file: PathBuf,

        #[arg(short, long)]
        target: String,

        #[arg(long, value_delimiter = ',', required = true)]
        models: Vec<String>,

        #[command(flatten)]
        prepare: PrepareArgs,
    },

    /// List model tags and their task types
    Models,
}

/// Stage options shared by `run` and `compare`.
#[derive(Args, Clone)]
struct PrepareArgs {
    /// Missing-value strategy
    #[arg(long, value_name = "STRATEGY")]
    clean: Option<String>,

    #[arg(long, value_name = "COLUMNS")]
    clean_columns: Option<String>,

    #[arg(long)]
    fill_value: Option<String>,

    /// standardize or normalize
    #[arg(long, value_name = "KIND")]
    scale: Option<String>,

    #[arg(long, value_name = "COLUMNS")]
    scale_columns: Option<String>,

    #[arg(long, default_value_t = 0.8)]
    ratio: f64,
}

impl PrepareArgs {
    fn step_count(&self) -> usize {
        // ingest, split, train plus the optional stages
        3 + usize::from(self.clean.is_some()) + usize::from(self.scale.is_some())
    }
}

#[derive(Serialize)]
struct LeaderboardEntry {
    rank: usize,
    model: String,
    score_name: &'static str,
    test_score: f64,
    train_score: f64,
    timing: RunTiming,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tabflow::utils::logging::init_logger(cli.color, cli.verbose);

    debug!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Inspect { file, pretty } => {
            cmd_inspect(config, &file, pretty).await?;
        }
        Commands::Run {
            file,
            target,
            model,
            prepare,
            charts,
            pretty,
        } => {
            cmd_run(config, &file, &target, &model, &prepare, charts, pretty, cli.color).await?;
        }
        Commands::Compare {
            file,
            target,
            models,
            prepare,
        } => {
            cmd_compare(config, &file, &target, models, &prepare, cli.color).await?;
        }
        Commands::Models => {
            cmd_models();
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<(Vec<u8>, String)> {
    Validator::validate_input_file(path)
        .with_context(|| format!("Cannot use {}", path.display()))?;
    let bytes = std::fs::read(path).context("Failed to read input file")?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((bytes, filename))
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    tabflow::report::render_json(value, pretty).context("Failed to serialize output")
}

async fn cmd_inspect(config: Config, file: &Path, pretty: bool) -> Result<()> {
    let (bytes, filename) = read_input(file)?;
    let service = PipelineService::new(config);

    let report = service
        .ingest(bytes, &filename)
        .await
        .with_context(|| format!("Failed to ingest {}", filename))?;

    eprintln!("{}", format_success(&report.message));
    let info = &report.dataset_info;
    let missing: usize = info.missing_values.values().sum();
    if missing > 0 {
        eprintln!(
            "{}",
            format_warning(&format!("{} missing value(s) across the dataset", missing))
        );
    }

    println!("{}", to_json(info, pretty)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    config: Config,
    file: &Path,
    target: &str,
    model: &str,
    prepare: &PrepareArgs,
    charts: bool,
    pretty: bool,
    color: bool,
) -> Result<()> {
    let start_time = Instant::now();
    let (bytes, filename) = read_input(file)?;
    let service = PipelineService::new(config);
    let total = prepare.step_count();
    let progress = StageProgress::new(total, color);

    progress.start_step("ingest");
    let ingest = service
        .ingest(bytes, &filename)
        .await
        .with_context(|| format!("Failed to ingest {}", filename))?;
    progress.add_rows(ingest.dataset_info.rows);
    progress.complete_step("ingest");
    let id = ingest.pipeline_id;

    let mut step = 1;
    let outcome = async {
        for (name, message) in run_preparation(&service, &id, target, prepare, &progress).await? {
            step += 1;
            progress.println(format_step(step, total, &format!("{}: {}", name, message)));
        }

        progress.start_step("train");
        let trained = service
            .train(&id, model)
            .await
            .with_context(|| format!("Failed to train {}", model))?;
        progress.complete_step("train");
        Ok::<TrainReport, anyhow::Error>(trained)
    }
    .await;

    let trained = match outcome {
        Ok(trained) => trained,
        Err(e) => {
            progress.fail_step("pipeline");
            progress.finish();
            eprintln!("{}", format_error(&format!("{:#}", e)));
            return Err(e);
        }
    };
    progress.finish();

    eprintln!("{}", format_success(&trained.message));
    let results = service
        .results(&id, charts)
        .await
        .context("Failed to assemble results")?;
    println!("{}", to_json(&results, pretty)?);

    info!(
        "{} ({:.2}s total)",
        progress.stats().summary(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Runs the optional clean and scale stages and then split, returning a
/// `(stage, message)` line for each.
async fn run_preparation(
    service: &PipelineService,
    id: &PipelineId,
    target: &str,
    prepare: &PrepareArgs,
    progress: &StageProgress,
) -> Result<Vec<(&'static str, String)>> {
    let mut lines = Vec::new();

    if let Some(strategy) = &prepare.clean {
        progress.start_step("clean");
        let request = CleanRequest {
            strategy: strategy.clone(),
            columns: prepare
                .clean_columns
                .as_deref()
                .map(Validator::parse_column_list)
                .unwrap_or_default(),
            fill_value: prepare.fill_value.clone(),
        };
        let report = service.clean(id, request).await.context("Clean failed")?;
        progress.complete_step("clean");
        lines.push(("clean", report.message));
    }

    if let Some(scaler) = &prepare.scale {
        progress.start_step("scale");
        let request = ScaleRequest {
            scaler: scaler.clone(),
            columns: prepare
                .scale_columns
                .as_deref()
                .map(Validator::parse_column_list)
                .unwrap_or_default(),
        };
        let report = service.scale(id, request).await.context("Scale failed")?;
        progress.complete_step("scale");
        lines.push(("scale", report.message));
    }

    progress.start_step("split");
    let report = service
        .split(id, SplitRequest::new(target, prepare.ratio))
        .await
        .context("Split failed")?;
    progress.complete_step("split");
    if !report.dropped_columns.is_empty() {
        lines.push((
            "split",
            format!("dropped non-numeric {:?}", report.dropped_columns),
        ));
    }
    lines.push(("split", report.message));

    Ok(lines)
}

async fn cmd_compare(
    config: Config,
    file: &Path,
    target: &str,
    models: Vec<String>,
    prepare: &PrepareArgs,
    color: bool,
) -> Result<()> {
    let (bytes, filename) = read_input(file)?;
    let parallel_workers = config.pipeline.parallel_workers.max(1);
    let service = PipelineService::new(config);
    let progress = StageProgress::new(models.len(), color);

    info!(
        "Comparing {} model(s) on {} with {} worker(s)",
        models.len(),
        filename,
        parallel_workers
    );

    let results = stream::iter(models.into_iter().map(|model| {
        let service = service.clone();
        let bytes = bytes.clone();
        let filename = filename.clone();
        let progress = &progress;

        async move {
            let run_start = Instant::now();
            progress.start_step(&model);

            let result = async {
                let id = service.ingest(bytes, &filename).await?.pipeline_id;
                // Step lines are only shown for single runs.
                let trained = async {
                    run_preparation(&service, &id, target, prepare, &StageProgress::hidden(0))
                        .await?;
                    Ok::<TrainReport, anyhow::Error>(service.train(&id, &model).await?)
                }
                .await;
                if let Err(e) = service.remove(&id).await {
                    warn!("Failed to remove pipeline {}: {}", id, e);
                }
                trained
            }
            .await;

            match &result {
                Ok(_) => progress.complete_step(&model),
                Err(_) => progress.fail_step(&model),
            }
            let timing = RunTiming::new(&model, run_start.elapsed());
            (model, result, timing)
        }
    }))
    .buffer_unordered(parallel_workers)
    .collect::<Vec<_>>()
    .await;

    progress.finish();

    let mut ranked = Vec::new();
    for (model, result, timing) in results {
        match result {
            Ok(trained) => ranked.push((model, trained, timing)),
            Err(e) => eprintln!("{}", format_error(&format!("{}: {:#}", model, e))),
        }
    }
    ranked.sort_by(|a, b| b.1.metrics.test_score().total_cmp(&a.1.metrics.test_score()));

    if ranked.is_empty() {
        anyhow::bail!("No model trained successfully");
    }

    println!("{}", "Leaderboard".bold());
    for (rank, (model, trained, timing)) in ranked.into_iter().enumerate() {
        let entry = LeaderboardEntry {
            rank: rank + 1,
            model,
            score_name: trained.metrics.score_name(),
            test_score: trained.metrics.test_score(),
            train_score: trained.metrics.train_score(),
            timing,
        };
        println!(
            "{:>3}. {:<26} test {} {} | train {:.4} | {}",
            entry.rank,
            entry.model.cyan(),
            entry.score_name,
            format!("{:.4}", entry.test_score).green().bold(),
            entry.train_score,
            entry.timing.format()
        );
        debug!("{}", to_json(&entry, false)?);
    }

    info!("{}", progress.stats().summary());
    Ok(())
}

fn cmd_models() {
    println!("{}", "Available models".bold());
    for model in ModelType::ALL {
        println!("  {:<26} {}", model.as_str().cyan(), model.task_type());
    }
}
