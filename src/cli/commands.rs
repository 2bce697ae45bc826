//! CLI command definitions for cot-bench.
//!
//! Every subcommand resolves a [`HarnessConfig`] the same way: defaults, then
//! the optional `--config` YAML file, then `COT_BENCH_*` variables, then the
//! flags given on the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::augment::{AugmentMode, TestAugmenter};
use crate::benchmark::Benchmark;
use crate::execution::CandidateExecutor;
use crate::export::{read_manifest, read_samples, split_samples, write_manifest, write_samples};
use crate::llm::{ChatCompletionsClient, LlmProvider, DEFAULT_API_BASE};
use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::{FacilityKind, HarnessConfig, RunDriver};
use crate::scoring::{LocalScorer, Scorer};
use crate::selfdebug::{Solver, Strategy};
use crate::structured::StructuredGenerator;

/// Default samples file written by `run` and read by `score`/`split`/`triage`.
const DEFAULT_SAMPLES: &str = "results/samples.jsonl";

/// Default directory for split candidate modules.
const DEFAULT_MODULES_DIR: &str = "generated_cot";

/// Self-debugging code generation benchmark harness.
#[derive(Parser, Debug)]
#[command(name = "cot-bench")]
#[command(about = "Chain-of-thought and self-debugging code generation on HumanEval-style benchmarks")]
#[command(version)]
#[command(
    long_about = "cot-bench asks a language model for {reasoning, code} JSON answers, runs the code against each task's tests in a sandbox, and feeds failures back for repair.\n\nExample usage:\n  cot-bench run --problems HumanEval.jsonl --strategy self_debug --score\n  cot-bench split --samples results/samples.jsonl --out-dir generated_cot"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML run configuration applied before environment variables and flags.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Generate completions for a sample of problems and write samples.jsonl.
    Run(RunArgs),

    /// Compute pass@k for an existing samples file.
    Score(ScoreArgs),

    /// Split samples into one Python module per completion plus a manifest.
    Split(SplitArgs),

    /// Generate extra pytest tests for split candidate modules.
    Augment(AugmentArgs),

    /// Find the first failing assertion of a task's completion.
    Triage(TriageArgs),
}

/// Model backend connection.
#[derive(clap::Args, Debug, Clone)]
pub struct BackendArgs {
    /// Model identifier sent to the backend.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible chat completions server.
    #[arg(long, env = "COT_BENCH_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// API key, if the server wants one.
    #[arg(long, env = "COT_BENCH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Execution facility selection.
#[derive(clap::Args, Debug, Clone)]
pub struct FacilityArgs {
    /// Where candidates run: subprocess or docker.
    #[arg(long)]
    pub facility: Option<FacilityKind>,

    /// Per-candidate wall-clock timeout in seconds.
    #[arg(long)]
    pub exec_timeout: Option<u64>,
}

/// Arguments for `cot-bench run`.
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// HumanEval-format JSONL problem file.
    #[arg(short = 'p', long)]
    pub problems: PathBuf,

    /// Where to write the samples.
    #[arg(short = 'o', long, default_value = DEFAULT_SAMPLES)]
    pub output: PathBuf,

    /// Generation strategy: cot, self_edit or self_debug.
    #[arg(short = 's', long)]
    pub strategy: Option<Strategy>,

    /// Independent attempts per task.
    #[arg(short = 'n', long)]
    pub attempts: Option<usize>,

    /// Round budget of one self-debug session.
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// First problem index of the sample window.
    #[arg(long)]
    pub start: Option<usize>,

    /// Exclusive end of the sample window.
    #[arg(long)]
    pub stop: Option<usize>,

    /// Stride through the sample window.
    #[arg(long)]
    pub step: Option<usize>,

    /// Score the samples once the run finishes.
    #[arg(long)]
    pub score: bool,

    /// k values for pass@k.
    #[arg(long = "k", value_delimiter = ',', default_values_t = [1usize, 3])]
    pub k: Vec<usize>,

    /// Per-candidate timeout in seconds while scoring.
    #[arg(long, default_value = "7")]
    pub score_timeout: f64,

    /// Write Prometheus metrics in text format to this file at the end.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Print the run summary as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub facility: FacilityArgs,
}

/// Arguments for `cot-bench score`.
#[derive(clap::Args, Debug)]
pub struct ScoreArgs {
    /// HumanEval-format JSONL problem file.
    #[arg(short = 'p', long)]
    pub problems: PathBuf,

    /// Samples file to score.
    #[arg(long, default_value = DEFAULT_SAMPLES)]
    pub samples: PathBuf,

    /// k values for pass@k.
    #[arg(long = "k", value_delimiter = ',', default_values_t = [1usize, 3])]
    pub k: Vec<usize>,

    /// Per-candidate timeout in seconds.
    #[arg(long, default_value = "7")]
    pub score_timeout: f64,

    /// Print the summary as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub facility: FacilityArgs,
}

/// Arguments for `cot-bench split`.
#[derive(clap::Args, Debug)]
pub struct SplitArgs {
    /// Samples file to split.
    #[arg(long, default_value = DEFAULT_SAMPLES)]
    pub samples: PathBuf,

    /// Directory for the candidate modules.
    #[arg(short = 'o', long, default_value = DEFAULT_MODULES_DIR)]
    pub out_dir: PathBuf,

    /// Manifest path (defaults to `<out-dir>/manifest.json`).
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

/// Arguments for `cot-bench augment`.
#[derive(clap::Args, Debug)]
pub struct AugmentArgs {
    /// HumanEval-format JSONL problem file.
    #[arg(short = 'p', long)]
    pub problems: PathBuf,

    /// Manifest written by `split`.
    #[arg(long, default_value = "generated_cot/manifest.json")]
    pub manifest: PathBuf,

    /// Tasks to augment, full or short ids (e.g. `20,10`).
    #[arg(short = 't', long, value_delimiter = ',', required = true)]
    pub tasks: Vec<String>,

    /// coverage (function + existing tests) or spec (generated assertions).
    #[arg(long, default_value = "coverage")]
    pub mode: AugmentMode,

    /// Directory for the generated test files (defaults to each module's directory).
    #[arg(short = 'o', long)]
    pub out_dir: Option<PathBuf>,

    /// Token budget per generation.
    #[arg(long, default_value = "300")]
    pub max_tokens: u32,

    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Arguments for `cot-bench triage`.
#[derive(clap::Args, Debug)]
pub struct TriageArgs {
    /// HumanEval-format JSONL problem file.
    #[arg(short = 'p', long)]
    pub problems: PathBuf,

    /// Samples file holding the completion.
    #[arg(long, default_value = DEFAULT_SAMPLES)]
    pub samples: PathBuf,

    /// Task to triage, full or short id.
    #[arg(short = 't', long)]
    pub task: String,

    /// Which completion of the task (1-based).
    #[arg(long, default_value = "1")]
    pub completion: usize,

    /// Print the report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub facility: FacilityArgs,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and run the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let base = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Run(args) => run_run_command(base, args).await,
        Commands::Score(args) => run_score_command(base, args).await,
        Commands::Split(args) => run_split_command(args),
        Commands::Augment(args) => run_augment_command(base, args).await,
        Commands::Triage(args) => run_triage_command(base, args).await,
    }
}

// ============================================================================
// Configuration
// ============================================================================

fn load_config(path: Option<&Path>) -> anyhow::Result<HarnessConfig> {
    let config = match path {
        Some(path) => HarnessConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn apply_backend_args(mut config: HarnessConfig, args: &BackendArgs) -> HarnessConfig {
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }
    config
}

fn apply_facility_args(mut config: HarnessConfig, args: &FacilityArgs) -> HarnessConfig {
    if let Some(facility) = args.facility {
        config = config.with_facility(facility);
    }
    if let Some(secs) = args.exec_timeout {
        config = config.with_exec_timeout(Duration::from_secs(secs));
    }
    config
}

fn apply_run_args(mut config: HarnessConfig, args: &RunArgs) -> HarnessConfig {
    config = apply_backend_args(config, &args.backend);
    config = apply_facility_args(config, &args.facility);
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy);
    }
    if let Some(attempts) = args.attempts {
        config = config.with_attempts_per_task(attempts);
    }
    if let Some(rounds) = args.max_rounds {
        config = config.with_max_rounds(rounds);
    }
    if args.start.is_some() || args.stop.is_some() || args.step.is_some() {
        let run = &config.run;
        let (start, stop, step) = (
            args.start.unwrap_or(run.sample_start),
            args.stop.unwrap_or(run.sample_stop),
            args.step.unwrap_or(run.sample_step),
        );
        config = config.with_sample_window(start, stop, step);
    }
    config
}

fn build_llm_client(args: &BackendArgs, model: &str) -> anyhow::Result<Arc<dyn LlmProvider>> {
    info!(api_base = %args.api_base, model = %model, "Using chat completions backend");
    let client = ChatCompletionsClient::new(args.api_base.clone(), args.api_key.clone(), model)
        .map_err(|e| anyhow::anyhow!("Failed to initialize LLM client: {}", e))?;
    Ok(Arc::new(client))
}

fn build_generator(
    config: &HarnessConfig,
    args: &BackendArgs,
) -> anyhow::Result<Arc<StructuredGenerator>> {
    let provider = build_llm_client(args, &config.model)?;
    Ok(Arc::new(
        StructuredGenerator::new(provider, config.sampling.clone()).with_model(&config.model),
    ))
}

fn load_benchmark(path: &Path) -> anyhow::Result<Benchmark> {
    Benchmark::load_jsonl(path)
        .with_context(|| format!("Failed to load problems from {}", path.display()))
}

fn score_timeout(secs: f64) -> anyhow::Result<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        anyhow::bail!("--score-timeout must be a positive number of seconds, got {}", secs);
    }
    Ok(Duration::from_secs_f64(secs))
}

// ============================================================================
// Commands
// ============================================================================

async fn run_run_command(base: HarnessConfig, args: RunArgs) -> anyhow::Result<()> {
    let config = apply_run_args(base, &args);
    config.validate()?;
    if args.metrics_out.is_some() {
        init_metrics()?;
    }

    let benchmark = load_benchmark(&args.problems)?;
    let generator = build_generator(&config, &args.backend)?;
    let executor = CandidateExecutor::from_config(&config.execution);
    info!(
        facility = executor.facility_name(),
        model = %config.model,
        "Harness ready"
    );

    let driver = RunDriver::new(Solver::new(generator, executor.clone()), config.run.clone());
    let output = driver.run(&benchmark).await;
    write_samples(&args.output, &output.records)?;

    let mut summary = serde_json::to_value(&output.summary)?;
    if args.score {
        if output.records.is_empty() {
            warn!("No completions were produced, skipping scoring");
        } else {
            let scorer = LocalScorer::new(benchmark, executor);
            let scores = scorer
                .score(&output.records, &args.k, score_timeout(args.score_timeout)?)
                .await?;
            if !args.json {
                println!("{}", scores);
            }
            summary["pass_at_k"] = serde_json::to_value(&scores.pass_at_k)?;
        }
    }

    if let Some(path) = &args.metrics_out {
        std::fs::write(path, export_metrics())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", output.summary);
        println!("Samples written to {}", args.output.display());
    }
    Ok(())
}

async fn run_score_command(base: HarnessConfig, args: ScoreArgs) -> anyhow::Result<()> {
    let config = apply_facility_args(base, &args.facility);
    config.validate()?;

    let benchmark = load_benchmark(&args.problems)?;
    let records = read_samples(&args.samples)
        .with_context(|| format!("Failed to read samples from {}", args.samples.display()))?;
    let scorer = LocalScorer::new(benchmark, CandidateExecutor::from_config(&config.execution));
    let summary = scorer
        .score(&records, &args.k, score_timeout(args.score_timeout)?)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

fn run_split_command(args: SplitArgs) -> anyhow::Result<()> {
    let records = read_samples(&args.samples)
        .with_context(|| format!("Failed to read samples from {}", args.samples.display()))?;
    let manifest = split_samples(&records, &args.out_dir)?;
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| args.out_dir.join("manifest.json"));
    write_manifest(&manifest_path, &manifest)?;

    println!(
        "Wrote {} modules to {} (manifest: {})",
        manifest.len(),
        args.out_dir.display(),
        manifest_path.display()
    );
    Ok(())
}

async fn run_augment_command(base: HarnessConfig, args: AugmentArgs) -> anyhow::Result<()> {
    let config = apply_backend_args(base, &args.backend);
    config.validate()?;

    let benchmark = load_benchmark(&args.problems)?;
    let manifest = read_manifest(&args.manifest)
        .with_context(|| format!("Failed to read manifest {}", args.manifest.display()))?;
    let augmenter = TestAugmenter::new(build_generator(&config, &args.backend)?)
        .with_max_tokens(args.max_tokens);

    let mut written = 0usize;
    for task in &args.tasks {
        let problem = benchmark.get(task)?;
        let entries: Vec<_> = manifest
            .iter()
            .filter(|e| e.matches_task(&problem.task_id))
            .collect();
        if entries.is_empty() {
            warn!(task_id = %problem.task_id, "No manifest entries for task");
            continue;
        }

        for entry in entries {
            let out_dir = match &args.out_dir {
                Some(dir) => dir.clone(),
                None => Path::new(&entry.module)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            };
            match augmenter
                .augment_entry(entry, problem, args.mode, &out_dir)
                .await
            {
                Ok(result) => {
                    written += 1;
                    println!(
                        "Wrote {} ({} tests) with import from {}",
                        result.path.display(),
                        result.tests,
                        entry.module
                    );
                }
                Err(e) => warn!(
                    task_id = %entry.task_id,
                    index = entry.index,
                    error = %e,
                    "Augmentation failed"
                ),
            }
        }
    }

    info!(written = written, "Augmentation complete");
    Ok(())
}

async fn run_triage_command(base: HarnessConfig, args: TriageArgs) -> anyhow::Result<()> {
    let config = apply_facility_args(base, &args.facility);
    config.validate()?;

    let benchmark = load_benchmark(&args.problems)?;
    let problem = benchmark.get(&args.task)?;
    let records = read_samples(&args.samples)
        .with_context(|| format!("Failed to read samples from {}", args.samples.display()))?;
    let completion = records
        .iter()
        .filter(|r| r.task_id == problem.task_id)
        .nth(args.completion.saturating_sub(1))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No completion #{} for task {} in {}",
                args.completion,
                problem.task_id,
                args.samples.display()
            )
        })?;

    let executor = CandidateExecutor::from_config(&config.execution);
    let report = executor.triage(&completion.completion, problem).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Task: {}", report.task_id);
        print!("{}", report.render());
    }
    Ok(())
}
