//! solace CLI - resumable streaming batch generation of empathetic answers.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use solace::client::HealthStatus;
use solace::{BatchDriver, Config, LlmClient, RecordSource, RunOutcome};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "solace")]
#[command(version)]
#[command(about = "Resumable streaming batch generation of empathetic answers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "solace.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate answers for every record not yet in the output log
    Run {
        /// Path to input dataset (JSON array), overrides dataset.input
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Path to output JSONL log, overrides dataset.output
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// First record index to process, overrides dataset.start
        #[arg(long)]
        start: Option<usize>,

        /// Record index to stop before, overrides dataset.end
        #[arg(long)]
        end: Option<usize>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Validate configuration file and endpoint reachability
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# solace configuration file

[endpoint]
# API key (can also use the variable named by api_key_env)
# api_key = "sk-..."
api_key_env = "DASHSCOPE_API_KEY"
base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
timeout_secs = 180
connect_timeout_secs = 10

[model]
id = "qwq-plus-2025-03-05"
max_tokens = 1024
temperature = 0.6
top_p = 0.95

[persona]
title_suffix = "以哲理温柔型的人格给出建议"
# Template with {title} and {description} placeholders
prompt_template = "prompts/philosophical.md"
# system_prompt = "You are a philosophical and gentle guide."

[dataset]
input = "data/wenda.json"
output = "output.jsonl"
# start = 2979
# end = 3500
skip_empty_answers = false
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            let api_key = config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            solace::PromptBuilder::from_config(&config.persona)
                .context("Failed to load persona prompt")?;

            let client = LlmClient::from_config(&config.endpoint, Some(api_key))?;
            let health = client.health_check(&config.model.id).await;

            info!("Configuration is valid");
            info!("  Model: {}", config.model.id);
            info!(
                "  Sampling: max_tokens={} temperature={} top_p={}",
                config.model.sampling.max_tokens,
                config.model.sampling.temperature,
                config.model.sampling.top_p
            );
            info!("  Input: {:?}", config.dataset.input);
            info!("  Output: {:?}", config.dataset.output);
            match health.status {
                HealthStatus::Healthy => info!(
                    "  Endpoint {}: {} ({}ms)",
                    client.base_url(),
                    health.status,
                    health.latency_ms.unwrap_or_default()
                ),
                _ => warn!(
                    "  Endpoint {}: {} ({})",
                    client.base_url(),
                    health.status,
                    health.error.as_deref().unwrap_or_default()
                ),
            }
            match health.model_listed {
                Some(true) => info!("  Model {} is listed by the endpoint", config.model.id),
                Some(false) => warn!("  Model {} is not listed by the endpoint", config.model.id),
                None => {}
            }
        }

        Commands::Run {
            input,
            output,
            start,
            end,
            no_progress,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(input) = input {
                config.dataset.input = input;
            }
            if let Some(output) = output {
                config.dataset.output = output;
            }
            if start.is_some() {
                config.dataset.start = start;
            }
            if end.is_some() {
                config.dataset.end = end;
            }
            config.validate().context("Invalid configuration")?;

            let api_key = config
                .resolve_api_key()
                .context("Failed to resolve API key")?;
            let client = LlmClient::from_config(&config.endpoint, Some(api_key))?;

            let source = RecordSource::from_config(&config.dataset)
                .with_context(|| format!("Failed to load dataset {:?}", config.dataset.input))?;

            let driver = BatchDriver::from_config(client, &config)?
                .with_progress(!no_progress && std::io::stderr().is_terminal());

            let report = driver
                .run(&source)
                .await
                .context("Failed to start batch run")?;

            println!("\n=== Batch Run Complete ===");
            println!("Run:         {}", report.run_id);
            println!("Records:     {}", report.total);
            println!("Done before: {}", report.already_done);
            println!("Duplicates:  {}", report.duplicates);
            println!("Saved:       {}", report.processed);
            println!("Skipped:     {}", report.skipped);
            println!("Empty:       {}", report.empty_answers);
            println!("Remaining:   {}", report.remaining());
            println!("Runtime:     {:.1}s", report.runtime_secs);
            println!("Output:      {:?}", config.dataset.output);

            if let RunOutcome::Aborted { record_id, error } = &report.outcome {
                bail!("batch stopped at record {record_id}: {error}");
            }
        }
    }

    Ok(())
}
