//! Glossa - Multilingual Prompt Analysis Pipeline
//!
//! This is the main entry point for the Glossa application, which translates
//! a prompt into many human languages, sends each translation to a locally
//! hosted LLM, and charts which programming language the model answers in.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use glossa::cli::{Args, Commands};
use glossa::config::Config;
use glossa::manifest::{Manifest, Prompt};
use glossa::pipeline::{Pipeline, PromptOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load glossa.toml from current directory first
            if Path::new("glossa.toml").exists() {
                Config::from_file("glossa.toml")?
            } else {
                Config::default()
            }
        }
    };

    if let Some(output_root) = &args.output_root {
        config.output.data_dir = output_root.clone();
    }

    // Setup logging to both console and the runtime log file
    setup_logging(args.verbose, &config.output.data_dir)?;
    info!("Starting Glossa - Multilingual Prompt Analysis Pipeline");

    let data_root = config.output.data_dir.clone();
    let pipeline = Pipeline::from_config(config);

    if matches!(args.command, Commands::Run { .. } | Commands::Query { .. }) {
        if let Err(e) = pipeline.preflight().await {
            warn!("Model availability check failed: {}", e);
        }
    }

    match args.command {
        Commands::Run { manifest } => match manifest {
            Some(manifest_path) => {
                let manifest = Manifest::from_file(&manifest_path)?;
                info!("Loaded manifest with {} prompts", manifest.prompts.len());

                let reports = pipeline.run_batch(&manifest, &data_root).await?;
                let succeeded = reports.iter().filter(|(_, o)| o.is_success()).count();
                let failed = reports.len() - succeeded;

                for (id, outcome) in &reports {
                    if let PromptOutcome::Failed { stage, cause } = outcome {
                        warn!("Prompt '{}' failed during {}: {}", id, stage, cause);
                    }
                }
                info!("Batch complete: {} succeeded, {} failed", succeeded, failed);
            }
            None => {
                // Single-prompt interactive mode
                let prompt = read_interactive_prompt()?;
                info!("Processing prompt '{}'", prompt.id);

                match pipeline.run_prompt(&prompt, &data_root).await {
                    PromptOutcome::Success { artifacts } => {
                        info!(
                            "Prompt '{}' complete, {} artifacts under {}",
                            prompt.id,
                            artifacts.len(),
                            data_root.join(&prompt.id).display()
                        );
                    }
                    PromptOutcome::Failed { stage, cause } => {
                        anyhow::bail!("Prompt '{}' failed during {}: {}", prompt.id, stage, cause);
                    }
                }
            }
        },
        Commands::Translate { text, dir } => {
            let translations = pipeline.stage_translate(&text, &dir).await?;
            info!("Translated prompt into {} languages", translations.len());
        }
        Commands::Query { dir } => {
            let outputs = pipeline.stage_query(&dir).await?;
            let answered = outputs.values().filter(|o| o.is_some()).count();
            info!("Model answered {}/{} languages", answered, outputs.len());
        }
        Commands::Parse { dir } => {
            let parsed = pipeline.stage_parse(&dir).await?;
            let detected = parsed.values().filter(|p| p.detected_language.is_some()).count();
            info!("Detected code in {}/{} responses", detected, parsed.len());
        }
        Commands::Analyze { dir } => {
            let (summary, charts) = pipeline.stage_summarize(&dir).await?;
            for (language, count) in &summary.counts {
                println!("{:<16} {}", language, count);
            }
            info!("Analysis written, {} charts rendered", charts.len());
        }
    }

    info!("Glossa completed successfully");
    Ok(())
}

/// Read one prompt from standard input with a generated id.
fn read_interactive_prompt() -> Result<Prompt> {
    print!("Enter the prompt to translate: ");
    std::io::stdout().flush()?;

    let mut text = String::new();
    std::io::stdin().read_line(&mut text)?;
    let text = text.trim().to_string();
    if text.is_empty() {
        anyhow::bail!("Empty prompt; aborting");
    }

    let id = format!("prompt-{}", uuid::Uuid::new_v4().simple());
    Ok(Prompt { id, text })
}

/// Setup logging to both console and `<data dir>/llm_runtime.log`
fn setup_logging(verbose: bool, data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;

    // Never-rotating appender keeps the log filename stable across runs
    let file_appender = rolling::never(data_dir, "llm_runtime.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
