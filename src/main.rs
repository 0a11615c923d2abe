use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quizly::cli::{Cli, Commands, OutputFormat};
use quizly::config::Config;
use quizly::error::PipelineError;
use quizly::extractors::FetcherRegistry;
use quizly::output::{self, QuizRecord};
use quizly::pipeline::{PipelineInput, QuizPipeline};
use quizly::quiz::{PromptComposer, ResponseNormalizer, FALLBACK_TITLE};
use quizly::utils;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose { "quizly=debug" } else { "quizly=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let verbose = cli.verbose;

    match cli.command {
        Commands::Generate {
            url,
            output,
            format,
            show_answers,
            api_key,
        } => {
            // Reject bad input before touching config or external tools
            let input = PipelineInput::new(&url)?;

            let mut config = Config::load(cli.config.as_deref()).await?;
            if let Some(key) = api_key.filter(|key| !key.trim().is_empty()) {
                config.gemini.api_key = Some(key);
            }
            if cli.quiet || cli.json_logs {
                config.app.progress = false;
            }

            let missing_deps = utils::check_dependencies(&config).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
            }

            let pipeline = QuizPipeline::new(&config).await?;
            tracing::info!("Generating quiz for URL: {}", input.url());

            let quiz = pipeline
                .run(&input)
                .await
                .map_err(|e| report_pipeline_error(e, verbose))?;
            let record = QuizRecord::new(quiz, Some(input.url().to_string()));

            match output {
                Some(path) => {
                    let path = resolve_output_path(&path, &record, &format);
                    output::save_to_file(&record, &path, &format, show_answers)?;
                    println!("Quiz saved to: {}", path.display());
                }
                None => output::print_to_console(&record, &format, show_answers)?,
            }
        }
        Commands::Normalize { input, title, format } => {
            let config = Config::load(cli.config.as_deref()).await?;
            let raw = read_input(&input)?;
            let title = title.unwrap_or_else(|| FALLBACK_TITLE.to_string());

            let quiz = ResponseNormalizer::from_config(&config.quiz)
                .normalize(&raw, &title)
                .map_err(|e| report_pipeline_error(e.into(), verbose))?;

            output::print_to_console(&QuizRecord::new(quiz, None), &format, true)?;
        }
        Commands::Prompt { input } => {
            let config = Config::load(cli.config.as_deref()).await?;
            let transcript = read_input(&input)?;
            println!("{}", PromptComposer::from_config(&config.quiz).compose(transcript.trim()));
        }
        Commands::Config { show } => {
            let config = Config::load(cli.config.as_deref()).await?;
            if show {
                config.display();
            } else {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Run with --show to print the current settings.");
            }
        }
        Commands::Check => {
            let config = Config::load(cli.config.as_deref()).await?;
            let registry = FetcherRegistry::new(&config.fetch)?;
            println!("Fetchers: {}", registry.list_platforms().join(", "));

            let missing = utils::check_dependencies(&config).await;
            if missing.is_empty() {
                println!("✅ All external tools are available");
            } else {
                println!("Missing tools:");
                for dep in &missing {
                    println!("   • {}", dep);
                }
                anyhow::bail!("{} required tool(s) missing", missing.len());
            }
        }
    }

    Ok(())
}

/// Print raw diagnostics in verbose mode and turn the error into a one-line failure
fn report_pipeline_error(err: PipelineError, verbose: bool) -> anyhow::Error {
    if verbose {
        if let Some(raw) = &err.raw {
            eprintln!("--- raw diagnostic output ({}) ---\n{}\n---", err.stage, raw);
        }
    }
    anyhow::Error::new(err)
}

/// Read a file, or stdin when the path is `-`
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        return Ok(buffer);
    }

    fs_err::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// A directory target gets a file named after the quiz title
fn resolve_output_path(path: &Path, record: &QuizRecord, format: &OutputFormat) -> PathBuf {
    if !path.is_dir() {
        return path.to_path_buf();
    }

    let stem = utils::sanitize_filename(&record.quiz.title);
    let stem = if stem.is_empty() { "quiz".to_string() } else { stem };
    path.join(format!("{}.{}", stem, format.extension()))
}
