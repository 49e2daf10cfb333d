//! Harvest CLI

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use harvest::event::RecordedEvent;
use harvest::har::{write_document, BuildOptions, HarAssembler, HarDocument, MessageHarBuilder};
use harvest::protocol::{MemorySession, ProtocolSession};
use harvest::{Config, HarRecorder, StartOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Invocation {
    input: PathBuf,
    output: Option<PathBuf>,
    config: Config,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let result = match command {
        "assemble" | "replay" => match parse_invocation(command, &args[2..]) {
            Ok(invocation) => {
                init_logging(&invocation.config);
                if command == "assemble" {
                    assemble(invocation).await
                } else {
                    replay(invocation).await
                }
            }
            Err(e) => Err(e),
        },
        "check-config" => {
            if args.len() < 3 {
                eprintln!("Usage: harvest check-config <FILE>");
                process::exit(1);
            }
            check_config(Path::new(&args[2]))
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'harvest' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn usage() {
    eprintln!("Harvest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: harvest <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  assemble <events.json> [output.har] [--config FILE]");
    eprintln!("            Build a HAR from a captured {{method, params}} log");
    eprintln!("  replay <events.json> [output.har] [--config FILE]");
    eprintln!("            Drive a recording session with a captured log");
    eprintln!("  check-config <FILE>");
    eprintln!("            Validate a configuration file");
}

fn parse_invocation(command: &str, args: &[String]) -> anyhow::Result<Invocation> {
    let mut positional = Vec::new();
    let mut config = Config::default();

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let Some(path) = args.next() else {
                bail!("--config requires a file argument");
            };
            config = Config::from_file(Path::new(path))
                .with_context(|| format!("Loading config {path}"))?;
        } else {
            positional.push(PathBuf::from(arg));
        }
    }

    let mut positional = positional.into_iter();
    let Some(input) = positional.next() else {
        bail!("Usage: harvest {command} <events.json> [output.har] [--config FILE]");
    };
    let output = positional.next();
    if positional.next().is_some() {
        bail!("Too many arguments for {command}");
    }

    Ok(Invocation {
        input,
        output,
        config,
    })
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_events(path: &Path) -> anyhow::Result<Vec<RecordedEvent>> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Reading {}", path.display()))?;
    let events: Vec<RecordedEvent> = serde_json::from_slice(&data)
        .with_context(|| format!("Parsing event log {}", path.display()))?;
    info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

async fn emit(document: &HarDocument, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => write_document(path, document)
            .await
            .with_context(|| format!("Writing {}", path.display())),
        None => {
            println!("{}", serde_json::to_string_pretty(document)?);
            Ok(())
        }
    }
}

async fn assemble(invocation: Invocation) -> anyhow::Result<()> {
    let events = load_events(&invocation.input).await?;
    let builder = MessageHarBuilder::from_config(&invocation.config.har);
    let document = builder.build(&events, BuildOptions { include_body: true })?;
    emit(&document, invocation.output.as_deref()).await
}

/// Bodies are only available inline in the log, so body capture is off.
async fn replay(invocation: Invocation) -> anyhow::Result<()> {
    let events = load_events(&invocation.input).await?;
    let session = Arc::new(MemorySession::new());

    let mut recorder = HarRecorder::new(invocation.config);
    let options = StartOptions {
        path: invocation.output.clone(),
        save_response: Some(false),
        capture_mime_types: None,
    };
    recorder
        .start(Arc::clone(&session) as Arc<dyn ProtocolSession>, options)
        .await?;
    session.replay(&events);

    if let Some(document) = recorder.stop().await? {
        emit(&document, None).await?;
    }
    Ok(())
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config =
        Config::from_file(path).with_context(|| format!("Loading config {}", path.display()))?;
    println!("{} is valid", path.display());
    println!(
        "  body capture: {}, retry: {} attempts every {} ms ({:?} drain)",
        config.capture.body_capture,
        config.retry.max_attempts,
        config.retry.delay_ms,
        config.retry.drain
    );
    Ok(())
}
