use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotart_contracts::events::EventWriter;
use dotart_contracts::runs::receipts::write_receipt;
use dotart_engine::adapters::list_foundation_models;
use dotart_engine::{local_generate, ConvertError, EngineConfig, Orchestrator};
use serde_json::{json, Map, Value};

#[derive(Debug, Parser)]
#[command(
    name = "dotart",
    version,
    about = "Turn a photo into a 32x32, 16-color pixel-art pattern"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert one image into pixel art.
    Convert(ConvertArgs),
    /// Print the configured backend chain.
    Backends(BackendsArgs),
    /// Check that Bedrock credentials can list foundation models.
    Check,
}

#[derive(Debug, Parser)]
struct ConvertArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    /// Skip every backend and reduce the photo locally.
    #[arg(long)]
    local: bool,
    /// Overrides the content type guessed from the input extension.
    #[arg(long)]
    content_type: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    receipt: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct BackendsArgs {
    #[arg(long)]
    json: bool,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("dotart error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    match cli.command {
        Command::Convert(args) => run_convert(args, &config),
        Command::Backends(args) => run_backends(args, &config),
        Command::Check => run_check(&config),
    }
}

fn run_convert(args: ConvertArgs, config: &EngineConfig) -> Result<i32> {
    let source =
        fs::read(&args.input).with_context(|| format!("failed reading {}", args.input.display()))?;
    let content_type = args
        .content_type
        .clone()
        .or_else(|| mime_for_path(&args.input).map(str::to_string));

    if args.local {
        let art = match local_generate(&source) {
            Ok(art) => art,
            Err(err) => return Ok(report_rejection(&args.input, &err)),
        };
        write_output(&args.out, art.bytes())?;
        println!(
            "Wrote {} ({}, local, {} colors)",
            args.out.display(),
            art.format().mime_type(),
            art.palette_size()
        );
        return Ok(0);
    }

    let mut orchestrator = Orchestrator::from_config(config)?;
    if let Some(events_path) = args.events.as_ref() {
        orchestrator = orchestrator.with_events(EventWriter::new(events_path));
    }
    let outcome = match orchestrator.convert_to_pixel_art(&source, content_type.as_deref()) {
        Ok(outcome) => outcome,
        Err(err) => return Ok(report_rejection(&args.input, &err)),
    };

    write_output(&args.out, outcome.art.bytes())?;
    if let Some(receipt_path) = args.receipt.as_ref() {
        write_receipt(
            receipt_path,
            &outcome.receipt(),
            Some(&receipt_extra(&args.input, &args.out)),
        )?;
    }
    println!(
        "Wrote {} ({}, {}, {} colors)",
        args.out.display(),
        outcome.art.format().mime_type(),
        outcome.backend.as_deref().unwrap_or("local"),
        outcome.art.palette_size()
    );
    Ok(0)
}

/// Exit code 2 is a rejected upload; anything else is an internal error.
fn report_rejection(input: &Path, err: &ConvertError) -> i32 {
    eprintln!("dotart: {}: {err}", input.display());
    if err.is_invalid_image() {
        2
    } else {
        1
    }
}

fn run_backends(args: BackendsArgs, config: &EngineConfig) -> Result<i32> {
    let registry = config.backend_registry();
    if args.json {
        let rows: Vec<Value> = registry
            .list()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&Value::Array(rows))?);
        return Ok(0);
    }
    for (idx, backend) in registry.list().enumerate() {
        let note = if backend.generative {
            ""
        } else {
            " (skipped: cannot generate images)"
        };
        println!("{}. {} [{}]{note}", idx + 1, backend.id, backend.kind);
    }
    println!("{}. local reduction", registry.len() + 1);
    Ok(0)
}

fn run_check(config: &EngineConfig) -> Result<i32> {
    let models = match list_foundation_models(config) {
        Ok(models) => models,
        Err(err) => {
            eprintln!("Bedrock connection failed ({}): {err:#}", config.region);
            return Ok(1);
        }
    };
    println!("Bedrock connection ok ({})", config.region);
    println!("Available models: {}", models.len());
    for model in models
        .iter()
        .filter(|model| model.model_id.to_ascii_lowercase().contains("stability"))
    {
        println!("  {} - {}", model.model_id, model.model_name);
    }
    let chain = config.backend_registry();
    for backend in chain.list().filter(|backend| backend.generative) {
        if !models.iter().any(|model| model.model_id == backend.id) {
            println!("  warning: {} is not listed for this account", backend.id);
        }
    }
    Ok(0)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn receipt_extra(input: &Path, out: &Path) -> Map<String, Value> {
    json!({
        "input_path": input.to_string_lossy(),
        "output_path": out.to_string_lossy(),
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "txt" | "md" => Some("text/plain"),
        "json" => Some("application/json"),
        _ => None,
    }
}
