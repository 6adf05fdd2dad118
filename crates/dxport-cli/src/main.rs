//! dxport entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dxport_core::{ExportConfig, ExportOrchestrator};
use dxport_kernel::MemorySession;

/// Export every body of the given parts to its own annotated DXF file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Part files to export (RON part models)
    #[arg(value_name = "PART", required = true)]
    parts: Vec<PathBuf>,

    /// Export configuration (RON); defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory receiving the DXF files
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Exporter settings file
    #[arg(short, long, value_name = "FILE")]
    settings_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dxport_cli=info,dxport_core=info,dxport_kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match ExportConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ExportConfig::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(file) = args.settings_file {
        config.settings_file = file;
    }

    let mut session = MemorySession::new();
    let report = match ExportOrchestrator::new(&mut session, config) {
        Ok(mut orchestrator) => orchestrator.process_batch(args.parts.as_slice()),
        Err(e) => {
            tracing::error!("Cannot start export: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    for (path, result) in &report.results {
        match result {
            Ok(part) => {
                println!("✓ {} ({} files)", path.display(), part.bodies.len());
                for body in &part.bodies {
                    println!("    {}", body.output.display());
                }
            }
            Err(e) => println!("✗ {}: {}", path.display(), e),
        }
    }
    println!();
    println!(
        "{} parts exported, {} failed, {} files written",
        report.succeeded(),
        report.failed(),
        report.files_written()
    );

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
