// Command-line entry point for thunktrace.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use thunktrace::api::server;
use thunktrace::application::ReplayUsecase;
use thunktrace::domain::tracer::TracerConfig;
use thunktrace::infrastructure::JsonLinesEventSource;
use thunktrace::ports::depgraph_exporter::TextGraphExporter;
use thunktrace::ports::trace_exporter::CsvTraceExporter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a recorded JSON-lines event log and write the trace outputs
    Replay {
        /// Event log file (one JSON event per line)
        #[arg(short, long)]
        events: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Accept JSON-lines events over TCP and finalize on process exit
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8765)]
        port: u16,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output directory for trace artifacts
    #[arg(short, long, default_value = "trace_output")]
    output_dir: PathBuf,

    /// Name of the package under analysis
    #[arg(long, default_value = "")]
    package: String,

    /// Run name, used in output file names
    #[arg(short, long, default_value = "run")]
    name: String,

    /// Optional TOML config file; CLI flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print per-event progress
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Replay { events, output } => run_replay(&events, output),
        Command::Serve { port, output } => run_serve(port, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run_replay(events: &std::path::Path, output: OutputArgs) -> Result<()> {
    let config = build_config(output)?;
    let mut source = JsonLinesEventSource::open(events)?;
    let usecase = ReplayUsecase {
        trace_exporter: &CsvTraceExporter,
        graph_exporter: &TextGraphExporter,
    };

    let outcome = usecase.run(&mut source, config)?;
    println!(
        "Replay completed: {} events, {} distinct traces, {} dependency edges (exit code {})",
        outcome.events, outcome.traces, outcome.dependency_edges, outcome.error_code
    );
    Ok(())
}

fn run_serve(port: u16, output: OutputArgs) -> Result<()> {
    let config = build_config(output)?;
    server::start_server(port, config)
}

/// CLI flags layered over the optional TOML config file, flags winning.
fn build_config(output: OutputArgs) -> Result<TracerConfig> {
    let mut config = TracerConfig::default();

    if let Some(path) = &output.config {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;
        let parsed: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))?;

        if let Some(dir) = parsed.get("output_dir").and_then(|v| v.as_str()) {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(package) = parsed.get("package").and_then(|v| v.as_str()) {
            config.package_under_analysis = package.to_string();
        }
        if let Some(name) = parsed.get("name").and_then(|v| v.as_str()) {
            config.analyzed_file_name = name.to_string();
        }
        if let Some(verbose) = parsed.get("verbose").and_then(|v| v.as_bool()) {
            config.verbose = verbose;
        }
        if let Some(truncate) = parsed.get("truncate").and_then(|v| v.as_bool()) {
            config.truncate = truncate;
        }
        if let Some(binary) = parsed.get("binary").and_then(|v| v.as_bool()) {
            config.binary = binary;
        }
        if let Some(level) = parsed.get("compression_level").and_then(|v| v.as_integer()) {
            config.compression_level = level as i32;
        }
    }

    if output.output_dir != PathBuf::from("trace_output") {
        config.output_dir = output.output_dir;
    } else if output.config.is_none() {
        config.output_dir = output.output_dir;
    }
    if !output.package.is_empty() {
        config.package_under_analysis = output.package;
    }
    if output.name != "run" {
        config.analyzed_file_name = output.name;
    }
    if output.verbose {
        config.verbose = true;
    }

    Ok(config)
}
