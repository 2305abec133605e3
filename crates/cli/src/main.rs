mod config;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use shelter_storage::conformance::run_conformance_suite;
use shelter_storage::MemoryStorage;
use tracing_subscriber::EnvFilter;

use crate::config::ServiceConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Animal shelter adoption service.
#[derive(Parser)]
#[command(name = "shelter", version, about = "Animal shelter adoption service")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP JSON API server
    Serve {
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Port to listen on (overrides config and SHELTER_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the storage conformance suite against the in-memory backend
    Conformance,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => cmd_serve(config, port),
        Commands::Conformance => cmd_conformance(cli.output),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    }
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_serve(config_path: Option<PathBuf>, port: Option<u16>) {
    let mut config = match ServiceConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    if let Some(port) = port {
        config.port = port;
    }
    init_tracing(&config.log_level);

    let rt = runtime();
    if let Err(e) = rt.block_on(serve::start_server(config)) {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}

fn cmd_conformance(output: OutputFormat) {
    let rt = runtime();
    let report = rt.block_on(run_conformance_suite(|| async { MemoryStorage::new() }));

    match output {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: failed to serialize report: {}", e);
                process::exit(1);
            }
        },
    }

    if report.failed > 0 {
        process::exit(1);
    }
}
