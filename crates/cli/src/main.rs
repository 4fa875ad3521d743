mod commands;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use yinyang_lineage::{ChainPolicy, LineageConfig};
use yinyang_storage::InMemoryRecordStore;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Chain policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Maximal,
    Raw,
}

impl From<PolicyArg> for ChainPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Maximal => ChainPolicy::Maximal,
            PolicyArg::Raw => ChainPolicy::Raw,
        }
    }
}

/// yinyang admin reporting tool.
#[derive(Parser)]
#[command(
    name = "yinyang",
    version,
    about = "yinyang admin reporting over generation records"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a TOML lineage config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct derivation chains from a record snapshot
    Chains {
        /// Path to the JSON record snapshot
        #[arg(long)]
        records: PathBuf,
        /// Which chains to keep (overrides the config file)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// List distinct input images, most recent first
    Inputs {
        /// Path to the JSON record snapshot
        #[arg(long)]
        records: PathBuf,
    },

    /// Show the good/bad outputs of every request made against one input image
    Variants {
        /// Path to the JSON record snapshot
        #[arg(long)]
        records: PathBuf,
        /// Input image URL
        input_url: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    tracing::debug!(
        image_origin = %config.image_origin,
        chain_policy = ?config.chain_policy,
        signal = ?config.signal,
        "lineage config loaded"
    );

    match cli.command {
        Commands::Chains { records, policy } => {
            if let Some(policy) = policy {
                config.chain_policy = policy.into();
            }
            commands::chains::cmd_chains(&records, config, cli.output, cli.quiet);
        }
        Commands::Inputs { records } => {
            commands::inputs::cmd_inputs(&records, cli.output, cli.quiet);
        }
        Commands::Variants { records, input_url } => {
            commands::variants::cmd_variants(&records, &input_url, &config, cli.output, cli.quiet);
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins; otherwise warnings
/// only, or errors only with `--quiet`.
fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<LineageConfig, String> {
    let base = match path {
        Some(p) => LineageConfig::from_file(p).map_err(|e| format!("config error: {}", e))?,
        None => LineageConfig::default(),
    };
    base.with_env().map_err(|e| format!("config error: {}", e))
}

/// Load a record snapshot, exiting on failure.
pub(crate) fn load_store(path: &Path, output: OutputFormat, quiet: bool) -> InMemoryRecordStore {
    match InMemoryRecordStore::load_snapshot(path) {
        Ok(store) => store,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

/// Build the runtime the async lineage calls run on, exiting on failure.
pub(crate) fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Print a JSON value, pretty.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization error: {}\"}}", e));
    println!("{}", pretty);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
