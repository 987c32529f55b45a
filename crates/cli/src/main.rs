use std::{
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod run;

const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

#[derive(Clone, Debug)]
pub struct Context {
    /// The env file that was loaded, if one was found
    pub env_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Relay - versioned key-value relay over HTTP", long_about = None)]
struct Opts {
    /// Path to an env file loaded before reading RELAY_* variables
    #[arg(long = "env-file", global = true, default_value = "./.env")]
    env_file: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Start the relay server
    Run(run::RunCommand),
}

#[tokio::main]
async fn main() {
    let opts = parse_opts();

    // RELAY_* arguments are read from the environment, so parse again once
    // the env file is loaded.
    let env_file = load_env_file(&opts.env_file);
    let opts = if env_file.is_some() { parse_opts() } else { opts };

    init_tracing();

    let ctx = Context { env_file };

    if let Err(e) = handle_command(opts, &ctx).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn parse_opts() -> Opts {
    match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();
}

/// Load environment variables from the given env file.
///
/// Variables already set in the process environment win over the file.
fn load_env_file(env_file_path: &Path) -> Option<PathBuf> {
    match dotenvy::from_path(env_file_path) {
        Ok(_) => {
            eprintln!("✓ Loaded environment from {}", env_file_path.display());
            Some(env_file_path.to_path_buf())
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load env file at {}: {}",
                env_file_path.display(),
                e
            );
            None
        }
    }
}

async fn handle_command(opts: Opts, ctx: &Context) -> Result<(), String> {
    match opts.command {
        Command::Run(cmd) => cmd.execute(ctx).await.map_err(|e| e.to_string()),
    }
}
