//! leash CLI binary
//!
//! Command-line interface for the leash daemon HTTP API.

use clap::{Parser, Subcommand};
use cli::{parse_env_pair, CliError, Client};
use schema::{ClientConfig, OwnerId, SubprocessId, DEFAULT_PORT};
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "leash")]
#[command(about = "Spawn and stop processes that die with their owner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon host
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Daemon port
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List managed subprocesses by owner
    List,
    /// Spawn a subprocess tied to an owner process
    Spawn {
        /// Owner pid (defaults to the pid of the calling shell)
        #[arg(long)]
        owner: Option<OwnerId>,
        /// Environment for the subprocess; nothing else is inherited
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Stop a managed subprocess
    Stop {
        /// Owner pid (defaults to the pid of the calling shell)
        #[arg(long)]
        owner: Option<OwnerId>,
        /// Subprocess pid
        subproc_pid: SubprocessId,
    },
}

/// Pid of the shell or program that invoked us
#[cfg(unix)]
fn default_owner() -> Option<OwnerId> {
    Some(std::os::unix::process::parent_id())
}

#[cfg(not(unix))]
fn default_owner() -> Option<OwnerId> {
    None
}

fn resolve_owner(owner: Option<OwnerId>) -> cli::Result<OwnerId> {
    owner.or_else(default_owner).ok_or_else(|| {
        CliError::InvalidArgument("--owner is required on this platform".to_string())
    })
}

async fn run(cli: Cli) -> cli::Result<()> {
    let client = Client::new(ClientConfig {
        daemon_host: cli.host,
        daemon_port: cli.port,
        timeout_seconds: cli.timeout,
    });

    match cli.command {
        Commands::List => {
            let listing = client.list().await?;
            if listing.is_empty() {
                println!("No managed subprocesses");
            }
            for (owner, pids) in listing {
                let pids: Vec<String> = pids.iter().map(ToString::to_string).collect();
                println!("{}: {}", owner, pids.join(" "));
            }
        }
        Commands::Spawn {
            owner,
            env,
            command,
        } => {
            let mut parts = command.into_iter();
            let program = parts
                .next()
                .ok_or_else(|| CliError::InvalidArgument("missing command".to_string()))?;
            let owner = resolve_owner(owner)?;
            let pid = client
                .spawn(owner, program, parts.collect(), env.into_iter().collect())
                .await?;
            println!("{}", pid);
        }
        Commands::Stop { owner, subproc_pid } => {
            let owner = resolve_owner(owner)?;
            if !client.stop(owner, subproc_pid).await? {
                return Err(CliError::CommandFailed(format!(
                    "process {} has no subprocess {}",
                    owner, subproc_pid
                )));
            }
            println!("Stopping {}", subproc_pid);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} ({})", e, e.code());
            ExitCode::FAILURE
        }
    }
}
