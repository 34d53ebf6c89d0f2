//! Hearth CLI
//!
//! One-shot commands for operators and cron.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hearth::config::{init_logging, ConfigArgs};
use hearth::{HearthRuntime, SweepRequest};

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Hearth snapshot sync and inspection")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe local services and print the mode
    Health,
    /// Print sync readiness and last successful syncs
    Status,
    /// Probe, then run one sweep. Exits non-zero if rejected or any service failed.
    Sync {
        /// Only these services (repeatable)
        #[arg(short, long = "service")]
        services: Vec<String>,
        /// Include services that need an interactive login
        #[arg(long)]
        include_authenticated: bool,
    },
    /// Print the latest stored snapshot for a key
    Snapshot {
        /// Snapshot key, e.g. lighting.all-status
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.config.log_json);

    let runtime = HearthRuntime::from_config(cli.config.into_config(None))?;

    match cli.command {
        Commands::Health => {
            runtime.probe().probe_registered().await;
            println!("{}", serde_json::to_string_pretty(&runtime.mode().mode_info())?);
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&runtime.sync_status().await)?);
        }
        Commands::Sync {
            services,
            include_authenticated,
        } => {
            runtime.probe().probe_indicators().await;

            let request = SweepRequest {
                services: (!services.is_empty()).then_some(services),
                include_authenticated,
            };
            match runtime.scheduler().trigger_now(request).await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    if !report.success() {
                        return Ok(ExitCode::FAILURE);
                    }
                }
                Err(e) => {
                    eprintln!("Sync rejected: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Snapshot { key } => match runtime.store().get(&key).await? {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => {
                eprintln!("No snapshot for {}", key);
                return Ok(ExitCode::FAILURE);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
