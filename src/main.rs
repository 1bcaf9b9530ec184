use anyhow::Result;
use clap::{Parser, Subcommand};
use firesentry::config::Config;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "firesentry",
    about = "Multi-source fire detection and alert escalation for remote sites",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitor daemon
    Run {
        /// Path to the TOML configuration file
        #[arg(long, default_value = "firesentry.toml")]
        config: PathBuf,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to the TOML configuration file
        #[arg(long, default_value = "firesentry.toml")]
        config: PathBuf,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List the configured source inventory
    Sources {
        /// Path to the TOML configuration file
        #[arg(long, default_value = "firesentry.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = Config::load(&config)?;
            tracing::info!("Starting firesentry daemon");

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received; shutting down");
                    signal_token.cancel();
                }
            });

            firesentry::run(config, shutdown).await?;
        }
        Commands::CheckConfig { config, json } => {
            let loaded = Config::load(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&loaded)?);
            } else {
                println!("Configuration OK");
                println!(
                    "  poll interval : {}s",
                    loaded.monitor.poll_interval_seconds
                );
                println!(
                    "  thresholds    : temp {}/{} C, smoke {}/{}",
                    loaded.thresholds.temp_low,
                    loaded.thresholds.temp_high,
                    loaded.thresholds.smoke_low,
                    loaded.thresholds.smoke_high
                );
                println!(
                    "  alerts        : confirm={} clear={} cooldown={}s escalation={}s",
                    loaded.alerts.confirm_count,
                    loaded.alerts.clear_count,
                    loaded.alerts.cooldown_seconds,
                    loaded.alerts.escalation_delay_seconds
                );
                println!(
                    "  dispatch      : retries={} channels={}",
                    loaded.dispatch.max_retries,
                    loaded.dispatch.channels.join(",")
                );
                println!("  sources       : {}", loaded.sources.len());
            }
        }
        Commands::Sources { config } => {
            let loaded = Config::load(&config)?;
            if loaded.sources.is_empty() {
                println!("No sources configured.");
            } else {
                println!("{:<20} | Kind", "Id");
                println!("{:-<20}-|-{:-<15}", "", "");
                for entry in &loaded.sources {
                    println!("{:<20} | {}", entry.id, entry.kind);
                }
            }
        }
    }

    Ok(())
}
