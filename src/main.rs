// src/main.rs
// Mnemo - Semantic Memory Core for AI agents

use anyhow::Result;
use clap::{Parser, Subcommand};
use mnemo::config::Config;
use mnemo::state::AppState;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "mnemo", about = "Semantic Memory Core for AI agents", version)]
struct Cli {
    /// Path to config.json
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP + MCP server (default)
    Serve,
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run one decay pass against the configured store and exit
    DecayTick,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real keys come from the environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = std::env::var("MNEMO_LOG")
        .ok()
        .and_then(|level| match level.to_lowercase().as_str() {
            "error" => Some(Level::ERROR),
            "warn" => Some(Level::WARN),
            "info" => Some(Level::INFO),
            "debug" => Some(Level::DEBUG),
            "trace" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let config = Config::load(&cli.config);

    match cli.command {
        None | Some(Commands::Serve) => {
            let state = AppState::from_config(config)?;
            mnemo::server::serve(state).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            }
        },
        Some(Commands::DecayTick) => {
            let state = AppState::from_config(config)?;
            let (aged, demoted) = state.memory.decay_pass().await?;
            println!("decay pass: {aged} aged, {demoted} demoted");
        }
    }

    Ok(())
}
