#![forbid(unsafe_code)]

mod cli;
mod config;
mod constants;
mod ipc;
mod jsonc;
mod notify;
mod persistence;
mod switcher;
mod tree;

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use config::Paths;
use constants::env;
use jsonc::FormatOptions;
use notify::LogNotifier;
use persistence::DocumentStore;
use switcher::ModeSwitcher;

fn init_logging() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var(env::LOG_LEVEL)
        .unwrap_or_else(|_| "warn".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "info" => TraceLevel::INFO,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::WARN,
    };

    // stdout carries results, logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let paths = Paths::resolve(cli.config_dir.as_deref());
    info!(config_dir = %paths.config_dir().display(), command = ?cli.command, "Starting");

    let mut switcher = ModeSwitcher::new(
        paths,
        DocumentStore::new(FormatOptions::default()),
        Arc::new(LogNotifier),
    );
    let state = switcher.initialize().await;

    match cli.command {
        Commands::Switch { mode } => println!("{}", switcher.switch(&mode).await),
        Commands::Status => println!("{}", switcher.status().await),
        Commands::List => println!("{}", switcher.list().await),
        Commands::Init => match state {
            Some(state) => println!("Current mode: {}", state.current_mode),
            None => println!("error: plugin state could not be loaded"),
        },
        Commands::Serve => {
            let mut stdin = tokio::io::stdin();
            let mut stdout = tokio::io::stdout();
            if let Err(e) = ipc::serve(&mut switcher, &mut stdin, &mut stdout).await {
                error!(error = %format!("{e:#}"), "Tool loop failed");
                return Err(e);
            }
        }
    }
    std::io::stdout().flush()?;

    // Let pending notifications run before the runtime shuts down
    tokio::task::yield_now().await;
    Ok(())
}
