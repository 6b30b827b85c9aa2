use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use vjudger::config::load_config;
use vjudger::node;

/// Virtual judger node: relays dispatcher jobs to remote online judges
#[derive(Parser)]
#[command(name = "vjudger")]
#[command(version)]
#[command(about = "Relays dispatcher jobs to remote online judges and reports verdicts")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "vjudger.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let settings = match load_config(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}: {}", cli.config.display(), e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!(target: "vjudger", "interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => log::error!(target: "vjudger", "failed to listen for Ctrl-C: {}", e),
        }
    });

    node::run(settings, cancel).await;
}
