mod changes;
mod cli;
mod config;
mod exclude;
mod plan;
mod session;
mod supervisor;
mod transfer;
mod watcher;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

use cli::Cli;
use config::SyncConfig;
use supervisor::{ShutdownFlag, Supervisor};

#[tokio::main]
async fn main() -> Result<()> {
    // Bad arguments are the only fatal error class; everything after this
    // point self-heals.
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%H:%M:%S".to_string()))
        .with_target(false)
        .init();

    let config = SyncConfig::from_cli(cli)?;
    info!(
        "mirroring {} -> {}",
        config.local_dir.display(),
        config.remote_path()
    );

    let shutdown = ShutdownFlag::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            interrupt.request();
        }
    });

    Supervisor::new(config, shutdown).run().await
}
