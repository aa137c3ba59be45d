//! darkman bridge in debug mode.
//!
//! Connects to darkman, prints the current mode and logs every change
//! together with the editor commands it maps to.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use darkman_bridge::config::{SetupOptions, CONFIG_ENV};
use darkman_bridge::darkman_client::DarkmanClient;
use darkman_bridge::{Mode, Watcher};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let options = load_options()?;
    let client = DarkmanClient::connect().await?;
    let watcher = Watcher::new();

    let mut hook = |mode: Mode| -> Result<()> {
        for action in options.actions_for(mode) {
            info!(%mode, command = %action, "Editor action");
        }
        Ok(())
    };

    let stream = watcher
        .setup_with_hook(&client, &mut hook)
        .await
        .context("darkman setup failed")?;
    info!(mode = %watcher.current_mode()?, "Current mode");

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown requested");
            watcher.shutdown();
        }
        _ = watcher.follow(stream, &mut hook) => {
            info!("Mode relay terminated");
        }
    }

    Ok(())
}

fn load_options() -> Result<SetupOptions> {
    let path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV));

    match path {
        Some(path) => SetupOptions::load(path),
        None => Ok(SetupOptions::default()),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
