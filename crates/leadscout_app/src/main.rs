//! Leadscout agent: polls the task backend, opens people searches in a
//! browser tab and reports the recruiter contacts found there.
mod runtime;

use std::sync::Arc;

use anyhow::Context;
use leadscout_engine::{
    ensure_state_dir, ChromeNavigator, Coordinator, PendingStore, ReqwestBackend,
};
use scout_logging::{scout_info, scout_warn};
use tokio::io::BufReader;

use runtime::config::{config_path_from_args, ScoutConfig};
use runtime::console::StatusRelay;
use runtime::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path_from_args(std::env::args());
    let config = ScoutConfig::load(&config_path)?;
    ensure_state_dir(&config.state_dir)
        .with_context(|| format!("preparing state directory {:?}", config.state_dir))?;
    logging::initialize(config.log_destination, &config.state_dir);
    scout_info!("Configuration loaded from {:?}", config_path);

    let coordinator_settings = config.coordinator_settings()?;
    let backend = ReqwestBackend::new(config.backend_settings())
        .context("building backend client")?;
    let navigator = ChromeNavigator::launch(&config.chrome_settings())
        .await
        .context("launching browser")?;
    let store = PendingStore::new(config.state_dir.clone());

    let (handle, coordinator) = Coordinator::spawn(
        coordinator_settings,
        Arc::new(backend),
        Arc::new(navigator),
        store,
    );
    if config.autostart {
        handle.start().await.context("starting poller")?;
    }

    let relay = StatusRelay::new(handle.clone(), config.status_refresh());
    tokio::select! {
        _ = relay.run(BufReader::new(tokio::io::stdin())) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                scout_warn!("Failed to listen for ctrl-c: {}", err);
            }
        }
    }

    handle.shutdown().await;
    if let Err(err) = coordinator.await {
        scout_warn!("Coordinator task ended abnormally: {}", err);
    }
    scout_info!("Leadscout stopped");
    Ok(())
}
