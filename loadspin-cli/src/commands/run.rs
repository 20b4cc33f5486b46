//! `loadspin run` command - Start the controller and the HTTP API.
//!
//! Configuration and initial store connection failures are fatal. Ctrl+C
//! stops the API, cancels every worker and waits for the controller to exit.

use std::sync::Arc;

use tokio::sync::mpsc;

use loadspin_core::config::ScalingMode;
use loadspin_core::scaling::TargetSource;
use loadspin_core::{repo, CommandInjector, ConfigLoader, Controller, ScalingSignal, ScalingSource};

use crate::api::{self, ApiState};

/// Scaling signals buffered between the active source and the controller.
const SIGNAL_CAPACITY: usize = 16;

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config = %config_path, "Starting loadspin");

    // Load and validate configuration - fail fast on invalid config
    let config = ConfigLoader::load_file(config_path)?;

    tracing::info!(
        region = %config.region,
        mode = config.mode.name(),
        repo = config.repo.kind.name(),
        "Configuration validated successfully"
    );

    let repo = repo::connect(&config.repo, &config.region).await?;

    let (signals_tx, signals_rx) = mpsc::channel(SIGNAL_CAPACITY);
    let (controller, handle) = Controller::new(&config, Arc::clone(&repo), signals_rx)?;
    let controller_task = tokio::spawn(controller.run());

    let injector = match config.mode {
        ScalingMode::Command => {
            let (injector, source) = CommandInjector::channel(config.command.injection_capacity);
            spawn_source(Box::new(source), signals_tx);
            Some(injector)
        }
        ScalingMode::Target => {
            let source = TargetSource::new(
                repo,
                config.region.clone(),
                handle.clone(),
                config.target.clone(),
            );
            spawn_source(Box::new(source), signals_tx);
            None
        }
    };

    let stop = handle.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        tracing::info!("Shutting down");
        stop.shutdown();
    };

    api::serve(config.listen_addr, ApiState::new(handle, injector), shutdown).await?;
    controller_task.await?;

    tracing::info!("Loadspin stopped");
    Ok(())
}

fn spawn_source(source: Box<dyn ScalingSource>, signals: mpsc::Sender<ScalingSignal>) {
    let name = source.name();
    tracing::info!(source = name, "Starting scaling source");

    tokio::spawn(async move {
        source.run(signals).await;
        tracing::debug!(source = name, "Scaling source exited");
    });
}
