// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Worker-pool controller.
//!
//! One task owns pool membership and the published score. It multiplexes:
//! - latency reports from workers, pushed into the ring
//! - scaling signals, reduced to single grow/shrink steps
//! - a fixed ticker that scores the ring and publishes the result
//!
//! Readers go through a [`ControllerHandle`], which only takes the read lock.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::apdex;
use crate::config::{Config, ControllerSettings, WorkerConfig};
use crate::error::HardValidationError;
use crate::pool::WorkerPool;
use crate::repo::Repo;
use crate::ring::LatencyRing;
use crate::scaling::{ScalingCommand, ScalingSignal};
use crate::scenario::{RegionMap, ResizeStep, Scenario};
use crate::types::Region;
use crate::worker::{Worker, WorkerHandle};

/// Point-in-time view of the controller for the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub score: f64,
    pub requests_last_second: u64,
    pub workers: usize,
}

#[derive(Debug, Default)]
struct SharedState {
    pool: WorkerPool,
    score: f64,
    requests_last_second: u64,
}

/// Cloneable read-side handle.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    shared: Arc<RwLock<SharedState>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ControllerHandle {
    /// Last published score.
    pub async fn score(&self) -> f64 {
        self.shared.read().await.score
    }

    pub async fn pool_size(&self) -> usize {
        self.shared.read().await.pool.len()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let shared = self.shared.read().await;
        ControllerSnapshot {
            score: shared.score,
            requests_last_second: shared.requests_last_second,
            workers: shared.pool.len(),
        }
    }

    /// Cancel every worker and stop the controller loop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// The coordination loop. Build with [`Controller::new`], then `run` it on its
/// own task.
pub struct Controller {
    region: Region,
    regions: RegionMap,
    repo: Arc<dyn Repo>,
    worker: WorkerConfig,
    score_interval: Duration,
    shared: Arc<RwLock<SharedState>>,
    ring: LatencyRing,
    requests: u64,
    reports_tx: mpsc::Sender<Duration>,
    reports_rx: mpsc::Receiver<Duration>,
    signals: mpsc::Receiver<ScalingSignal>,
    shutdown: watch::Receiver<bool>,
}

impl Controller {
    pub fn new(
        config: &Config,
        repo: Arc<dyn Repo>,
        signals: mpsc::Receiver<ScalingSignal>,
    ) -> Result<(Self, ControllerHandle), HardValidationError> {
        Self::with_settings(
            config.region.clone(),
            config.regions.clone(),
            &config.controller,
            config.worker.clone(),
            repo,
            signals,
        )
    }

    pub fn with_settings(
        region: Region,
        regions: RegionMap,
        settings: &ControllerSettings,
        worker: WorkerConfig,
        repo: Arc<dyn Repo>,
        signals: mpsc::Receiver<ScalingSignal>,
    ) -> Result<(Self, ControllerHandle), HardValidationError> {
        let ring = LatencyRing::new(settings.ring_capacity)?;
        if settings.report_capacity == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "report_capacity",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let (reports_tx, reports_rx) = mpsc::channel(settings.report_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(RwLock::new(SharedState::default()));

        let handle = ControllerHandle {
            shared: Arc::clone(&shared),
            shutdown: Arc::new(shutdown_tx),
        };

        let controller = Self {
            region,
            regions,
            repo,
            worker,
            score_interval: settings.score_interval,
            shared,
            ring,
            requests: 0,
            reports_tx,
            reports_rx,
            signals,
            shutdown: shutdown_rx,
        };

        Ok((controller, handle))
    }

    /// Run until [`ControllerHandle::shutdown`] is called or every handle is
    /// dropped. All workers are cancelled on exit.
    pub async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.score_interval, self.score_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut signals_open = true;

        tracing::info!(region = %self.region, "Controller started");

        loop {
            tokio::select! {
                Some(latency) = self.reports_rx.recv() => {
                    self.requests += 1;
                    self.ring.push(latency);
                }
                signal = self.signals.recv(), if signals_open => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => {
                        tracing::debug!("Scaling signal stream closed");
                        signals_open = false;
                    }
                },
                _ = ticker.tick() => self.publish().await,
                _ = self.shutdown.changed() => break,
            }
        }

        let stopped = self.shared.write().await.pool.cancel_all();
        tracing::info!(workers = stopped, "Controller stopped");
    }

    async fn handle_signal(&mut self, signal: ScalingSignal) {
        match signal {
            ScalingSignal::Command(command) => self.handle_command(command).await,
            ScalingSignal::Step { step, done } => {
                self.apply(step).await;
                let _ = done.send(());
            }
        }
    }

    async fn handle_command(&mut self, command: ScalingCommand) {
        let ScalingCommand { scenario, ack } = command;

        let resolved = self
            .regions
            .resolve(&scenario)
            .map(|(region, step)| (region.clone(), step));

        match resolved {
            Some((region, step)) if region == self.region => {
                tracing::info!(scenario = %scenario, "Applying scenario");
                self.apply(step).await;
            }
            Some((region, _)) => {
                tracing::debug!(
                    scenario = %scenario,
                    target_region = %region,
                    "Scenario addressed to another region"
                );
            }
            None if scenario == Scenario::Test => {
                tracing::info!("Test message received");
            }
            None => {
                tracing::debug!(scenario = %scenario, "Scenario has no scaling effect");
            }
        }

        tokio::spawn(async move {
            if let Err(e) = ack.send().await {
                tracing::warn!(error = %e, "Failed to acknowledge command");
            }
        });
    }

    async fn apply(&mut self, step: ResizeStep) {
        match step {
            ResizeStep::Grow => self.add_worker().await,
            ResizeStep::Shrink => self.remove_worker().await,
        }
    }

    async fn add_worker(&mut self) {
        let (handle, cancel) = WorkerHandle::new();
        let worker_id = handle.id();
        let worker = Worker::new(
            worker_id,
            Arc::clone(&self.repo),
            self.reports_tx.clone(),
            cancel,
            self.worker.clone(),
        );

        tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                tracing::error!(worker_id = %worker_id, error = %e, "Worker exited");
            }
        });

        let mut shared = self.shared.write().await;
        shared.pool.push(handle);
        tracing::info!(worker_id = %worker_id, workers = shared.pool.len(), "Worker added");
    }

    async fn remove_worker(&mut self) {
        let mut shared = self.shared.write().await;
        match shared.pool.remove_latest() {
            Some(handle) => {
                tracing::info!(
                    worker_id = %handle.id(),
                    workers = shared.pool.len(),
                    "Worker removed"
                );
            }
            None => tracing::warn!("No workers to remove"),
        }
    }

    async fn publish(&mut self) {
        let score = apdex::score(&self.ring.snapshot());
        let rps = std::mem::take(&mut self.requests);

        let workers = {
            let mut shared = self.shared.write().await;
            shared.score = score;
            shared.requests_last_second = rps;
            shared.pool.len()
        };

        tracing::info!(score = %format!("{:.2}", score), rps, workers, "Load report");
    }
}
