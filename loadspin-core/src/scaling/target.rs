// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Target-mode source: converge the pool toward a polled desired count.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{ScalingSignal, ScalingSource};
use crate::config::TargetSettings;
use crate::controller::ControllerHandle;
use crate::repo::Repo;
use crate::scenario::ResizeStep;
use crate::types::Region;

/// Polls the desired worker count for one region and emits one step at a
/// time until the pool matches it.
pub struct TargetSource {
    repo: Arc<dyn Repo>,
    region: Region,
    controller: ControllerHandle,
    settings: TargetSettings,
}

impl TargetSource {
    pub fn new(
        repo: Arc<dyn Repo>,
        region: Region,
        controller: ControllerHandle,
        settings: TargetSettings,
    ) -> Self {
        Self {
            repo,
            region,
            controller,
            settings,
        }
    }

    async fn poll(&self) -> Option<usize> {
        match self.repo.fetch_desired_workers(&self.region).await {
            Ok(desired) => Some(clamp_target(desired)),
            Err(e) => {
                tracing::warn!(region = %self.region, error = %e, "Failed to fetch desired workers");
                None
            }
        }
    }
}

/// Negative targets mean zero workers.
fn clamp_target(desired: i64) -> usize {
    usize::try_from(desired.max(0)).unwrap_or(usize::MAX)
}

/// The single step that moves `current` toward `target`.
fn step_toward(current: usize, target: usize) -> Option<ResizeStep> {
    match current.cmp(&target) {
        Ordering::Less => Some(ResizeStep::Grow),
        Ordering::Greater => Some(ResizeStep::Shrink),
        Ordering::Equal => None,
    }
}

#[async_trait]
impl ScalingSource for TargetSource {
    fn name(&self) -> &'static str {
        "target"
    }

    async fn run(self: Box<Self>, signals: mpsc::Sender<ScalingSignal>) {
        let mut poll = tokio::time::interval(self.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut target: Option<usize> = None;

        tracing::info!(
            region = %self.region,
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Target source started"
        );

        loop {
            let current = self.controller.pool_size().await;
            let next = target.and_then(|target| step_toward(current, target));

            tokio::select! {
                _ = poll.tick() => {
                    if let Some(desired) = self.poll().await {
                        if target != Some(desired) {
                            tracing::info!(target = desired, current, "Desired workers changed");
                        }
                        target = Some(desired);
                    }
                }
                _ = tokio::time::sleep(self.settings.step_delay), if next.is_some() => {
                    let Some(step) = next else { continue };
                    let (signal, applied) = ScalingSignal::step(step);
                    if signals.send(signal).await.is_err() || applied.await.is_err() {
                        break;
                    }
                }
                _ = signals.closed() => break,
            }
        }

        tracing::info!("Target source stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::config::ConfigLoader;
    use crate::controller::Controller;
    use crate::repo::MemoryRepo;
    use crate::types::AccountId;

    #[test]
    fn test_clamp_target() {
        assert_eq!(clamp_target(-3), 0);
        assert_eq!(clamp_target(0), 0);
        assert_eq!(clamp_target(7), 7);
    }

    #[test]
    fn test_step_toward() {
        assert_eq!(step_toward(0, 3), Some(ResizeStep::Grow));
        assert_eq!(step_toward(5, 2), Some(ResizeStep::Shrink));
        assert_eq!(step_toward(4, 4), None);
    }

    struct Harness {
        repo: Arc<MemoryRepo>,
        region: Region,
        controller: ControllerHandle,
    }

    fn start(desired: i64) -> Harness {
        let config = ConfigLoader::load_string(
            "region: aws-eu-west-2\nmode: target\nworker:\n  rate_per_second: 1\nrepo:\n  kind: memory\n",
        )
        .unwrap();
        let repo = Arc::new(MemoryRepo::with_accounts(vec![
            AccountId::from("a"),
            AccountId::from("b"),
        ]));
        repo.set_desired_workers(&config.region, desired);

        let (tx, rx) = mpsc::channel(16);
        let (controller, handle) = Controller::new(&config, repo.clone(), rx).unwrap();
        tokio::spawn(controller.run());

        let source = TargetSource::new(
            repo.clone(),
            config.region.clone(),
            handle.clone(),
            config.target.clone(),
        );
        tokio::spawn(Box::new(source).run(tx));

        Harness {
            repo,
            region: config.region,
            controller: handle,
        }
    }

    /// Sample the pool size every 10ms until `until`, keeping each change.
    async fn observe(controller: &ControllerHandle, sizes: &mut Vec<usize>, until: Duration) {
        let deadline = tokio::time::Instant::now() + until;
        while tokio::time::Instant::now() < deadline {
            let size = controller.pool_size().await;
            if sizes.last() != Some(&size) {
                sizes.push(size);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_one_step_at_a_time() {
        let harness = start(5);
        let mut sizes = Vec::new();

        observe(&harness.controller, &mut sizes, Duration::from_secs(2)).await;
        harness.repo.set_desired_workers(&harness.region, 2);
        observe(&harness.controller, &mut sizes, Duration::from_secs(5)).await;

        assert_eq!(sizes, vec![0, 1, 2, 3, 4, 5, 4, 3, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direction_change_mid_convergence() {
        let harness = start(100);
        let mut sizes = Vec::new();

        // Lower the target while still growing; the poll at 5s reverses direction.
        observe(&harness.controller, &mut sizes, Duration::from_secs(2)).await;
        harness.repo.set_desired_workers(&harness.region, 0);
        observe(&harness.controller, &mut sizes, Duration::from_secs(12)).await;

        let peak = sizes.iter().copied().max().unwrap();
        let peak_at = sizes.iter().position(|&size| size == peak).unwrap();
        assert!(peak > 5 && peak < 100, "peak {}", peak);
        assert!(sizes[..=peak_at].windows(2).all(|w| w[1] == w[0] + 1));
        assert!(sizes[peak_at..].windows(2).all(|w| w[1] + 1 == w[0]));
        assert_eq!(sizes.last(), Some(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_target_is_zero() {
        let harness = start(-4);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.controller.pool_size().await, 0);
    }
}
