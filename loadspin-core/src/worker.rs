// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Load-generating worker.
//!
//! A worker fetches a working set of account ids once, then starts one
//! transfer attempt per tick. Attempts run as their own tasks, so a slow store
//! does not slow the tick rate (open-loop). The only thing that holds a tick
//! back is a full report channel: when the controller falls behind, the
//! worker waits for a free slot before starting the next attempt.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::WorkerConfig;
use crate::error::{RepoError, WorkerError};
use crate::repo::{Repo, TransferRequest};
use crate::types::{AccountId, WorkerId};

/// Controller-side handle: identity plus the cancellation switch.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    cancel: watch::Sender<bool>,
}

impl WorkerHandle {
    /// Create a handle and the token its worker will observe.
    pub fn new() -> (Self, CancelToken) {
        let (cancel, observed) = watch::channel(false);
        let handle = Self {
            id: WorkerId::new(),
            cancel,
        };
        (handle, CancelToken(observed))
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Ask the worker to stop at its next tick.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Worker-side view of the cancellation switch.
///
/// Dropping the handle without cancelling also counts as cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Resolves once cancelled.
    pub async fn cancelled(&mut self) {
        let _ = self.0.wait_for(|cancelled| *cancelled).await;
    }
}

/// Result of a single attempt. Latency is measured whatever the outcome.
#[derive(Debug)]
pub struct TransferOutcome {
    pub request: TransferRequest,
    pub latency: Duration,
    pub error: Option<RepoError>,
}

/// Run one transfer bounded by `timeout`.
pub async fn execute(
    repo: &dyn Repo,
    request: TransferRequest,
    timeout: Duration,
) -> TransferOutcome {
    let start = Instant::now();
    let result = tokio::time::timeout(
        timeout,
        repo.transfer(&request.from, &request.to, request.amount),
    )
    .await;
    let latency = start.elapsed();

    let error = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(_) => Some(RepoError::Timeout(timeout)),
    };

    TransferOutcome {
        request,
        latency,
        error,
    }
}

/// Pick two distinct ids and an amount in `[0, 100)`.
///
/// Returns `None` when the working set cannot supply two distinct ids.
pub fn sample_request<R: Rng + ?Sized>(ids: &[AccountId], rng: &mut R) -> Option<TransferRequest> {
    let mut pair = ids.choose_multiple(rng, 2);
    let from = pair.next()?;
    let to = pair.next()?;
    if from == to {
        return None;
    }

    Some(TransferRequest {
        from: from.clone(),
        to: to.clone(),
        amount: rng.gen_range(0.0..100.0),
    })
}

/// A single load-generating unit.
pub struct Worker {
    id: WorkerId,
    repo: Arc<dyn Repo>,
    reports: mpsc::Sender<Duration>,
    cancel: CancelToken,
    config: WorkerConfig,
    rng: StdRng,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        repo: Arc<dyn Repo>,
        reports: mpsc::Sender<Duration>,
        cancel: CancelToken,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            repo,
            reports,
            cancel,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed for reproducible sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Generate load until cancelled.
    ///
    /// Returns an error only for startup failures; per-request errors are
    /// logged and load generation continues.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        let ids = self.repo.fetch_working_set().await?;
        if ids.len() < 2 {
            return Err(WorkerError::InsufficientIds { got: ids.len() });
        }

        tracing::debug!(worker_id = %self.id, ids = ids.len(), "Worker started");

        let mut ticks = tokio::time::interval(self.config.tick_period());
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;
            if self.cancel.is_cancelled() {
                break;
            }

            let Some(request) = sample_request(&ids, &mut self.rng) else {
                tracing::warn!(
                    worker_id = %self.id,
                    ids = ids.len(),
                    "Need at least 2 distinct ids, skipping tick"
                );
                continue;
            };

            // Wait out a full report channel. The slot is not held across the
            // attempt, so in-flight attempts are unbounded.
            tokio::select! {
                permit = self.reports.reserve() => match permit {
                    Ok(permit) => drop(permit),
                    Err(_) => break,
                },
                _ = self.cancel.cancelled() => break,
            }

            let repo = Arc::clone(&self.repo);
            let reports = self.reports.clone();
            let timeout = self.config.request_timeout;
            let worker_id = self.id;
            tokio::spawn(async move {
                let outcome = execute(repo.as_ref(), request, timeout).await;
                if let Some(e) = &outcome.error {
                    tracing::debug!(worker_id = %worker_id, error = %e, "Request failed");
                }
                let _ = reports.send(outcome.latency).await;
            });
        }

        tracing::debug!(worker_id = %self.id, "Worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::types::Region;

    /// Records every transfer it is asked to make.
    struct RecordingRepo {
        ids: Vec<AccountId>,
        latency: Duration,
        fail: bool,
        transfers: Mutex<Vec<TransferRequest>>,
    }

    impl RecordingRepo {
        fn new(ids: &[&str]) -> Self {
            Self {
                ids: ids.iter().map(|&id| AccountId::from(id)).collect(),
                latency: Duration::ZERO,
                fail: false,
                transfers: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Repo for RecordingRepo {
        async fn fetch_desired_workers(&self, _region: &Region) -> Result<i64, RepoError> {
            Ok(0)
        }

        async fn fetch_working_set(&self) -> Result<Vec<AccountId>, RepoError> {
            Ok(self.ids.clone())
        }

        async fn transfer(
            &self,
            from: &AccountId,
            to: &AccountId,
            amount: f64,
        ) -> Result<(), RepoError> {
            self.transfers.lock().unwrap().push(TransferRequest {
                from: from.clone(),
                to: to.clone(),
                amount,
            });
            tokio::time::sleep(self.latency).await;
            if self.fail {
                return Err(RepoError::Query {
                    operation: "transfer",
                    reason: "injected".to_string(),
                });
            }
            Ok(())
        }
    }

    fn spawn_worker(
        repo: Arc<dyn Repo>,
        reports: mpsc::Sender<Duration>,
    ) -> (WorkerHandle, tokio::task::JoinHandle<Result<(), WorkerError>>) {
        let (handle, token) = WorkerHandle::new();
        let worker = Worker::new(handle.id(), repo, reports, token, WorkerConfig::default())
            .with_seed(7);
        (handle, tokio::spawn(worker.run()))
    }

    #[test]
    fn test_sample_request_pair_and_amount() {
        let ids: Vec<AccountId> = vec!["A".into(), "B".into()];
        let expected: HashSet<&str> = ["A", "B"].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..1000 {
            let request = sample_request(&ids, &mut rng).unwrap();
            let pair: HashSet<&str> = [request.from.as_str(), request.to.as_str()]
                .into_iter()
                .collect();
            assert_eq!(pair, expected);
            assert!((0.0..100.0).contains(&request.amount));
        }
    }

    #[test]
    fn test_sample_request_needs_two_distinct_ids() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_request(&[AccountId::from("A")], &mut rng).is_none());
        assert!(sample_request(&["A".into(), "A".into()], &mut rng).is_none());
        assert!(sample_request(&[], &mut rng).is_none());
    }

    #[test]
    fn test_handle_cancellation_is_independent() {
        let (first, first_token) = WorkerHandle::new();
        let (second, second_token) = WorkerHandle::new();

        first.cancel();

        assert!(first.is_cancelled());
        assert!(first_token.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_dropped_handle_cancels() {
        let (handle, token) = WorkerHandle::new();
        drop(handle);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_samples_only_working_set() {
        let repo = Arc::new(RecordingRepo::new(&["A", "B"]));
        let (tx, mut rx) = mpsc::channel(1000);
        let (handle, task) = spawn_worker(repo.clone(), tx);

        for _ in 0..50 {
            rx.recv().await.unwrap();
        }
        handle.cancel();
        task.await.unwrap().unwrap();

        let transfers = repo.transfers.lock().unwrap();
        assert!(transfers.len() >= 50);
        for request in transfers.iter() {
            let mut pair = [request.from.as_str(), request.to.as_str()];
            pair.sort_unstable();
            assert_eq!(pair, ["A", "B"]);
            assert!((0.0..100.0).contains(&request.amount));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_fails_with_single_id() {
        let repo = Arc::new(RecordingRepo::new(&["A"]));
        let (tx, _rx) = mpsc::channel(10);
        let (_handle, task) = spawn_worker(repo, tx);

        let result = task.await.unwrap();
        assert!(matches!(result, Err(WorkerError::InsufficientIds { got: 1 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_requests_still_report_latency() {
        let mut repo = RecordingRepo::new(&["A", "B", "C"]);
        repo.fail = true;
        repo.latency = Duration::from_millis(30);
        let (tx, mut rx) = mpsc::channel(1000);
        let (handle, task) = spawn_worker(Arc::new(repo), tx);

        let latency = rx.recv().await.unwrap();
        assert!(latency >= Duration::from_millis(30));

        handle.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_overlap() {
        // Each transfer takes 500ms; at 100 ticks/s many are in flight at once.
        let mut repo = RecordingRepo::new(&["A", "B"]);
        repo.latency = Duration::from_millis(500);
        let repo = Arc::new(repo);
        let (tx, mut rx) = mpsc::channel(1000);
        let (handle, task) = spawn_worker(repo.clone(), tx);

        rx.recv().await.unwrap();
        assert!(repo.transfers.lock().unwrap().len() > 10);

        handle.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_bounded_latency() {
        let mut repo = RecordingRepo::new(&["A", "B"]);
        repo.latency = Duration::from_secs(5);

        let request = TransferRequest {
            from: "A".into(),
            to: "B".into(),
            amount: 1.0,
        };
        let outcome = execute(&repo, request, Duration::from_secs(1)).await;

        assert!(matches!(outcome.error, Some(RepoError::Timeout(_))));
        assert!(outcome.latency >= Duration::from_secs(1));
        assert!(outcome.latency < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_channel_blocks_worker() {
        let repo = Arc::new(RecordingRepo::new(&["A", "B"]));
        let (tx, mut rx) = mpsc::channel(3);
        let (handle, task) = spawn_worker(repo.clone(), tx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(repo.transfers.lock().unwrap().len(), 3);

        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(repo.transfers.lock().unwrap().len(), 4);

        handle.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_does_not_throttle_ticks() {
        let mut repo = RecordingRepo::new(&["A", "B"]);
        repo.latency = Duration::from_millis(200);
        let repo = Arc::new(repo);
        let (tx, mut rx) = mpsc::channel(5);
        let (handle, task) = spawn_worker(repo.clone(), tx);

        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        tokio::time::sleep(Duration::from_secs(1)).await;
        let started = repo.transfers.lock().unwrap().len();
        assert!(started >= 90, "only {} attempts started", started);

        handle.cancel();
        task.await.unwrap().unwrap();
        drain.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_attempts_report_after_cancel() {
        let mut repo = RecordingRepo::new(&["A", "B"]);
        repo.latency = Duration::from_millis(500);
        let repo = Arc::new(repo);
        let (tx, mut rx) = mpsc::channel(1000);
        let (handle, task) = spawn_worker(repo.clone(), tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
        task.await.unwrap().unwrap();

        let started = repo.transfers.lock().unwrap().len();
        assert!(started > 0);

        let mut reported = 0;
        while let Some(latency) = rx.recv().await {
            assert!(latency >= Duration::from_millis(500));
            reported += 1;
        }
        assert_eq!(reported, started);
    }
}
