// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Command-mode sources: an external message queue and local injection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Ack, ScalingCommand, ScalingSignal, ScalingSource};
use crate::config::CommandSettings;
use crate::error::QueueError;
use crate::scenario::Scenario;

/// Messages requested per receive call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// A message as delivered by the queue. The body is the scenario tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub body: String,
    pub receipt: String,
}

/// At-least-once message queue carrying scenario events.
#[async_trait]
pub trait CommandQueue: Send + Sync {
    /// Wait for up to `max` messages. An empty batch is not an error.
    async fn receive(&self, max: usize) -> Result<Vec<QueuedCommand>, QueueError>;

    /// Delete a processed message.
    async fn ack(&self, receipt: &str) -> Result<(), QueueError>;
}

/// Forwards queue messages to the controller.
pub struct QueueReader {
    queue: Arc<dyn CommandQueue>,
    batch_size: usize,
    backoff: Duration,
}

impl QueueReader {
    pub fn new(queue: Arc<dyn CommandQueue>, backoff: Duration) -> Self {
        Self {
            queue,
            batch_size: DEFAULT_BATCH_SIZE,
            backoff,
        }
    }

    /// Reader using the configured receive backoff.
    pub fn from_settings(queue: Arc<dyn CommandQueue>, settings: &CommandSettings) -> Self {
        Self::new(queue, settings.retry_backoff)
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn command(&self, message: QueuedCommand) -> ScalingSignal {
        let ack = Ack::Queue {
            queue: Arc::clone(&self.queue),
            receipt: message.receipt,
        };
        ScalingSignal::Command(ScalingCommand::new(Scenario::parse(&message.body), ack))
    }
}

#[async_trait]
impl ScalingSource for QueueReader {
    fn name(&self) -> &'static str {
        "queue"
    }

    async fn run(self: Box<Self>, signals: mpsc::Sender<ScalingSignal>) {
        tracing::info!(batch_size = self.batch_size, "Queue reader started");

        'receive: loop {
            let batch = tokio::select! {
                batch = self.queue.receive(self.batch_size) => batch,
                _ = signals.closed() => break,
            };

            let messages = match batch {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Error receiving messages"
                    );
                    tokio::time::sleep(self.backoff).await;
                    continue;
                }
            };

            if messages.is_empty() {
                tracing::debug!("No messages received, polling again");
                continue;
            }

            tracing::debug!(count = messages.len(), "Received messages");

            for message in messages {
                if signals.send(self.command(message)).await.is_err() {
                    break 'receive;
                }
            }
        }

        tracing::info!("Queue reader stopped");
    }
}

/// Sends scenarios into the controller from inside the process.
///
/// The buffer is bounded; when it is full `inject` waits.
#[derive(Debug, Clone)]
pub struct CommandInjector {
    tx: mpsc::Sender<Scenario>,
}

impl CommandInjector {
    /// Create an injector and the source that drains it.
    pub fn channel(capacity: usize) -> (Self, InjectionSource) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, InjectionSource { rx })
    }

    pub async fn inject(&self, tag: &str) -> Result<(), QueueError> {
        self.tx
            .send(Scenario::parse(tag))
            .await
            .map_err(|_| QueueError::Closed)
    }
}

/// Drains a [`CommandInjector`] into the signal stream. Injected commands
/// need no acknowledgement.
#[derive(Debug)]
pub struct InjectionSource {
    rx: mpsc::Receiver<Scenario>,
}

#[async_trait]
impl ScalingSource for InjectionSource {
    fn name(&self) -> &'static str {
        "injection"
    }

    async fn run(mut self: Box<Self>, signals: mpsc::Sender<ScalingSignal>) {
        while let Some(scenario) = self.rx.recv().await {
            tracing::debug!(scenario = %scenario, "Injected command");
            let signal = ScalingSignal::Command(ScalingCommand::new(scenario, Ack::Noop));
            if signals.send(signal).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::time::Instant;

    use crate::config::ConfigLoader;
    use crate::scenario::RegionGroup;

    type Batch = Result<Vec<QueuedCommand>, QueueError>;

    /// Replays scripted batches, then blocks like a long poll with no messages.
    #[derive(Default)]
    struct ScriptedQueue {
        batches: Mutex<VecDeque<Batch>>,
        acked: Mutex<Vec<String>>,
    }

    impl ScriptedQueue {
        fn new(batches: Vec<Batch>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                acked: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl CommandQueue for ScriptedQueue {
        async fn receive(&self, max: usize) -> Result<Vec<QueuedCommand>, QueueError> {
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(Ok(mut batch)) => {
                    batch.truncate(max);
                    Ok(batch)
                }
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }

        async fn ack(&self, receipt: &str) -> Result<(), QueueError> {
            self.acked.lock().unwrap().push(receipt.to_string());
            Ok(())
        }
    }

    fn message(body: &str, receipt: &str) -> QueuedCommand {
        QueuedCommand {
            body: body.to_string(),
            receipt: receipt.to_string(),
        }
    }

    fn expect_command(signal: Option<ScalingSignal>) -> ScalingCommand {
        match signal {
            Some(ScalingSignal::Command(command)) => command,
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_forwards_messages_with_ack() {
        let queue = Arc::new(ScriptedQueue::new(vec![Ok(vec![
            message("scale-up-eu", "r1"),
            message("flash-sale", "r2"),
        ])]));
        let reader = Box::new(QueueReader::new(queue.clone(), Duration::from_secs(5)));
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(reader.run(tx));

        let first = expect_command(rx.recv().await);
        assert_eq!(first.scenario, Scenario::ScaleUp(RegionGroup::Eu));
        let second = expect_command(rx.recv().await);
        assert_eq!(second.scenario, Scenario::FlashSale);

        assert!(queue.acked.lock().unwrap().is_empty());
        first.ack.send().await.unwrap();
        second.ack.send().await.unwrap();
        assert_eq!(*queue.acked.lock().unwrap(), vec!["r1", "r2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_backs_off_after_receive_error() {
        let queue = Arc::new(ScriptedQueue::new(vec![
            Err(QueueError::Receive {
                reason: "unavailable".to_string(),
            }),
            Ok(vec![]),
            Ok(vec![message("scale-down-us", "r1")]),
        ]));
        let reader = Box::new(QueueReader::new(queue, Duration::from_secs(5)));
        let (tx, mut rx) = mpsc::channel(8);
        let start = Instant::now();
        tokio::spawn(reader.run(tx));

        let command = expect_command(rx.recv().await);
        assert_eq!(command.scenario, Scenario::ScaleDown(RegionGroup::Us));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_uses_configured_backoff() {
        let config = ConfigLoader::load_string(
            "region: aws-eu-west-2\ncommand:\n  retry_backoff_ms: 750\nrepo:\n  kind: memory\n",
        )
        .unwrap();
        let queue = Arc::new(ScriptedQueue::new(vec![
            Err(QueueError::Receive {
                reason: "throttled".to_string(),
            }),
            Ok(vec![message("scale-up-eu", "r1")]),
        ]));
        let reader = QueueReader::from_settings(queue, &config.command);
        assert_eq!(reader.backoff(), Duration::from_millis(750));

        let (tx, mut rx) = mpsc::channel(8);
        let start = Instant::now();
        tokio::spawn(Box::new(reader).run(tx));

        expect_command(rx.recv().await);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(750));
        assert!(waited < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_stops_when_receiver_dropped() {
        let queue = Arc::new(ScriptedQueue::default());
        let reader = Box::new(QueueReader::new(queue, Duration::from_secs(5)));
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(reader.run(tx));

        drop(rx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_injector_forwards_with_noop_ack() {
        let (injector, source) = CommandInjector::channel(1);
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(Box::new(source).run(tx));

        injector.inject("scale-up-ap").await.unwrap();

        let command = expect_command(rx.recv().await);
        assert_eq!(command.scenario, Scenario::ScaleUp(RegionGroup::Ap));
        assert!(matches!(command.ack, Ack::Noop));
    }

    #[tokio::test(start_paused = true)]
    async fn test_injector_waits_when_full() {
        let (injector, source) = CommandInjector::channel(1);

        injector.inject("test").await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_secs(1), injector.inject("test")).await;
        assert!(blocked.is_err());

        drop(source);
        assert!(matches!(
            injector.inject("test").await,
            Err(QueueError::Closed)
        ));
    }
}
