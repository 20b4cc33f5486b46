// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Scaling signal protocols.
//!
//! Two protocols feed the controller through one signal stream:
//! - command mode: discrete scenario events, each worth at most one worker
//! - target mode: a polled desired count that a helper converges toward
//!
//! Exactly one source is active per deployment.

mod command;
mod target;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

pub use command::{
    CommandInjector, CommandQueue, InjectionSource, QueueReader, QueuedCommand, DEFAULT_BATCH_SIZE,
};
pub use target::TargetSource;

use crate::error::QueueError;
use crate::scenario::{ResizeStep, Scenario};

/// Input to the controller's resize logic.
#[derive(Debug)]
pub enum ScalingSignal {
    /// A scenario event, filtered against the controller's region.
    Command(ScalingCommand),
    /// An unconditional single step. `done` fires once it has been applied.
    Step {
        step: ResizeStep,
        done: oneshot::Sender<()>,
    },
}

impl ScalingSignal {
    /// Build a step signal and the receiver that resolves once it is applied.
    pub fn step(step: ResizeStep) -> (Self, oneshot::Receiver<()>) {
        let (done, applied) = oneshot::channel();
        (Self::Step { step, done }, applied)
    }
}

/// A scenario event plus the callback that acknowledges it upstream.
#[derive(Debug)]
pub struct ScalingCommand {
    pub scenario: Scenario,
    pub ack: Ack,
}

impl ScalingCommand {
    pub fn new(scenario: Scenario, ack: Ack) -> Self {
        Self { scenario, ack }
    }
}

/// Acknowledgement callback, invoked after the command has been processed.
pub enum Ack {
    /// Nothing to acknowledge (injected commands).
    Noop,
    /// Delete the message from its queue.
    Queue {
        queue: Arc<dyn CommandQueue>,
        receipt: String,
    },
}

impl Ack {
    pub async fn send(self) -> Result<(), QueueError> {
        match self {
            Self::Noop => Ok(()),
            Self::Queue { queue, receipt } => queue.ack(&receipt).await,
        }
    }
}

impl std::fmt::Debug for Ack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Noop => write!(f, "Noop"),
            Self::Queue { receipt, .. } => f.debug_struct("Queue").field("receipt", receipt).finish(),
        }
    }
}

/// Background producer of scaling signals.
#[async_trait]
pub trait ScalingSource: Send {
    fn name(&self) -> &'static str;

    /// Produce signals until the controller stops listening.
    async fn run(self: Box<Self>, signals: mpsc::Sender<ScalingSignal>);
}
