// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ordered collection of live worker handles.
//!
//! Shrinking always cancels the most recently added worker.

use crate::types::WorkerId;
use crate::worker::WorkerHandle;

#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: WorkerHandle) {
        self.workers.push(handle);
    }

    /// Cancel and remove the newest worker. `None` if the pool is empty.
    pub fn remove_latest(&mut self) -> Option<WorkerHandle> {
        let handle = self.workers.pop()?;
        handle.cancel();
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(WorkerHandle::id).collect()
    }

    /// Cancel every worker and empty the pool.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.workers.len();
        for handle in self.workers.drain(..) {
            handle.cancel();
        }
        count
    }
}
