// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for loadspin.
//!
//! Every failure is an explicit enum variant. No `Box<dyn Error>`, no
//! `anyhow::Result` inside the library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the load generator.
#[derive(Debug, Error)]
pub enum LoadspinError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("Command queue error: {0}")]
    Queue(#[from] QueueError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors abort startup before anything is served.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Data-access failures. Per-request variants are transient; connection
/// failures at startup are fatal to the process.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Failed to connect to database: {reason}")]
    Connect { reason: String },

    #[error("Query '{operation}' failed: {reason}")]
    Query {
        operation: &'static str,
        reason: String,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("No {entity} found for '{key}'")]
    NotFound { entity: &'static str, key: String },
}

/// Command queue failures. Receive errors are retried after a backoff.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to receive messages: {reason}")]
    Receive { reason: String },

    #[error("Failed to acknowledge message {receipt}: {reason}")]
    Ack { receipt: String, reason: String },

    #[error("Command stream closed")]
    Closed,
}

/// Failures that terminate a single worker without affecting the pool.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Fetching working set: {0}")]
    WorkingSet(#[from] RepoError),

    #[error("Need at least 2 ids, got {got}")]
    InsufficientIds { got: usize },
}

/// Result type alias using LoadspinError.
pub type LoadspinResult<T> = Result<T, LoadspinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_validation_error_display() {
        let err = HardValidationError::MissingRequiredField {
            field: "region",
            context: "root".to_string(),
        };
        assert!(err.to_string().contains("region"));
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_error_chain() {
        let repo_err = RepoError::Timeout(Duration::from_secs(1));
        let err: LoadspinError = repo_err.into();
        assert!(matches!(err, LoadspinError::Repo(RepoError::Timeout(_))));
    }

    #[test]
    fn test_worker_error_display() {
        let err = WorkerError::InsufficientIds { got: 1 };
        assert_eq!(err.to_string(), "Need at least 2 ids, got 1");
    }
}
