//! Loadspin Core Library
//!
//! Synthetic load generation against a transactional store. A single
//! controller owns a pool of open-loop workers, scores their latency with a
//! five-band Apdex-style function, and resizes the pool from scaling signals
//! (discrete region-tagged commands or a polled target count).

pub mod apdex;
pub mod config;
pub mod controller;
pub mod error;
pub mod pool;
pub mod repo;
pub mod ring;
pub mod scaling;
pub mod scenario;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, ScalingMode};
pub use controller::{Controller, ControllerHandle, ControllerSnapshot};
pub use error::{HardValidationError, LoadspinError, LoadspinResult, QueueError, RepoError};
pub use repo::{MemoryRepo, PostgresRepo, Repo};
pub use ring::LatencyRing;
pub use scaling::{CommandInjector, ScalingSignal, ScalingSource};
pub use scenario::{ResizeStep, Scenario};
pub use types::{AccountId, Region, WorkerId};
