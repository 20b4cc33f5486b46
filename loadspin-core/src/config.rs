// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Validates the whole deployment at boot. Any invalid field results in a
//! HardValidationError that prevents startup.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HardValidationError, LoadspinError, LoadspinResult};
use crate::repo::MAX_WORKING_SET;
use crate::ring::DEFAULT_RING_CAPACITY;
use crate::scenario::RegionMap;
use crate::types::Region;

/// Environment variable consulted when `repo.url` is absent.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

// =============================================================================
// Raw configuration as parsed from YAML (before validation)
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawConfig {
    region: Option<String>,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    #[serde(default)]
    controller: RawControllerConfig,
    #[serde(default)]
    worker: RawWorkerConfig,
    #[serde(default)]
    target: RawTargetConfig,
    #[serde(default)]
    command: RawCommandConfig,
    #[serde(default)]
    regions: RawRegions,
    #[serde(default)]
    repo: RawRepoConfig,
}

fn default_mode() -> String {
    "command".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize)]
struct RawControllerConfig {
    #[serde(default = "default_ring_capacity")]
    ring_capacity: usize,
    #[serde(default = "default_report_capacity")]
    report_capacity: usize,
    #[serde(default = "default_score_interval_ms")]
    score_interval_ms: u64,
}

fn default_ring_capacity() -> usize {
    DEFAULT_RING_CAPACITY
}

fn default_report_capacity() -> usize {
    1000
}

fn default_score_interval_ms() -> u64 {
    1000
}

impl Default for RawControllerConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            report_capacity: default_report_capacity(),
            score_interval_ms: default_score_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawWorkerConfig {
    #[serde(default = "default_rate_per_second")]
    rate_per_second: u32,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_rate_per_second() -> u32 {
    100
}

fn default_request_timeout_ms() -> u64 {
    1000
}

impl Default for RawWorkerConfig {
    fn default() -> Self {
        Self {
            rate_per_second: default_rate_per_second(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTargetConfig {
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_step_delay_ms")]
    step_delay_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_step_delay_ms() -> u64 {
    100
}

impl Default for RawTargetConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCommandConfig {
    #[serde(default = "default_injection_capacity")]
    injection_capacity: usize,
    #[serde(default = "default_retry_backoff_ms")]
    retry_backoff_ms: u64,
}

fn default_injection_capacity() -> usize {
    1
}

fn default_retry_backoff_ms() -> u64 {
    5000
}

impl Default for RawCommandConfig {
    fn default() -> Self {
        Self {
            injection_capacity: default_injection_capacity(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawRegions {
    eu: Option<String>,
    us: Option<String>,
    ap: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRepoConfig {
    #[serde(default = "default_repo_kind")]
    kind: String,
    url: Option<String>,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
    #[serde(default)]
    region_scoped: bool,
    #[serde(default = "default_working_set_size")]
    working_set_size: usize,
    #[serde(default)]
    memory: RawMemoryRepoConfig,
}

fn default_repo_kind() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_working_set_size() -> usize {
    MAX_WORKING_SET
}

impl Default for RawRepoConfig {
    fn default() -> Self {
        Self {
            kind: default_repo_kind(),
            url: None,
            max_connections: default_max_connections(),
            region_scoped: false,
            working_set_size: default_working_set_size(),
            memory: RawMemoryRepoConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMemoryRepoConfig {
    #[serde(default = "default_memory_accounts")]
    accounts: usize,
    #[serde(default = "default_memory_latency_ms")]
    latency_ms: u64,
    #[serde(default)]
    desired_workers: i64,
}

fn default_memory_accounts() -> usize {
    1000
}

fn default_memory_latency_ms() -> u64 {
    5
}

impl Default for RawMemoryRepoConfig {
    fn default() -> Self {
        Self {
            accounts: default_memory_accounts(),
            latency_ms: default_memory_latency_ms(),
            desired_workers: 0,
        }
    }
}

// =============================================================================
// Validated configuration
// =============================================================================

/// Which scaling protocol drives the pool. Exactly one per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    /// Discrete ±1 scenario events.
    Command,
    /// Polled desired worker count.
    Target,
}

impl ScalingMode {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Target => "target",
        }
    }
}

/// Controller loop settings.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub ring_capacity: usize,
    pub report_capacity: usize,
    pub score_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            report_capacity: default_report_capacity(),
            score_interval: Duration::from_millis(default_score_interval_ms()),
        }
    }
}

/// Per-worker load settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Attempts started per second.
    pub rate_per_second: u32,
    /// Bound on a single transfer.
    pub request_timeout: Duration,
}

impl WorkerConfig {
    /// Time between two attempt starts.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.rate_per_second.max(1)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            rate_per_second: default_rate_per_second(),
            request_timeout: Duration::from_millis(default_request_timeout_ms()),
        }
    }
}

/// Target-mode convergence settings.
#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub poll_interval: Duration,
    pub step_delay: Duration,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            step_delay: Duration::from_millis(default_step_delay_ms()),
        }
    }
}

/// Command-mode settings.
#[derive(Debug, Clone)]
pub struct CommandSettings {
    /// Capacity of the HTTP injection queue; a full queue makes callers wait.
    pub injection_capacity: usize,
    /// Pause after a failed queue receive.
    pub retry_backoff: Duration,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            injection_capacity: default_injection_capacity(),
            retry_backoff: Duration::from_millis(default_retry_backoff_ms()),
        }
    }
}

/// Simulated store settings.
#[derive(Debug, Clone)]
pub struct MemoryRepoConfig {
    pub accounts: usize,
    pub latency: Duration,
    pub desired_workers: i64,
}

/// Which store backs the workers.
#[derive(Debug, Clone)]
pub enum RepoKind {
    Postgres {
        url: String,
        max_connections: u32,
        region_scoped: bool,
    },
    Memory(MemoryRepoConfig),
}

impl RepoKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepoConfig {
    pub kind: RepoKind,
    pub working_set_size: usize,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub region: Region,
    pub mode: ScalingMode,
    pub listen_addr: SocketAddr,
    pub controller: ControllerSettings,
    pub worker: WorkerConfig,
    pub target: TargetSettings,
    pub command: CommandSettings,
    pub regions: RegionMap,
    pub repo: RepoConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> LoadspinResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(LoadspinError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| LoadspinError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> LoadspinResult<Config> {
        Self::load_with_env(content, |key| std::env::var(key).ok())
    }

    fn load_with_env(
        content: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> LoadspinResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| LoadspinError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Ok(Self::validate(raw, env)?)
    }

    fn validate(
        raw: RawConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, HardValidationError> {
        let region = raw
            .region
            .ok_or_else(|| HardValidationError::MissingRequiredField {
                field: "region",
                context: "root".to_string(),
            })
            .and_then(Region::new)?;

        let mode = match raw.mode.as_str() {
            "command" => ScalingMode::Command,
            "target" => ScalingMode::Target,
            other => {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "mode",
                    value: other.to_string(),
                    reason: "Must be 'command' or 'target'".to_string(),
                })
            }
        };

        let listen_addr = raw.listen_addr.parse::<SocketAddr>().map_err(|e| {
            HardValidationError::InvalidFieldValue {
                field: "listen_addr",
                value: raw.listen_addr.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Config {
            region,
            mode,
            listen_addr,
            controller: Self::validate_controller(raw.controller)?,
            worker: Self::validate_worker(raw.worker)?,
            target: Self::validate_target(raw.target)?,
            command: Self::validate_command(raw.command)?,
            regions: Self::validate_regions(raw.regions)?,
            repo: Self::validate_repo(raw.repo, env)?,
        })
    }

    fn validate_controller(
        raw: RawControllerConfig,
    ) -> Result<ControllerSettings, HardValidationError> {
        non_zero("controller.ring_capacity", raw.ring_capacity as u64)?;
        non_zero("controller.report_capacity", raw.report_capacity as u64)?;
        non_zero("controller.score_interval_ms", raw.score_interval_ms)?;

        Ok(ControllerSettings {
            ring_capacity: raw.ring_capacity,
            report_capacity: raw.report_capacity,
            score_interval: Duration::from_millis(raw.score_interval_ms),
        })
    }

    fn validate_worker(raw: RawWorkerConfig) -> Result<WorkerConfig, HardValidationError> {
        if !(1..=10_000).contains(&raw.rate_per_second) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "worker.rate_per_second",
                value: raw.rate_per_second.to_string(),
                reason: "Must be between 1 and 10000".to_string(),
            });
        }
        non_zero("worker.request_timeout_ms", raw.request_timeout_ms)?;

        Ok(WorkerConfig {
            rate_per_second: raw.rate_per_second,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
        })
    }

    fn validate_target(raw: RawTargetConfig) -> Result<TargetSettings, HardValidationError> {
        non_zero("target.poll_interval_ms", raw.poll_interval_ms)?;

        Ok(TargetSettings {
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
            step_delay: Duration::from_millis(raw.step_delay_ms),
        })
    }

    fn validate_command(raw: RawCommandConfig) -> Result<CommandSettings, HardValidationError> {
        non_zero("command.injection_capacity", raw.injection_capacity as u64)?;

        Ok(CommandSettings {
            injection_capacity: raw.injection_capacity,
            retry_backoff: Duration::from_millis(raw.retry_backoff_ms),
        })
    }

    fn validate_regions(raw: RawRegions) -> Result<RegionMap, HardValidationError> {
        let defaults = RegionMap::default();
        let pick = |value: Option<String>, fallback: Region| match value {
            Some(name) => Region::new(name),
            None => Ok(fallback),
        };

        Ok(RegionMap {
            eu: pick(raw.eu, defaults.eu)?,
            us: pick(raw.us, defaults.us)?,
            ap: pick(raw.ap, defaults.ap)?,
        })
    }

    fn validate_repo(
        raw: RawRepoConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<RepoConfig, HardValidationError> {
        if raw.working_set_size < 2 || raw.working_set_size > MAX_WORKING_SET {
            return Err(HardValidationError::InvalidFieldValue {
                field: "repo.working_set_size",
                value: raw.working_set_size.to_string(),
                reason: format!("Must be between 2 and {}", MAX_WORKING_SET),
            });
        }

        let kind = match raw.kind.as_str() {
            "postgres" => {
                let url = raw
                    .url
                    .or_else(|| env(DATABASE_URL_ENV))
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| HardValidationError::MissingRequiredField {
                        field: "url",
                        context: format!("repo (or ${})", DATABASE_URL_ENV),
                    })?;
                non_zero("repo.max_connections", raw.max_connections as u64)?;

                RepoKind::Postgres {
                    url,
                    max_connections: raw.max_connections,
                    region_scoped: raw.region_scoped,
                }
            }
            "memory" => {
                if raw.memory.desired_workers < 0 {
                    return Err(HardValidationError::InvalidFieldValue {
                        field: "repo.memory.desired_workers",
                        value: raw.memory.desired_workers.to_string(),
                        reason: "Must not be negative".to_string(),
                    });
                }

                RepoKind::Memory(MemoryRepoConfig {
                    accounts: raw.memory.accounts,
                    latency: Duration::from_millis(raw.memory.latency_ms),
                    desired_workers: raw.memory.desired_workers,
                })
            }
            other => {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "repo.kind",
                    value: other.to_string(),
                    reason: "Must be 'postgres' or 'memory'".to_string(),
                })
            }
        };

        Ok(RepoConfig {
            kind,
            working_set_size: raw.working_set_size,
        })
    }
}

fn non_zero(field: &'static str, value: u64) -> Result<(), HardValidationError> {
    if value == 0 {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: "0".to_string(),
            reason: "Must be greater than 0".to_string(),
        });
    }
    Ok(())
}
