use anyhow::{bail, Context, Result};
use crate::state::DEFAULT_MAX_CLOCK_SKEW_MS;
use serde::Deserialize;

// Re-export section types owned by their modules
pub use crate::intersection::IntersectionConfig;
pub use crate::nats::NatsConfig;
pub use crate::schedule::ScheduleLogConfig;

/// Complete service configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub vehicles: VehicleConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub intersection: IntersectionConfig,
    #[serde(default)]
    pub schedule_log: ScheduleLogConfig,
}

/// Vehicle state thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    /// Max distance to the stop line (m) at which a vehicle counts as stopped
    #[serde(default = "default_stop_distance")]
    pub stop_distance: f64,
    /// Max speed (m/s) at which a vehicle counts as stopped
    #[serde(default = "default_stop_speed")]
    pub stop_speed: f64,
    /// Vehicles silent for longer than this are dropped from snapshots
    #[serde(default = "default_expiry_ms")]
    pub expiry_ms: i64,
    /// Updates stamped further than this ahead of the receive time are dropped
    #[serde(default = "default_max_clock_skew_ms")]
    pub max_clock_skew_ms: i64,
}

fn default_stop_distance() -> f64 {
    2.0
}

fn default_stop_speed() -> f64 {
    0.1
}

fn default_expiry_ms() -> i64 {
    2000
}

fn default_max_clock_skew_ms() -> i64 {
    DEFAULT_MAX_CLOCK_SKEW_MS
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            stop_distance: default_stop_distance(),
            stop_speed: default_stop_speed(),
            expiry_ms: default_expiry_ms(),
            max_clock_skew_ms: default_max_clock_skew_ms(),
        }
    }
}

/// Scheduling cadence and reordering
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum time between two published schedules
    #[serde(default = "default_scheduling_delta_ms")]
    pub scheduling_delta_ms: u64,
    /// How many positions a vehicle may move ahead of its FCFS rank
    #[serde(default = "default_flexibility_limit")]
    pub flexibility_limit: usize,
}

fn default_scheduling_delta_ms() -> u64 {
    100
}

fn default_flexibility_limit() -> usize {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduling_delta_ms: default_scheduling_delta_ms(),
            flexibility_limit: default_flexibility_limit(),
        }
    }
}

impl ServiceConfig {
    /// Apply ALLSTOP_* environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ALLSTOP_SCHEDULING_DELTA_MS") {
            if let Ok(n) = v.parse::<u64>() {
                self.scheduler.scheduling_delta_ms = n;
            }
        }
        if let Ok(v) = std::env::var("ALLSTOP_FLEXIBILITY_LIMIT") {
            if let Ok(n) = v.parse::<usize>() {
                self.scheduler.flexibility_limit = n;
            }
        }
        if let Ok(v) = std::env::var("ALLSTOP_INTERSECTION_SOURCE") {
            if !v.is_empty() {
                self.intersection.source = v;
            }
        }
        if let Ok(v) = std::env::var("ALLSTOP_SCHEDULE_LOG_ENABLED") {
            if let Ok(b) = v.parse::<bool>() {
                self.schedule_log.enabled = b;
            }
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.nats.url.is_empty() {
            bail!("nats.url must not be empty");
        }
        if self.nats.group_id.is_empty() {
            bail!("nats.group_id must not be empty");
        }
        if self.nats.consumer_subject.is_empty() || self.nats.producer_subject.is_empty() {
            bail!("nats consumer and producer subjects must not be empty");
        }
        if !self.vehicles.stop_distance.is_finite() || self.vehicles.stop_distance < 0.0 {
            bail!("vehicles.stop_distance must be a non-negative number");
        }
        if !self.vehicles.stop_speed.is_finite() || self.vehicles.stop_speed < 0.0 {
            bail!("vehicles.stop_speed must be a non-negative number");
        }
        if self.vehicles.expiry_ms <= 0 {
            bail!("vehicles.expiry_ms must be positive");
        }
        if self.vehicles.max_clock_skew_ms < 0 {
            bail!("vehicles.max_clock_skew_ms must not be negative");
        }
        if self.scheduler.scheduling_delta_ms == 0 {
            bail!("scheduler.scheduling_delta_ms must be positive");
        }
        if self.intersection.source.is_empty() {
            bail!("intersection.source must not be empty");
        }
        if self.intersection.attempts == 0 {
            bail!("intersection.attempts must be at least 1");
        }
        if self.schedule_log.enabled && self.schedule_log.filename.is_empty() {
            bail!("schedule_log.filename must not be empty when logging is enabled");
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ServiceConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: ServiceConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path))?;
    Ok(config)
}
