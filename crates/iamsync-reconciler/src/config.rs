//! Configuration for the reconciler host loop

use iamsync_types::POLICY_VERSION;
use serde::{Deserialize, Serialize};

/// Main reconciler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Policy format version requested on reads and written on corrections
    /// (1 to [`POLICY_VERSION`])
    #[serde(default = "default_policy_version")]
    pub policy_version: i64,

    /// Reconciliation interval in seconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Maximum declarations reconciled at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reconciliations: usize,

    /// Consecutive passes that had to rewrite the policy before a
    /// declaration is reported as stalled
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u32,

    /// Retry backoff after failed passes
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            policy_version: POLICY_VERSION,
            reconcile_interval_secs: 30,
            max_concurrent_reconciliations: 10,
            stall_threshold: 3,
            backoff: BackoffConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Exponential backoff applied per declaration after a failed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failure
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound on the delay
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_policy_version() -> i64 {
    POLICY_VERSION
}

fn default_reconcile_interval() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    10
}

fn default_stall_threshold() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    300_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ReconcilerConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `IAMSYNC_`-prefixed environment variables (`__` separates nested
    /// keys, e.g. `IAMSYNC_BACKOFF__MAX_DELAY_MS`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ReconcilerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("IAMSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the driver cannot honour
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !(1..=POLICY_VERSION).contains(&self.policy_version) {
            return Err(config::ConfigError::Message(format!(
                "policy_version must be between 1 and {POLICY_VERSION}, got {}",
                self.policy_version
            )));
        }
        Ok(())
    }
}
