//! Pipeline configuration, loaded from TOML.
//!
//! Every section and every field has a default, so an empty file is a valid
//! configuration. Dates are quoted `YYYY-MM-DD` strings.

use bankpanel_core::data::aggregate::HOLDING_COMPANY_MAX_CLASS_CODE;
use bankpanel_core::data::directory::DEFAULT_DIRECTORY_LIMIT;
use bankpanel_core::data::fdic::DEFAULT_FDIC_BASE_URL;
use bankpanel_core::data::financials::DEFAULT_FINANCIALS_LIMIT;
use bankpanel_core::data::fred::DEFAULT_FRED_BASE_URL;
use bankpanel_core::data::{
    default_series, AggregationScope, CircuitBreaker, RequestThrottle, SeriesSpec,
    TransportSettings,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FdicConfig {
    pub base_url: String,
    pub directory_limit: usize,
    pub financials_limit: usize,
}

impl Default for FdicConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FDIC_BASE_URL.to_string(),
            directory_limit: DEFAULT_DIRECTORY_LIMIT,
            financials_limit: DEFAULT_FINANCIALS_LIMIT,
        }
    }
}

/// Timeout, retry, rate and breaker settings shared by both providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Minimum spacing between request starts, across all workers.
    pub min_request_interval_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            min_request_interval_ms: 250,
            breaker_cooldown_secs: 600,
            breaker_failure_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    pub max_class_code: i32,
    pub start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        let scope = AggregationScope::default();
        Self {
            max_class_code: HOLDING_COMPANY_MAX_CLASS_CODE,
            start_date: scope.start,
            end_date: scope.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Concurrent institution fetches. 1 runs sequentially.
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub fdic_file: String,
    pub fred_file: String,
    /// Also write a CSV copy of the bank panel.
    pub csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            fdic_file: "fdic_financials.parquet".to_string(),
            fred_file: "fred_econ.parquet".to_string(),
            csv: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FredConfig {
    pub base_url: String,
    /// Read when `FRED_API_KEY` is not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<PathBuf>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub series: Vec<SeriesSpec>,
}

impl Default for FredConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FRED_BASE_URL.to_string(),
            api_key_file: None,
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            series: default_series(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub fdic: FdicConfig,
    pub transport: TransportConfig,
    pub scope: ScopeConfig,
    pub pool: PoolConfig,
    pub output: OutputConfig,
    pub fred: FredConfig,
}

impl PipelineConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings that would make a run meaningless or hang.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.fdic.base_url.trim().is_empty() {
            return invalid("fdic.base_url is empty".into());
        }
        if self.fdic.directory_limit == 0 || self.fdic.financials_limit == 0 {
            return invalid("fdic limits must be at least 1".into());
        }
        if self.transport.timeout_secs == 0 {
            return invalid("transport.timeout_secs must be at least 1".into());
        }
        if self.transport.breaker_failure_threshold == 0 {
            return invalid("transport.breaker_failure_threshold must be at least 1".into());
        }
        if self.pool.workers == 0 {
            return invalid("pool.workers must be at least 1".into());
        }
        if let Some(end) = self.scope.end_date {
            if end < self.scope.start_date {
                return invalid(format!(
                    "scope.end_date {end} is before scope.start_date {}",
                    self.scope.start_date
                ));
            }
        }
        if self.output.fdic_file.trim().is_empty() || self.output.fred_file.trim().is_empty() {
            return invalid("output file names must not be empty".into());
        }
        if self.output.fdic_file == self.output.fred_file {
            return invalid("output.fdic_file and output.fred_file must differ".into());
        }
        if self.fred.end_date < self.fred.start_date {
            return invalid(format!(
                "fred.end_date {} is before fred.start_date {}",
                self.fred.end_date, self.fred.start_date
            ));
        }

        let mut codes = HashSet::new();
        let mut columns = HashSet::new();
        for spec in &self.fred.series {
            if spec.code.trim().is_empty() || spec.column.trim().is_empty() {
                return invalid("fred.series entries need a code and a column".into());
            }
            if matches!(spec.column.as_str(), "date" | "year" | "quarter") {
                return invalid(format!("fred column {:?} is reserved", spec.column));
            }
            if !codes.insert(spec.code.as_str()) {
                return invalid(format!("duplicate fred series code {:?}", spec.code));
            }
            if !columns.insert(spec.column.as_str()) {
                return invalid(format!("duplicate fred column {:?}", spec.column));
            }
        }
        Ok(())
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            timeout: Duration::from_secs(self.transport.timeout_secs),
            max_retries: self.transport.max_retries,
            base_delay: Duration::from_millis(self.transport.base_delay_ms),
            ..TransportSettings::default()
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            Duration::from_secs(self.transport.breaker_cooldown_secs),
            self.transport.breaker_failure_threshold,
        )
    }

    pub fn throttle(&self) -> RequestThrottle {
        RequestThrottle::new(Duration::from_millis(self.transport.min_request_interval_ms))
    }

    pub fn aggregation_scope(&self) -> AggregationScope {
        AggregationScope {
            max_class_code: self.scope.max_class_code,
            start: self.scope.start_date,
            end: self.scope.end_date,
        }
    }

    pub fn fdic_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.fdic_file)
    }

    pub fn fred_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.fred_file)
    }

    /// CSV copy of the bank panel, next to the Parquet file.
    pub fn csv_path(&self) -> PathBuf {
        self.fdic_path().with_extension("csv")
    }
}
