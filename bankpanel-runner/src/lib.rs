//! Bank panel runner: configuration and pipeline orchestration.
//!
//! Builds on `bankpanel-core` to provide:
//! - TOML pipeline configuration with defaults and validation
//! - The FDIC panel pipeline (directory, bounded fetch pool, merge,
//!   normalize, aggregate, write)
//! - The macro series pipeline
//! - Serializable run summaries

pub mod config;
pub mod macro_pipeline;
pub mod pipeline;
pub mod summary;

pub use config::{
    ConfigError, FdicConfig, FredConfig, OutputConfig, PipelineConfig, PoolConfig, ScopeConfig,
    TransportConfig,
};
pub use macro_pipeline::run_macro_pipeline;
pub use pipeline::{fetch_all, run_fdic_pipeline, InstitutionFetch, PipelineError};
pub use summary::{InstitutionFailure, MacroSummary, RejectedFiling, RunSummary};
