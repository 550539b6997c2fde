//! Bank panel core: provider clients, normalization, aggregation and Parquet
//! persistence for a quarterly bank-holding-company financials panel.
//!
//! - Domain types (institutions, filings, aggregated panel rows)
//! - FDIC BankFind and FRED clients behind `FdicSource` / `SeriesSource`
//! - Transport policy: timeout, retry with backoff, request throttle,
//!   circuit breaker
//! - Pure normalize and aggregate steps
//! - Panel writer/reader, CSV export, macro indicator table

pub mod data;
pub mod domain;
