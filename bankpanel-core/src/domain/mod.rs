//! Domain types for the bank panel

pub mod institution;
pub mod record;

pub use institution::{normalize_zip, Institution};
pub use record::{sum_present, year_quarter, AggregatedFinancialRow, FinancialRecord};
