//! Aggregation of normalized filings into one row per (name, report date).
//!
//! Several filers can report under the same parent name, e.g. a holding
//! company with multiple subsidiary filer IDs at one parent/zip. Their
//! additive amounts are summed. Ratios, office counts and identifiers are
//! not carried into `AggregatedFinancialRow`, so they cannot be summed.
//!
//! Steps:
//! 1. keep records with `class_code <= max_class_code` inside the date window
//! 2. sort by (name, zip, report_date, id) for a fixed summation order
//! 3. group by (name, report_date) and sum present values per column

use crate::domain::{AggregatedFinancialRow, FinancialRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Class codes at or below this value are bank holding companies.
pub const HOLDING_COMPANY_MAX_CLASS_CODE: i32 = 65;

/// Which filings take part in aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationScope {
    pub max_class_code: i32,
    /// Inclusive lower bound on the report date.
    pub start: NaiveDate,
    /// Optional inclusive upper bound on the report date.
    pub end: Option<NaiveDate>,
}

impl Default for AggregationScope {
    fn default() -> Self {
        Self {
            max_class_code: HOLDING_COMPANY_MAX_CLASS_CODE,
            start: NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid constant date"),
            end: None,
        }
    }
}

impl AggregationScope {
    pub fn contains(&self, record: &FinancialRecord) -> bool {
        record.class_code <= self.max_class_code
            && record.report_date >= self.start
            && self.end.map_or(true, |end| record.report_date <= end)
    }
}

/// Counts describing one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationStats {
    pub input_records: usize,
    pub out_of_scope: usize,
    pub rows: usize,
}

/// Aggregate filings into panel rows ordered by (name, date).
pub fn aggregate(
    records: &[FinancialRecord],
    scope: &AggregationScope,
) -> Vec<AggregatedFinancialRow> {
    aggregate_with_stats(records, scope).0
}

/// [`aggregate`], also reporting how many records were filtered out.
pub fn aggregate_with_stats(
    records: &[FinancialRecord],
    scope: &AggregationScope,
) -> (Vec<AggregatedFinancialRow>, AggregationStats) {
    let mut in_scope: Vec<&FinancialRecord> = records.iter().filter(|r| scope.contains(r)).collect();
    let out_of_scope = records.len() - in_scope.len();

    in_scope.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.zip.cmp(&b.zip))
            .then_with(|| a.report_date.cmp(&b.report_date))
            .then_with(|| a.id.cmp(&b.id))
    });

    // year/quarter are functions of the date, so (name, date) is the full key.
    let mut groups: BTreeMap<(&str, NaiveDate), AggregatedFinancialRow> = BTreeMap::new();
    for record in in_scope {
        match groups.entry((record.name.as_str(), record.report_date)) {
            Entry::Vacant(slot) => {
                slot.insert(AggregatedFinancialRow::from_record(record));
            }
            Entry::Occupied(mut slot) => slot.get_mut().absorb(record),
        }
    }

    let rows: Vec<AggregatedFinancialRow> = groups.into_values().collect();
    let stats = AggregationStats {
        input_records: records.len(),
        out_of_scope,
        rows: rows.len(),
    };
    tracing::debug!(?stats, "aggregated filings");
    (rows, stats)
}
