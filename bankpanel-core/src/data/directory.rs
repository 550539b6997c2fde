//! Institution directory: every active holding company, one bounded request.
//!
//! The directory call is a single page of at most `limit` rows sorted by
//! office count. If the provider reports more matches than that, the tail is
//! dropped. This is an accepted approximation (the largest institutions come
//! first) and is logged, never raised.

use super::normalize::zip_from_value;
use super::provider::{DataError, Endpoint, FdicSource};
use super::query::{FilterExpr, Query, SortOrder};
use super::schema::DIRECTORY_FIELDS;
use crate::domain::Institution;
use std::collections::BTreeSet;

pub const DEFAULT_DIRECTORY_LIMIT: usize = 10_000;

/// The directory query: active institutions, largest branch networks first.
pub fn directory_query(limit: usize) -> Query {
    Query::new(limit)
        .filter(FilterExpr::flag("ACTIVE", 1))
        .fields(DIRECTORY_FIELDS)
        .sort("OFFICES", SortOrder::Desc)
}

/// Fetch the active-institution directory, deduplicated by (parent name, zip).
///
/// Rows with a blank parent name are dropped. Transport failure is returned
/// as-is; the caller treats it as fatal.
pub fn fetch_active_institutions(
    source: &dyn FdicSource,
    limit: usize,
) -> Result<BTreeSet<Institution>, DataError> {
    let page = source.query(Endpoint::Institutions, &directory_query(limit))?;

    if let Some(total) = page.total {
        if total > page.records.len() as u64 {
            tracing::warn!(
                total,
                returned = page.records.len(),
                "institution directory truncated at the page limit"
            );
        }
    }

    let fetched = page.records.len();
    let institutions: BTreeSet<Institution> = page
        .records
        .iter()
        .filter_map(|row| {
            let name = row.get("NAMEHCR").and_then(|v| v.as_str())?;
            let zip = row.get("ZIP").and_then(zip_from_value).unwrap_or_default();
            Institution::new(name, zip)
        })
        .collect();

    tracing::info!(
        rows = fetched,
        institutions = institutions.len(),
        "loaded institution directory from {}",
        source.name()
    );
    Ok(institutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{QueryPage, RawRecord};
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedDirectory {
        rows: Vec<RawRecord>,
        total: Option<u64>,
        seen: Mutex<Vec<Query>>,
    }

    impl FixedDirectory {
        fn new(rows: Vec<serde_json::Value>, total: Option<u64>) -> Self {
            Self {
                rows: rows
                    .into_iter()
                    .map(|v| v.as_object().cloned().unwrap())
                    .collect(),
                total,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl FdicSource for FixedDirectory {
        fn name(&self) -> &str {
            "fixed"
        }

        fn query(&self, endpoint: Endpoint, query: &Query) -> Result<QueryPage, DataError> {
            assert_eq!(endpoint, Endpoint::Institutions);
            self.seen.lock().unwrap().push(query.clone());
            Ok(QueryPage {
                records: self.rows.clone(),
                total: self.total,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn dedupes_and_drops_blank_names() {
        let src = FixedDirectory::new(
            vec![
                json!({"NAMEHCR": "Acme Holding", "ZIP": "10001"}),
                json!({"NAMEHCR": "Acme Holding", "ZIP": "10001"}),
                json!({"NAMEHCR": "Acme Holding", "ZIP": "10002"}),
                json!({"NAMEHCR": "", "ZIP": "30003"}),
                json!({"NAMEHCR": null, "ZIP": "30003"}),
                json!({"ZIP": "30003"}),
                json!({"NAMEHCR": "Beta Bank", "ZIP": 2110}),
            ],
            Some(7),
        );
        let dir = fetch_active_institutions(&src, 100).unwrap();
        let pairs: Vec<_> = dir
            .iter()
            .map(|i| (i.parent_name.as_str(), i.zip.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Acme Holding", "10001"),
                ("Acme Holding", "10002"),
                ("Beta Bank", "02110"),
            ]
        );
    }

    #[test]
    fn sends_active_filter_sorted_by_offices() {
        let src = FixedDirectory::new(vec![], None);
        fetch_active_institutions(&src, 10_000).unwrap();
        let seen = src.seen.lock().unwrap();
        let params = seen[0].to_params();
        assert!(params.contains(&("filters", "ACTIVE:1".to_string())));
        assert!(params.contains(&("sort_by", "OFFICES".to_string())));
        assert!(params.contains(&("sort_order", "DESC".to_string())));
        assert!(params.contains(&("limit", "10000".to_string())));
    }

    #[test]
    fn truncation_is_not_an_error() {
        let src = FixedDirectory::new(vec![json!({"NAMEHCR": "Acme Holding", "ZIP": "10001"})], Some(50_000));
        let dir = fetch_active_institutions(&src, 1).unwrap();
        assert_eq!(dir.len(), 1);
    }
}
