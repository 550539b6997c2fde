//! Per-institution financial history.

use super::provider::{DataError, Endpoint, FdicSource, RawRecord};
use super::query::{FilterExpr, Query, SortOrder};
use super::schema::FdicField;
use crate::domain::Institution;

pub const DEFAULT_FINANCIALS_LIMIT: usize = 10_000;

/// Exact-match query for one institution's filings, newest first.
pub fn financials_query(institution: &Institution, limit: usize) -> Query {
    let filter = FilterExpr::eq(FdicField::Name.code(), &institution.parent_name)
        .and(FilterExpr::eq(FdicField::Zip.code(), &institution.zip));
    Query::new(limit)
        .filter(filter)
        .fields(FdicField::field_list())
        .sort(FdicField::ReportDate.code(), SortOrder::Desc)
}

/// Fetch every filing for one institution. An empty result is valid.
pub fn fetch_financials(
    source: &dyn FdicSource,
    institution: &Institution,
    limit: usize,
) -> Result<Vec<RawRecord>, DataError> {
    let page = source.query(Endpoint::Financials, &financials_query(institution, limit))?;
    if page.total.is_some_and(|t| t > page.records.len() as u64) {
        tracing::warn!(
            name = %institution.parent_name,
            zip = %institution.zip,
            "filing history truncated at {limit} records"
        );
    }
    Ok(page.records)
}
