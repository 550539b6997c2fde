//! Schema normalization: provider field codes → typed `FinancialRecord`.
//!
//! Pure functions. A record that fails here is reported back to the caller,
//! which skips it; one malformed filing must not sink a multi-thousand
//! institution run.

use super::provider::RawRecord;
use super::schema::FdicField;
use crate::domain::{normalize_zip, year_quarter, FinancialRecord};
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("invalid report date {0:?}: expected YYYYMMDD")]
    InvalidReportDate(String),

    #[error("invalid class code {0:?}")]
    InvalidClassCode(String),

    #[error("field {field}: expected a number, got {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field {field}: expected text, got {value}")]
    InvalidText { field: &'static str, value: String },
}

/// Normalize one raw provider record.
pub fn normalize(raw: &RawRecord) -> Result<FinancialRecord, NormalizeError> {
    let name = text(raw, FdicField::Name)?
        .ok_or(NormalizeError::MissingField(FdicField::Name.code()))?;
    let report_date = match raw.get(FdicField::ReportDate.code()) {
        None | Some(Value::Null) => {
            return Err(NormalizeError::MissingField(FdicField::ReportDate.code()))
        }
        Some(v) => parse_report_date(v)?,
    };
    let class_code = class_code(raw)?;
    let (year, quarter) = year_quarter(report_date);

    Ok(FinancialRecord {
        id: text(raw, FdicField::Id)?,
        name,
        zip: raw.get(FdicField::Zip.code()).and_then(zip_from_value).unwrap_or_default(),
        report_date,
        class_code,
        total_assets: number(raw, FdicField::TotalAssets)?,
        net_income_quarterly: number(raw, FdicField::NetIncomeQuarterly)?,
        offices_us: number(raw, FdicField::OfficesUs)?,
        offices_foreign: number(raw, FdicField::OfficesForeign)?,
        roa_quarterly: number(raw, FdicField::RoaQuarterly)?,
        roe_quarterly: number(raw, FdicField::RoeQuarterly)?,
        total_interest_expense_quarterly: number(raw, FdicField::TotalInterestExpenseQuarterly)?,
        non_interest_expense_quarterly: number(raw, FdicField::NonInterestExpenseQuarterly)?,
        total_deposits: number(raw, FdicField::TotalDeposits)?,
        debt_securities_maturity_1yr_or_less: number(
            raw,
            FdicField::DebtSecuritiesMaturity1yrOrLess,
        )?,
        year,
        quarter,
    })
}

/// A record the normalizer refused, with its position in the input.
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub index: usize,
    pub id: Option<String>,
    pub error: NormalizeError,
}

/// Output of [`normalize_batch`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<FinancialRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Normalize many records, keeping the good ones and logging the rest.
pub fn normalize_batch<'a, I>(raws: I) -> NormalizedBatch
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut batch = NormalizedBatch::default();
    for (index, raw) in raws.into_iter().enumerate() {
        match normalize(raw) {
            Ok(record) => batch.records.push(record),
            Err(error) => {
                let id = raw
                    .get(FdicField::Id.code())
                    .and_then(|v| v.as_str())
                    .map(String::from);
                tracing::warn!(index, id = ?id, "skipping malformed record: {error}");
                batch.rejected.push(RejectedRecord { index, id, error });
            }
        }
    }
    batch
}

/// Parse an 8-digit `YYYYMMDD` report date, given as a JSON string or integer.
pub fn parse_report_date(value: &Value) -> Result<NaiveDate, NormalizeError> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.is_u64() => n.to_string(),
        other => return Err(NormalizeError::InvalidReportDate(other.to_string())),
    };
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NormalizeError::InvalidReportDate(text));
    }
    let digits = |range: std::ops::Range<usize>| {
        text.as_bytes()[range]
            .iter()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
    };
    let (year, month, day) = (digits(0..4) as i32, digits(4..6), digits(6..8));
    NaiveDate::from_ymd_opt(year, month, day).ok_or(NormalizeError::InvalidReportDate(text))
}

/// Zip as text with leading zeros preserved.
pub(crate) fn zip_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(normalize_zip(s)),
        Value::Number(n) => n.as_u64().map(|z| format!("{z:05}")),
        _ => None,
    }
}

fn text(raw: &RawRecord, field: FdicField) -> Result<Option<String>, NormalizeError> {
    match raw.get(field.code()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(NormalizeError::InvalidText {
            field: field.code(),
            value: other.to_string(),
        }),
    }
}

fn number(raw: &RawRecord, field: FdicField) -> Result<Option<f64>, NormalizeError> {
    let invalid = |value: String| NormalizeError::InvalidNumber {
        field: field.code(),
        value,
    };
    match raw.get(field.code()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| invalid(n.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(s.clone())),
        Some(other) => Err(invalid(other.to_string())),
    }
}

fn class_code(raw: &RawRecord) -> Result<i32, NormalizeError> {
    let value = raw
        .get(FdicField::ClassCode.code())
        .filter(|v| !v.is_null())
        .ok_or(NormalizeError::MissingField(FdicField::ClassCode.code()))?;
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|c| i32::try_from(c).ok())
        .ok_or_else(|| NormalizeError::InvalidClassCode(value.to_string()))
}
