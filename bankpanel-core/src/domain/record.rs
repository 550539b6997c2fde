//! Financial statement records before and after aggregation.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar (not fiscal) year and quarter of a date. Quarter is 1..=4.
pub fn year_quarter(date: NaiveDate) -> (i32, u32) {
    (date.year(), (date.month() - 1) / 3 + 1)
}

/// One reporting-period observation for one filer, after normalization.
///
/// Amounts are in the provider's reporting unit (thousands of USD) and are
/// `None` when the provider left the field empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub id: Option<String>,
    pub name: String,
    pub zip: String,
    pub report_date: NaiveDate,
    pub class_code: i32,
    pub total_assets: Option<f64>,
    pub net_income_quarterly: Option<f64>,
    pub offices_us: Option<f64>,
    pub offices_foreign: Option<f64>,
    pub roa_quarterly: Option<f64>,
    pub roe_quarterly: Option<f64>,
    pub total_interest_expense_quarterly: Option<f64>,
    pub non_interest_expense_quarterly: Option<f64>,
    pub total_deposits: Option<f64>,
    pub debt_securities_maturity_1yr_or_less: Option<f64>,
    pub year: i32,
    pub quarter: u32,
}

/// One row of the bank panel: every filing for a (name, date) pair, summed.
///
/// Only additive amounts survive aggregation. Ratios, office counts and
/// identifiers have no field here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFinancialRow {
    pub name: String,
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: u32,
    pub total_assets: Option<f64>,
    pub net_income_quarterly: Option<f64>,
    pub total_interest_expense_quarterly: Option<f64>,
    pub non_interest_expense_quarterly: Option<f64>,
    pub total_deposits: Option<f64>,
    pub debt_securities_maturity_1yr_or_less: Option<f64>,
}

impl AggregatedFinancialRow {
    /// Seed a group from its first member.
    pub fn from_record(record: &FinancialRecord) -> Self {
        Self {
            name: record.name.clone(),
            date: record.report_date,
            year: record.year,
            quarter: record.quarter,
            total_assets: record.total_assets,
            net_income_quarterly: record.net_income_quarterly,
            total_interest_expense_quarterly: record.total_interest_expense_quarterly,
            non_interest_expense_quarterly: record.non_interest_expense_quarterly,
            total_deposits: record.total_deposits,
            debt_securities_maturity_1yr_or_less: record.debt_securities_maturity_1yr_or_less,
        }
    }

    /// Add another member of the same group into this row.
    pub fn absorb(&mut self, record: &FinancialRecord) {
        debug_assert_eq!(self.name, record.name);
        debug_assert_eq!(self.date, record.report_date);

        self.total_assets = sum_present(self.total_assets, record.total_assets);
        self.net_income_quarterly =
            sum_present(self.net_income_quarterly, record.net_income_quarterly);
        self.total_interest_expense_quarterly = sum_present(
            self.total_interest_expense_quarterly,
            record.total_interest_expense_quarterly,
        );
        self.non_interest_expense_quarterly = sum_present(
            self.non_interest_expense_quarterly,
            record.non_interest_expense_quarterly,
        );
        self.total_deposits = sum_present(self.total_deposits, record.total_deposits);
        self.debt_securities_maturity_1yr_or_less = sum_present(
            self.debt_securities_maturity_1yr_or_less,
            record.debt_securities_maturity_1yr_or_less,
        );
    }
}

/// Sum that skips missing values; missing only if both sides are missing.
pub fn sum_present(acc: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(b)) => Some(a + b),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn quarter_boundaries() {
        assert_eq!(year_quarter(date(2023, 7, 15)), (2023, 3));
        assert_eq!(year_quarter(date(2000, 1, 1)), (2000, 1));
        assert_eq!(year_quarter(date(2020, 3, 31)), (2020, 1));
        assert_eq!(year_quarter(date(2020, 4, 1)), (2020, 2));
        assert_eq!(year_quarter(date(1999, 12, 31)), (1999, 4));
    }

    #[test]
    fn missing_is_not_zero() {
        assert_eq!(sum_present(None, None), None);
        assert_eq!(sum_present(Some(1.0), None), Some(1.0));
        assert_eq!(sum_present(None, Some(2.0)), Some(2.0));
        assert_eq!(sum_present(Some(1.0), Some(2.0)), Some(3.0));
        assert_eq!(sum_present(None, Some(0.0)), Some(0.0));
    }
}
