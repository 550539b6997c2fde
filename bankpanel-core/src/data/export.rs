//! CSV copy of the bank panel for spreadsheet users.

use super::panel::PanelError;
use super::schema::PANEL_COLUMNS;
use crate::domain::AggregatedFinancialRow;
use std::fs;
use std::path::Path;

fn amount(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Render rows as CSV. Missing amounts are empty cells.
pub fn panel_csv(rows: &[AggregatedFinancialRow]) -> Result<String, PanelError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(PANEL_COLUMNS)?;

    for r in rows {
        wtr.write_record([
            r.name.clone(),
            r.date.to_string(),
            r.year.to_string(),
            r.quarter.to_string(),
            amount(r.total_assets),
            amount(r.net_income_quarterly),
            amount(r.total_interest_expense_quarterly),
            amount(r.non_interest_expense_quarterly),
            amount(r.total_deposits),
            amount(r.debt_securities_maturity_1yr_or_less),
        ])?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| PanelError::Corrupt(format!("failed to flush CSV writer: {e}")))?;
    String::from_utf8(data).map_err(|e| PanelError::Corrupt(format!("CSV is not UTF-8: {e}")))
}

/// Write the CSV copy to `path`.
pub fn export_csv(rows: &[AggregatedFinancialRow], path: &Path) -> Result<(), PanelError> {
    let text = panel_csv(rows)?;
    fs::write(path, text).map_err(|source| PanelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn header_and_missing_cells() {
        let rows = vec![AggregatedFinancialRow {
            name: "Acme, Holding".into(),
            date: NaiveDate::from_ymd_opt(2020, 6, 30).unwrap(),
            year: 2020,
            quarter: 2,
            total_assets: Some(150.0),
            net_income_quarterly: None,
            total_interest_expense_quarterly: Some(1.5),
            non_interest_expense_quarterly: None,
            total_deposits: None,
            debt_securities_maturity_1yr_or_less: None,
        }];
        let csv = panel_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), PANEL_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "\"Acme, Holding\",2020-06-30,2020,2,150,,1.5,,,"
        );
        assert!(lines.next().is_none());
    }
}
