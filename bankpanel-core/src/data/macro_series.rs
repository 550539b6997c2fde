//! Macro indicator table: one row per date of the first series, one column
//! per series.

use super::panel::{date_column, write_meta, write_parquet_atomic, PanelError};
use super::provider::Observation;
use crate::domain::year_quarter;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// A provider series code and the column it lands in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub code: String,
    pub column: String,
}

impl SeriesSpec {
    pub fn new(code: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            column: column.into(),
        }
    }
}

const DEFAULT_SERIES: [(&str, &str); 27] = [
    ("GDPC1", "gdp"),
    ("CPIAUCNS", "cpi"),
    ("UNRATE", "unemployment_rate"),
    ("FEDFUNDS", "fed_fund_rate"),
    ("GS10", "treasury_10yr_constant_maturity_rate"),
    ("GPDIC1", "private_domestic_investment"),
    ("GPDIC96", "private_domestic_investment_excl_iva_ccadj"),
    ("FGEXPND", "fed_govt_expenditures"),
    ("SLEXPND", "state_local_govt_expenditures"),
    ("NETEXP", "net_exports_good_services"),
    ("HOUST", "housing_starts"),
    ("HSN1F", "new_one_family_houses_sold"),
    ("CSUSHPINSA", "case_shiller_us_national_home_price_index"),
    ("RETAILMPCSMSA", "advance_real_retail_food_services_sales"),
    ("INDPRO", "industrial_production_index"),
    ("DSPIC96", "disposable_personal_income"),
    ("RRSFS", "retail_food_services_sales"),
    ("PSAVERT", "personal_savings_rate"),
    ("UMCSENT", "umich_consumer_sentiment_index"),
    ("TDSP", "household_debt_service_payments_pct_disposable_income"),
    ("DRCCLACBS", "credit_card_delinquency_rate"),
    ("TOTALSL", "consumer_credit_owned_securitized_outstanding"),
    ("CPILFESL", "cpi_urban_consumers_less_food_energy"),
    ("AHETPI", "avg_hrly_earnings_production_nonsupervisory_employees"),
    ("MEHOINUSA672N", "real_median_household_income"),
    ("PCEC96", "pce"),
    ("TOTALSA", "total_vehicle_sales"),
];

/// The standard indicator set, in output column order.
pub fn default_series() -> Vec<SeriesSpec> {
    DEFAULT_SERIES
        .iter()
        .map(|(code, column)| SeriesSpec::new(*code, *column))
        .collect()
}

/// Indicators aligned on the first series' observation dates, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroSeriesTable {
    pub columns: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// `values[c][r]` is column `c` at `dates[r]`.
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroMeta {
    pub rows: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub columns: Vec<String>,
    pub data_hash: String,
}

impl MacroSeriesTable {
    /// Align every series on the dates of the first one.
    ///
    /// The first series (quarterly GDP by default) fixes the rows. Other
    /// series contribute only observations dated exactly on one of those
    /// rows, so monthly or annual indicators never add rows of their own.
    /// Later duplicates of a date within one series overwrite earlier ones.
    pub fn from_series(series: Vec<(SeriesSpec, Vec<Observation>)>) -> Self {
        let width = series.len();
        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = series
            .first()
            .map(|(_, index)| index.iter().map(|o| (o.date, vec![None; width])).collect())
            .unwrap_or_default();

        for (idx, (spec, observations)) in series.iter().enumerate() {
            let mut dropped = 0usize;
            for obs in observations {
                match by_date.get_mut(&obs.date) {
                    Some(row) => row[idx] = obs.value,
                    None => dropped += 1,
                }
            }
            if dropped > 0 {
                tracing::debug!(series = %spec.code, dropped, "observations off the row dates");
            }
        }

        let dates: Vec<NaiveDate> = by_date.keys().copied().collect();
        let mut values = vec![Vec::with_capacity(dates.len()); width];
        for row in by_date.into_values() {
            for (c, v) in row.into_iter().enumerate() {
                values[c].push(v);
            }
        }

        Self {
            columns: series.into_iter().map(|(spec, _)| spec.column).collect(),
            dates,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column values by name.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[idx])
    }

    pub fn to_dataframe(&self) -> Result<DataFrame, PanelError> {
        let (years, quarters): (Vec<i32>, Vec<i32>) = self
            .dates
            .iter()
            .map(|d| {
                let (y, q) = year_quarter(*d);
                (y, q as i32)
            })
            .unzip();

        let mut cols = vec![
            date_column("date", &self.dates)?,
            Column::new("year".into(), years),
            Column::new("quarter".into(), quarters),
        ];
        for (name, values) in self.columns.iter().zip(&self.values) {
            cols.push(Column::new(name.as_str().into(), values.clone()));
        }
        Ok(DataFrame::new(cols)?)
    }

    /// Write the table and its sidecar atomically.
    pub fn write(&self, path: &Path) -> Result<MacroMeta, PanelError> {
        let mut seen = HashSet::new();
        if let Some(dup) = self.columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(PanelError::Corrupt(format!("duplicate macro column {dup:?}")));
        }

        let mut df = self.to_dataframe()?;
        write_parquet_atomic(&mut df, path)?;

        let meta = MacroMeta {
            rows: self.len(),
            start_date: self.dates.first().copied(),
            end_date: self.dates.last().copied(),
            columns: self.columns.clone(),
            data_hash: blake3::hash(&serde_json::to_vec(&(&self.dates, &self.values))?)
                .to_hex()
                .to_string(),
        };
        write_meta(path, &meta)?;

        tracing::info!(
            rows = meta.rows,
            series = self.columns.len(),
            "wrote macro table to {}",
            path.display()
        );
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn obs(date: NaiveDate, value: Option<f64>) -> Observation {
        Observation { date, value }
    }

    #[test]
    fn default_table_has_unique_codes_and_columns() {
        let series = default_series();
        assert_eq!(series.len(), 27);
        let codes: HashSet<_> = series.iter().map(|s| s.code.as_str()).collect();
        let cols: HashSet<_> = series.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(codes.len(), 27);
        assert_eq!(cols.len(), 27);
        assert_eq!(series[0], SeriesSpec::new("GDPC1", "gdp"));
    }

    #[test]
    fn rows_follow_the_first_series() {
        // Quarterly GDP against monthly unemployment.
        let table = MacroSeriesTable::from_series(vec![
            (
                SeriesSpec::new("GDPC1", "gdp"),
                vec![obs(d(2000, 1, 1), Some(100.0)), obs(d(2000, 4, 1), Some(101.0))],
            ),
            (
                SeriesSpec::new("UNRATE", "unemployment_rate"),
                vec![
                    obs(d(2000, 1, 1), Some(4.0)),
                    obs(d(2000, 2, 1), None),
                    obs(d(2000, 3, 1), Some(4.1)),
                ],
            ),
        ]);

        assert_eq!(table.dates, vec![d(2000, 1, 1), d(2000, 4, 1)]);
        assert_eq!(table.column("gdp").unwrap(), &[Some(100.0), Some(101.0)]);
        assert_eq!(
            table.column("unemployment_rate").unwrap(),
            &[Some(4.0), None]
        );
    }

    #[test]
    fn one_row_per_quarter_with_mixed_frequencies() {
        let quarters: Vec<_> = (0..8u32)
            .map(|i| obs(d(2000 + (i / 4) as i32, 1 + 3 * (i % 4), 1), Some(i as f64)))
            .collect();
        let months: Vec<_> = (0..24u32)
            .map(|i| obs(d(2000 + (i / 12) as i32, 1 + i % 12, 1), Some(1.0)))
            .collect();
        let annual = vec![obs(d(2000, 1, 1), Some(50.0)), obs(d(2001, 1, 1), Some(51.0))];

        let table = MacroSeriesTable::from_series(vec![
            (SeriesSpec::new("GDPC1", "gdp"), quarters),
            (SeriesSpec::new("FEDFUNDS", "fed_fund_rate"), months),
            (SeriesSpec::new("MEHOINUSA672N", "real_median_household_income"), annual),
        ]);
        assert_eq!(table.len(), 8);

        let keys: HashSet<_> = table.dates.iter().map(|d| year_quarter(*d)).collect();
        assert_eq!(keys.len(), table.len());
        assert!(table.column("fed_fund_rate").unwrap().iter().all(|v| v.is_some()));
        let income = table.column("real_median_household_income").unwrap();
        assert_eq!(income.iter().filter(|v| v.is_some()).count(), 2);
    }

    #[test]
    fn empty_first_series_means_no_rows() {
        let table = MacroSeriesTable::from_series(vec![
            (SeriesSpec::new("GDPC1", "gdp"), vec![]),
            (
                SeriesSpec::new("UNRATE", "unemployment_rate"),
                vec![obs(d(2000, 1, 1), Some(4.0))],
            ),
        ]);
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 2);
    }

    #[test]
    fn dataframe_has_year_and_quarter() {
        let table = MacroSeriesTable::from_series(vec![(
            SeriesSpec::new("FEDFUNDS", "fed_fund_rate"),
            vec![obs(d(2023, 7, 1), Some(5.12)), obs(d(2023, 12, 1), Some(5.33))],
        )]);
        let df = table.to_dataframe().unwrap();
        let names: Vec<_> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["date", "year", "quarter", "fed_fund_rate"]);
        let q = df.column("quarter").unwrap().i32().unwrap();
        assert_eq!(q.get(0), Some(3));
        assert_eq!(q.get(1), Some(4));
    }

    #[test]
    fn empty_series_list_is_empty_table() {
        let table = MacroSeriesTable::from_series(vec![]);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }

    #[test]
    fn write_rejects_duplicate_columns() {
        let table = MacroSeriesTable::from_series(vec![
            (SeriesSpec::new("A", "x"), vec![]),
            (SeriesSpec::new("B", "x"), vec![]),
        ]);
        let path = std::env::temp_dir().join(format!(
            "bankpanel_macro_dup_{}.parquet",
            std::process::id()
        ));
        assert!(matches!(table.write(&path), Err(PanelError::Corrupt(_))));
    }
}
