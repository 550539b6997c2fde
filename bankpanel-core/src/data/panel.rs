//! Parquet persistence for the bank panel.
//!
//! Writes are atomic (write `.tmp`, rename into place) and byte-for-byte
//! reproducible: the same rows always yield the same file and the same
//! `.meta.json` sidecar, which carries no wall-clock fields.

use super::schema::{PanelSchema, SchemaError};
use crate::domain::AggregatedFinancialRow;
use chrono::{NaiveDate, TimeDelta};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("metadata serialization: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("CSV export: {0}")]
    Csv(#[from] csv::Error),

    #[error("corrupt panel: {0}")]
    Corrupt(String),
}

impl PanelError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        PanelError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Sidecar written next to every artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelMeta {
    pub rows: usize,
    pub institutions: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub columns: Vec<String>,
    pub data_hash: String,
}

impl PanelMeta {
    /// Load the sidecar of the artifact at `path`, if one exists.
    pub fn load(path: &Path) -> Result<Option<Self>, PanelError> {
        let meta_path = meta_path(path);
        match fs::read_to_string(&meta_path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PanelError::io(&meta_path, e)),
        }
    }
}

/// `<file>.meta.json` next to `path`.
pub fn meta_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("panel"));
    name.push(".meta.json");
    path.with_file_name(name)
}

pub struct PanelWriter {
    path: PathBuf,
}

impl PanelWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Serialize `rows` in the given order, replacing any previous file.
    pub fn write(&self, rows: &[AggregatedFinancialRow]) -> Result<PanelMeta, PanelError> {
        let mut df = rows_to_dataframe(rows)?;
        PanelSchema::validate(&df)?;
        write_parquet_atomic(&mut df, &self.path)?;

        let meta = PanelMeta {
            rows: rows.len(),
            institutions: rows.iter().map(|r| r.name.as_str()).collect::<BTreeSet<_>>().len(),
            start_date: rows.iter().map(|r| r.date).min(),
            end_date: rows.iter().map(|r| r.date).max(),
            columns: df.get_column_names().iter().map(|c| c.to_string()).collect(),
            data_hash: blake3::hash(&serde_json::to_vec(rows)?).to_hex().to_string(),
        };
        write_meta(&self.path, &meta)?;

        tracing::info!(
            rows = meta.rows,
            institutions = meta.institutions,
            "wrote bank panel to {}",
            self.path.display()
        );
        Ok(meta)
    }
}

pub(crate) fn write_meta<M: Serialize>(path: &Path, meta: &M) -> Result<(), PanelError> {
    let meta_path = meta_path(path);
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(&meta_path, json).map_err(|e| PanelError::io(&meta_path, e))
}

/// Write `df` to `path` via a sibling `.tmp` file and a rename.
pub fn write_parquet_atomic(df: &mut DataFrame, path: &Path) -> Result<(), PanelError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| PanelError::io(dir, e))?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("panel"));
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let file = fs::File::create(&tmp_path).map_err(|e| PanelError::io(&tmp_path, e))?;
    if let Err(e) = ParquetWriter::new(file).finish(df) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        PanelError::io(path, e)
    })
}

pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}

pub(crate) fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::default().checked_add_signed(TimeDelta::days(days as i64))
}

/// A `Date` column from calendar dates.
pub(crate) fn date_column(name: &str, dates: &[NaiveDate]) -> Result<Column, PanelError> {
    let days: Vec<i32> = dates.iter().map(|d| epoch_days(*d)).collect();
    Ok(Column::new(name.into(), days).cast(&DataType::Date)?)
}

fn rows_to_dataframe(rows: &[AggregatedFinancialRow]) -> Result<DataFrame, PanelError> {
    let amount = |f: fn(&AggregatedFinancialRow) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter().map(f).collect()
    };
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();

    Ok(DataFrame::new(vec![
        Column::new(
            "name".into(),
            rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        ),
        date_column("date", &dates)?,
        Column::new("year".into(), rows.iter().map(|r| r.year).collect::<Vec<i32>>()),
        Column::new(
            "quarter".into(),
            rows.iter().map(|r| r.quarter as i32).collect::<Vec<i32>>(),
        ),
        Column::new("total_assets".into(), amount(|r| r.total_assets)),
        Column::new(
            "net_income_quarterly".into(),
            amount(|r| r.net_income_quarterly),
        ),
        Column::new(
            "total_interest_expense_quarterly".into(),
            amount(|r| r.total_interest_expense_quarterly),
        ),
        Column::new(
            "non_interest_expense_quarterly".into(),
            amount(|r| r.non_interest_expense_quarterly),
        ),
        Column::new("total_deposits".into(), amount(|r| r.total_deposits)),
        Column::new(
            "debt_securities_maturity_1yr_or_less".into(),
            amount(|r| r.debt_securities_maturity_1yr_or_less),
        ),
    ])?)
}

/// Load a panel file and check it against the panel schema.
pub fn read_panel(path: &Path) -> Result<DataFrame, PanelError> {
    let file = fs::File::open(path).map_err(|e| PanelError::io(path, e))?;
    let df = ParquetReader::new(file).finish()?;
    PanelSchema::validate(&df)?;
    Ok(df)
}

/// Load a panel file back into rows, in file order.
pub fn read_panel_rows(path: &Path) -> Result<Vec<AggregatedFinancialRow>, PanelError> {
    let df = read_panel(path)?;

    let names = df.column("name")?.str()?;
    let dates = df.column("date")?.date()?;
    let years = df.column("year")?.i32()?;
    let quarters = df.column("quarter")?.i32()?;
    let amounts = [
        "total_assets",
        "net_income_quarterly",
        "total_interest_expense_quarterly",
        "non_interest_expense_quarterly",
        "total_deposits",
        "debt_securities_maturity_1yr_or_less",
    ]
    .iter()
    .map(|c| df.column(c).and_then(|col| col.f64().cloned()))
    .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let corrupt = |what: &str| PanelError::Corrupt(format!("null {what} at row {i}"));
        let date = dates
            .physical()
            .get(i)
            .and_then(from_epoch_days)
            .ok_or_else(|| corrupt("date"))?;
        rows.push(AggregatedFinancialRow {
            name: names.get(i).ok_or_else(|| corrupt("name"))?.to_string(),
            date,
            year: years.get(i).ok_or_else(|| corrupt("year"))?,
            quarter: quarters.get(i).ok_or_else(|| corrupt("quarter"))? as u32,
            total_assets: amounts[0].get(i),
            net_income_quarterly: amounts[1].get(i),
            total_interest_expense_quarterly: amounts[2].get(i),
            non_interest_expense_quarterly: amounts[3].get(i),
            total_deposits: amounts[4].get(i),
            debt_securities_maturity_1yr_or_less: amounts[5].get(i),
        });
    }
    Ok(rows)
}

/// Row count and total assets for one calendar quarter of the panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterSummary {
    pub year: i32,
    pub quarter: u32,
    pub rows: u64,
    pub total_assets: f64,
}

/// Per-quarter totals computed by a lazy scan over the panel file.
pub fn quarterly_summary(path: &Path) -> Result<Vec<QuarterSummary>, PanelError> {
    if !path.exists() {
        return Err(PanelError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "panel file not found"),
        ));
    }

    let df = LazyFrame::scan_parquet(path, Default::default())?
        .group_by([col("year"), col("quarter")])
        .agg([
            len().cast(DataType::UInt64).alias("rows"),
            col("total_assets").sum().alias("total_assets"),
        ])
        .sort(["year", "quarter"], SortMultipleOptions::default())
        .collect()?;

    let years = df.column("year")?.i32()?;
    let quarters = df.column("quarter")?.i32()?;
    let counts = df.column("rows")?.u64()?;
    let assets = df.column("total_assets")?.f64()?;

    Ok((0..df.height())
        .filter_map(|i| {
            Some(QuarterSummary {
                year: years.get(i)?,
                quarter: quarters.get(i)? as u32,
                rows: counts.get(i).unwrap_or(0),
                total_assets: assets.get(i).unwrap_or(0.0),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("bankpanel_panel_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn row(name: &str, y: i32, m: u32, d: u32, assets: Option<f64>) -> AggregatedFinancialRow {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        AggregatedFinancialRow {
            name: name.into(),
            date,
            year: y,
            quarter: (m - 1) / 3 + 1,
            total_assets: assets,
            net_income_quarterly: Some(1.0),
            total_interest_expense_quarterly: None,
            non_interest_expense_quarterly: Some(2.5),
            total_deposits: Some(80.0),
            debt_securities_maturity_1yr_or_less: None,
        }
    }

    fn sample_rows() -> Vec<AggregatedFinancialRow> {
        vec![
            row("Acme Holding", 2020, 3, 31, Some(120.0)),
            row("Acme Holding", 2020, 6, 30, Some(150.0)),
            row("Beta Bank", 2020, 6, 30, None),
        ]
    }

    #[test]
    fn write_then_read_preserves_rows_and_order() {
        let dir = temp_dir();
        let path = dir.join("fdic_financials.parquet");
        let rows = sample_rows();

        let meta = PanelWriter::new(&path).write(&rows).unwrap();
        assert_eq!(meta.rows, 3);
        assert_eq!(meta.institutions, 2);
        assert_eq!(meta.start_date, NaiveDate::from_ymd_opt(2020, 3, 31));
        assert_eq!(meta.end_date, NaiveDate::from_ymd_opt(2020, 6, 30));

        assert_eq!(read_panel_rows(&path).unwrap(), rows);
        assert_eq!(PanelMeta::load(&path).unwrap(), Some(meta));
        assert!(!dir.join("fdic_financials.parquet.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rewriting_same_rows_is_byte_identical() {
        let dir = temp_dir();
        let path = dir.join("panel.parquet");
        let writer = PanelWriter::new(&path);

        writer.write(&sample_rows()).unwrap();
        let first = fs::read(&path).unwrap();
        let first_meta = fs::read(meta_path(&path)).unwrap();

        writer.write(&sample_rows()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
        assert_eq!(fs::read(meta_path(&path)).unwrap(), first_meta);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn written_file_matches_panel_schema() {
        let dir = temp_dir();
        let path = dir.join("panel.parquet");
        PanelWriter::new(&path).write(&sample_rows()).unwrap();

        let df = read_panel(&path).unwrap();
        let names: Vec<_> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, crate::data::schema::PANEL_COLUMNS.to_vec());
        assert_eq!(df.column("total_assets").unwrap().null_count(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn summary_groups_by_quarter() {
        let dir = temp_dir();
        let path = dir.join("panel.parquet");
        PanelWriter::new(&path).write(&sample_rows()).unwrap();

        let summary = quarterly_summary(&path).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!((summary[0].year, summary[0].quarter, summary[0].rows), (2020, 1, 1));
        assert_eq!((summary[1].quarter, summary[1].rows), (2, 2));
        assert_eq!(summary[1].total_assets, 150.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_panel_is_valid() {
        let dir = temp_dir();
        let path = dir.join("empty.parquet");
        let meta = PanelWriter::new(&path).write(&[]).unwrap();
        assert_eq!(meta.rows, 0);
        assert_eq!(meta.start_date, None);
        assert!(read_panel_rows(&path).unwrap().is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = temp_dir().join("nope.parquet");
        assert!(matches!(read_panel(&path), Err(PanelError::Io { .. })));
        assert!(matches!(quarterly_summary(&path), Err(PanelError::Io { .. })));
    }

    #[test]
    fn epoch_day_conversion() {
        let d = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(epoch_days(d), 10_957);
        assert_eq!(from_epoch_days(10_957), Some(d));
    }
}
