//! Provider field codes and the on-disk panel schema.

use polars::prelude::*;

/// FDIC financials field codes and the column names they map to.
///
/// The mapping is 1:1; `FdicField::ALL` is the requested field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FdicField {
    Id,
    Name,
    Zip,
    ReportDate,
    ClassCode,
    TotalAssets,
    NetIncomeQuarterly,
    OfficesUs,
    OfficesForeign,
    RoaQuarterly,
    RoeQuarterly,
    TotalInterestExpenseQuarterly,
    NonInterestExpenseQuarterly,
    TotalDeposits,
    DebtSecuritiesMaturity1yrOrLess,
}

impl FdicField {
    pub const ALL: [FdicField; 15] = [
        FdicField::Id,
        FdicField::Name,
        FdicField::Zip,
        FdicField::ReportDate,
        FdicField::ClassCode,
        FdicField::TotalAssets,
        FdicField::NetIncomeQuarterly,
        FdicField::OfficesUs,
        FdicField::OfficesForeign,
        FdicField::RoaQuarterly,
        FdicField::RoeQuarterly,
        FdicField::TotalInterestExpenseQuarterly,
        FdicField::NonInterestExpenseQuarterly,
        FdicField::TotalDeposits,
        FdicField::DebtSecuritiesMaturity1yrOrLess,
    ];

    /// Provider field code.
    pub fn code(&self) -> &'static str {
        match self {
            FdicField::Id => "ID",
            FdicField::Name => "NAMEHCR",
            FdicField::Zip => "ZIP",
            FdicField::ReportDate => "REPDTE",
            FdicField::ClassCode => "CLCODE",
            FdicField::TotalAssets => "ASSET",
            FdicField::NetIncomeQuarterly => "NETINCQ",
            FdicField::OfficesUs => "OFFOA",
            FdicField::OfficesForeign => "OFFFOR",
            FdicField::RoaQuarterly => "ROAQ",
            FdicField::RoeQuarterly => "ROEQ",
            FdicField::TotalInterestExpenseQuarterly => "EINTXQA",
            FdicField::NonInterestExpenseQuarterly => "NONIXQA",
            FdicField::TotalDeposits => "DEP",
            FdicField::DebtSecuritiesMaturity1yrOrLess => "SC1LES",
        }
    }

    /// Domain column name.
    pub fn column(&self) -> &'static str {
        match self {
            FdicField::Id => "id",
            FdicField::Name => "name",
            FdicField::Zip => "zip",
            FdicField::ReportDate => "date",
            FdicField::ClassCode => "class_code",
            FdicField::TotalAssets => "total_assets",
            FdicField::NetIncomeQuarterly => "net_income_quarterly",
            FdicField::OfficesUs => "offices_us",
            FdicField::OfficesForeign => "offices_foreign",
            FdicField::RoaQuarterly => "roa_quarterly",
            FdicField::RoeQuarterly => "roe_quarterly",
            FdicField::TotalInterestExpenseQuarterly => "total_interest_expense_quarterly",
            FdicField::NonInterestExpenseQuarterly => "non_interest_expense_quarterly",
            FdicField::TotalDeposits => "total_deposits",
            FdicField::DebtSecuritiesMaturity1yrOrLess => "debt_securities_maturity_1yr_or_less",
        }
    }

    /// Comma-joined field list for the `fields` query parameter.
    pub fn field_list() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.code()).collect()
    }
}

/// Directory fields needed to identify an institution.
pub const DIRECTORY_FIELDS: [&str; 2] = ["NAMEHCR", "ZIP"];

/// Column order of the bank panel file.
pub const PANEL_COLUMNS: [&str; 10] = [
    "name",
    "date",
    "year",
    "quarter",
    "total_assets",
    "net_income_quarterly",
    "total_interest_expense_quarterly",
    "non_interest_expense_quarterly",
    "total_deposits",
    "debt_securities_maturity_1yr_or_less",
];

/// Expected schema for the aggregated bank panel.
pub struct PanelSchema;

impl PanelSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(PANEL_COLUMNS.iter().map(|name| {
            let dtype = match *name {
                "name" => DataType::String,
                "date" => DataType::Date,
                "year" | "quarter" => DataType::Int32,
                _ => DataType::Float64,
            };
            Field::new((*name).into(), dtype)
        }))
    }

    /// Validate a DataFrame against the panel schema.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn translation_table_is_one_to_one() {
        let codes: HashSet<_> = FdicField::ALL.iter().map(|f| f.code()).collect();
        let cols: HashSet<_> = FdicField::ALL.iter().map(|f| f.column()).collect();
        assert_eq!(codes.len(), FdicField::ALL.len());
        assert_eq!(cols.len(), FdicField::ALL.len());
    }

    #[test]
    fn field_list_has_no_aggregation_terms() {
        let list = FdicField::field_list();
        assert!(list.contains(&"REPDTE"));
        assert!(list.contains(&"SC1LES"));
        assert_eq!(list.len(), 15);
    }

    #[test]
    fn panel_schema_order() {
        let schema = PanelSchema::schema();
        let names: Vec<_> = schema.iter_names().map(|n| n.to_string()).collect();
        assert_eq!(names, PANEL_COLUMNS.to_vec());
        assert_eq!(schema.get("date"), Some(&DataType::Date));
    }

    #[test]
    fn validate_rejects_missing_column() {
        let df = DataFrame::new(vec![Column::new("name".into(), &["Acme"])]).unwrap();
        assert!(matches!(
            PanelSchema::validate(&df),
            Err(SchemaError::MissingColumn(_))
        ));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let mut columns = Vec::new();
        for name in PANEL_COLUMNS {
            let col = match name {
                "name" => Column::new(name.into(), &["Acme"]),
                "date" => Column::new(name.into(), &[18_443i32])
                    .cast(&DataType::Date)
                    .unwrap(),
                "year" | "quarter" => Column::new(name.into(), &[1i32]),
                // Wrong: amounts stored as text
                _ => Column::new(name.into(), &["100"]),
            };
            columns.push(col);
        }
        let df = DataFrame::new(columns).unwrap();
        assert!(matches!(
            PanelSchema::validate(&df),
            Err(SchemaError::TypeMismatch { .. })
        ));
    }
}
