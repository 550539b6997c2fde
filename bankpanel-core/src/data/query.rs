//! Typed BankFind query construction.
//!
//! Exact-match values are always quoted and escaped, so a holding company
//! named `Smith "Family" Bancorp` produces a valid clause instead of a broken
//! query that silently matches nothing.

use std::fmt;

/// A BankFind filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    /// `FIELD:"value"`, exact match on a text field.
    Eq { field: String, value: String },
    /// `FIELD:n`, used for numeric flags such as `ACTIVE:1`.
    Flag { field: String, value: i64 },
    /// Conjunction of clauses.
    And(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn flag(field: impl Into<String>, value: i64) -> Self {
        FilterExpr::Flag {
            field: field.into(),
            value,
        }
    }

    /// Combine with another clause, flattening nested conjunctions.
    pub fn and(self, other: FilterExpr) -> Self {
        let mut clauses = match self {
            FilterExpr::And(c) => c,
            single => vec![single],
        };
        match other {
            FilterExpr::And(c) => clauses.extend(c),
            single => clauses.push(single),
        }
        FilterExpr::And(clauses)
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Eq { field, value } => write!(f, "{field}:\"{}\"", escape_value(value)),
            FilterExpr::Flag { field, value } => write!(f, "{field}:{value}"),
            FilterExpr::And(clauses) => {
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    match clause {
                        FilterExpr::And(_) => write!(f, "({clause})")?,
                        _ => write!(f, "{clause}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Backslash-escape the characters that terminate or escape a quoted value.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One BankFind request: filter, field list, sort and limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub filter: Option<FilterExpr>,
    pub fields: Vec<String>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub limit: usize,
}

impl Query {
    pub fn new(limit: usize) -> Self {
        Self {
            filter: None,
            fields: Vec::new(),
            sort_by: None,
            sort_order: SortOrder::Desc,
            limit,
        }
    }

    pub fn filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    /// Query-string parameters, in a stable order.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(6);
        if let Some(filter) = &self.filter {
            params.push(("filters", filter.to_string()));
        }
        if !self.fields.is_empty() {
            params.push(("fields", self.fields.join(",")));
        }
        if let Some(sort_by) = &self.sort_by {
            params.push(("sort_by", sort_by.clone()));
            params.push(("sort_order", self.sort_order.as_str().to_string()));
        }
        params.push(("limit", self.limit.to_string()));
        params.push(("format", "json".to_string()));
        params
    }
}
