//! Metric rows: the normalized per-company input of every model.
//!
//! A `Dataset` is one table: a set of column names plus raw rows whose cells
//! are already split into numbers, explicit missing values, and malformed
//! text. `MetricRow` is the immutable, validated view a model scores.
//!
//! Missing values are `None`. They are never coerced to zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::DataRowError;

/// Standardized metric names understood by model definitions.
///
/// Percent-type metrics are in percentage points (`25.0` = 25%).
pub const STANDARD_METRICS: &[&str] = &[
    "ROE",
    "ROA",
    "ROE_QQ",
    "ROE_YY",
    "ROA_QQ",
    "ROA_YY",
    "OpMargin",
    "Margin_QQ",
    "Margin_YY",
    "Margin_Op_QQ",
    "Margin_Op_YY",
    "Margin_Net_YY",
    "P_E",
    "P_E_QQ",
    "P_E_YY",
    "P_BV",
    "P_BV_QQ",
    "P_BV_YY",
    "P_EBIT",
    "EV_EBITDA",
    "EBIT_3Y",
    "Rev_QQ",
    "Rev_YY",
    "Rev_O4K",
    "Rev_3Y",
    "Debt_Ratio",
    "Asset_Coverage",
    "Coverage_I",
    "Current_Ratio",
    "Cash_Conv",
];

/// Whether `name` is one of the standardized metric names.
pub fn is_standard_metric(name: &str) -> bool {
    STANDARD_METRICS.contains(&name)
}

/// One cell of a raw input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Missing,
    /// Text that could not be read as a number; kept for error reporting.
    Malformed(String),
}

impl Cell {
    /// Classify a raw text cell.
    ///
    /// Empty, `-`, `n/a` and `NA` are missing. A trailing `%` is ignored.
    /// Non-finite numbers are malformed.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed == "-"
            || trimmed.eq_ignore_ascii_case("n/a")
            || trimmed.eq_ignore_ascii_case("na")
        {
            return Cell::Missing;
        }
        let numeric = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        match numeric.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            _ => Cell::Malformed(trimmed.to_string()),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Cell::Number(v),
            Some(v) => Cell::Malformed(v.to_string()),
            None => Cell::Missing,
        }
    }
}

/// A raw input row before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub ticker: String,
    pub cells: BTreeMap<String, Cell>,
}

/// One normalized input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub columns: BTreeSet<String>,
    pub rows: Vec<RawRow>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: BTreeSet<String>, rows: Vec<RawRow>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Build a dataset from the core input boundary: ticker → metric → value.
    ///
    /// Columns are the union of all metric names present in any row.
    pub fn from_values(
        name: impl Into<String>,
        values: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    ) -> Self {
        let mut columns = BTreeSet::new();
        let rows = values
            .into_iter()
            .map(|(ticker, metrics)| {
                let cells = metrics
                    .into_iter()
                    .map(|(metric, value)| {
                        columns.insert(metric.clone());
                        (metric, Cell::from(value))
                    })
                    .collect();
                RawRow { ticker, cells }
            })
            .collect();
        Self::new(name, columns, rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }
}

/// A validated company row: ticker plus metric values, `None` for missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    ticker: String,
    metrics: BTreeMap<String, Option<f64>>,
}

impl MetricRow {
    pub fn new(ticker: impl Into<String>, metrics: BTreeMap<String, Option<f64>>) -> Self {
        Self {
            ticker: ticker.into(),
            metrics,
        }
    }

    /// Validate a raw row against the metrics a model reads.
    ///
    /// Only `used` metrics are inspected: a malformed cell in a column the
    /// model never reads does not exclude the row. Every `required` metric
    /// must be present and numeric.
    pub fn from_raw(
        raw: &RawRow,
        line: usize,
        used: &BTreeSet<String>,
        required: &BTreeSet<String>,
    ) -> Result<Self, DataRowError> {
        let ticker = raw.ticker.trim();
        if ticker.is_empty() {
            return Err(DataRowError::EmptyTicker { line });
        }

        let mut metrics = BTreeMap::new();
        for metric in used {
            let value = match raw.cells.get(metric) {
                Some(Cell::Number(v)) => Some(*v),
                Some(Cell::Missing) | None => None,
                Some(Cell::Malformed(text)) => {
                    return Err(DataRowError::Malformed {
                        ticker: ticker.to_string(),
                        metric: metric.clone(),
                        raw: text.clone(),
                    })
                }
            };
            if value.is_none() && required.contains(metric) {
                return Err(DataRowError::MissingRequired {
                    ticker: ticker.to_string(),
                    metric: metric.clone(),
                });
            }
            metrics.insert(metric.clone(), value);
        }

        Ok(Self::new(ticker, metrics))
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Value of a metric, `None` when missing or absent.
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied().flatten()
    }

    pub fn metrics(&self) -> &BTreeMap<String, Option<f64>> {
        &self.metrics
    }

    /// Return a copy with an extra (derived) metric.
    pub(crate) fn with_metric(mut self, name: &str, value: Option<f64>) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }
}

/// Expression for a metric computed from other metrics of the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricExpr {
    /// Arithmetic mean; missing if any input is missing.
    Mean(Vec<String>),
    /// `num / den`; missing if either is missing or `den == 0`.
    Ratio { num: String, den: String },
    /// Population standard deviation over mean; missing if any input is
    /// missing or the mean is not positive.
    CoefVar(Vec<String>),
}

impl MetricExpr {
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Mean(names) | Self::CoefVar(names) => names.iter().map(String::as_str).collect(),
            Self::Ratio { num, den } => vec![num.as_str(), den.as_str()],
        }
    }

    pub fn evaluate(&self, row: &MetricRow) -> Option<f64> {
        match self {
            Self::Mean(names) => {
                let values = collect_all(row, names)?;
                mean(&values)
            }
            Self::Ratio { num, den } => {
                let n = row.get(num)?;
                let d = row.get(den)?;
                if d == 0.0 {
                    None
                } else {
                    Some(n / d)
                }
            }
            Self::CoefVar(names) => {
                let values = collect_all(row, names)?;
                let avg = mean(&values)?;
                if avg <= 0.0 {
                    return None;
                }
                let variance =
                    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
                Some(variance.sqrt() / avg)
            }
        }
    }
}

fn collect_all(row: &MetricRow, names: &[String]) -> Option<Vec<f64>> {
    names.iter().map(|n| row.get(n)).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// A named derived metric declared by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub name: String,
    pub expr: MetricExpr,
}
