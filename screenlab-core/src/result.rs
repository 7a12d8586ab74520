//! Scored rows and per-model results.
//!
//! Rank is never stored: it is the 1-based position in a `ModelResult`,
//! whose rows are kept sorted by score descending, ticker ascending.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DataRowError;
use crate::flags::{Category, FlagSet};
use crate::metric::MetricRow;

/// One company scored by one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub row: MetricRow,
    /// Composite score in [0, 100]
    pub score: f64,
    /// Sub-score per component name
    pub components: BTreeMap<String, f64>,
    pub flags: FlagSet,
}

impl ScoredRow {
    pub fn ticker(&self) -> &str {
        self.row.ticker()
    }
}

/// A row excluded from a model's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based row position in the dataset
    pub line: usize,
    pub error: DataRowError,
}

/// How `filter_by_flags` combines the requested tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagMatch {
    Any,
    All,
}

/// Ordered output of one model run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_id: String,
    pub model_name: String,
    pub theme: Category,
    rows: Vec<ScoredRow>,
    skipped: Vec<SkippedRow>,
}

impl ModelResult {
    /// Build a result, sorting rows by score descending then ticker.
    pub fn new(
        model_id: impl Into<String>,
        model_name: impl Into<String>,
        theme: Category,
        mut rows: Vec<ScoredRow>,
        skipped: Vec<SkippedRow>,
    ) -> Self {
        rows.sort_by(compare_rows);
        Self {
            model_id: model_id.into(),
            model_name: model_name.into(),
            theme,
            rows,
            skipped,
        }
    }

    pub fn rows(&self) -> &[ScoredRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(rank, row)` pairs, rank starting at 1.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &ScoredRow)> {
        self.rows.iter().enumerate().map(|(i, r)| (i + 1, r))
    }

    pub fn rank_of(&self, ticker: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.ticker() == ticker)
            .map(|i| i + 1)
    }

    pub fn get(&self, ticker: &str) -> Option<&ScoredRow> {
        self.rows.iter().find(|r| r.ticker() == ticker)
    }

    pub fn top(&self, n: usize) -> &[ScoredRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Rows carrying any (or all) of `tags`, keeping their rank.
    pub fn filter_by_flags(&self, tags: &[&str], mode: FlagMatch) -> Vec<(usize, &ScoredRow)> {
        self.ranked()
            .filter(|(_, row)| match mode {
                FlagMatch::Any => tags.iter().any(|t| row.flags.contains(t)),
                FlagMatch::All => tags.iter().all(|t| row.flags.contains(t)),
            })
            .collect()
    }
}

fn compare_rows(a: &ScoredRow, b: &ScoredRow) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.ticker().cmp(b.ticker()))
}
