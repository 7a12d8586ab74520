//! Scanning a dataset with a compiled model.
//!
//! Steps, identical for every model:
//! 1. check the dataset has every required column (else `ScanError`)
//! 2. validate each row; bad rows are skipped and reported
//! 3. compute derived metrics, component sub-scores and the weighted total
//! 4. evaluate flags, then sort into a `ModelResult`

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::Model;
use crate::error::{DataRowError, ScanError};
use crate::flags::evaluate_flags;
use crate::metric::{Dataset, MetricRow};
use crate::result::{ModelResult, ScoredRow, SkippedRow};

impl Model {
    /// Score every row of `dataset`.
    pub fn score(&self, dataset: &Dataset) -> Result<ModelResult, ScanError> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|c| !dataset.has_column(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ScanError::MissingColumns {
                dataset: dataset.name.clone(),
                missing,
            });
        }

        let mut rows = Vec::with_capacity(dataset.len());
        let mut skipped = Vec::new();
        let mut seen = BTreeSet::new();

        for (idx, raw) in dataset.rows.iter().enumerate() {
            let line = idx + 1;
            let outcome = MetricRow::from_raw(raw, line, &self.used, &self.required)
                .and_then(|row| {
                    if seen.insert(row.ticker().to_string()) {
                        Ok(row)
                    } else {
                        Err(DataRowError::DuplicateTicker {
                            ticker: row.ticker().to_string(),
                        })
                    }
                });
            match outcome {
                Ok(row) => rows.push(self.score_row(row)),
                Err(error) => {
                    debug!(model = %self.id(), line, %error, "row skipped");
                    skipped.push(SkippedRow { line, error });
                }
            }
        }

        if !skipped.is_empty() {
            warn!(
                model = %self.id(),
                dataset = %dataset.name,
                skipped = skipped.len(),
                "rows excluded from scan"
            );
        }

        Ok(ModelResult::new(
            self.id(),
            self.name(),
            self.theme(),
            rows,
            skipped,
        ))
    }

    /// Score one validated row.
    pub fn score_row(&self, row: MetricRow) -> ScoredRow {
        let row = self.derive(row);

        let mut components = BTreeMap::new();
        let mut total = 0.0;
        for component in &self.components {
            let sub = component.score(&row);
            total += component.weight * sub;
            components.insert(component.name.clone(), sub);
        }

        let flags = evaluate_flags(&row, &self.flags);
        ScoredRow {
            row,
            score: total.clamp(0.0, 100.0),
            components,
            flags,
        }
    }

    fn derive(&self, row: MetricRow) -> MetricRow {
        self.derived.iter().fold(row, |row, d| {
            let value = d.expr.evaluate(&row);
            row.with_metric(&d.name, value)
        })
    }
}
