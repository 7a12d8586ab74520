//! Metric scorer: step-function lookup tables mapping one metric value to a
//! 0-100 sub-score.
//!
//! Buckets are half-open `[lower, upper)` ranges with a constant score each.
//! A table may instead close its buckets on the upper edge, `(lower, upper]`,
//! for metrics whose thresholds read as "above X". A table is validated once at construction: buckets must be contiguous,
//! non-empty and in ascending order, and every real value must land either
//! in a bucket or in an explicit `below` / `above` fallback. Scoring itself
//! never fails.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One `[lower, upper)` step with a constant score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub score: f64,
}

impl Bucket {
    pub fn new(lower: f64, upper: f64, score: f64) -> Self {
        Self {
            lower,
            upper,
            score,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value < self.upper
    }
}

impl From<[f64; 3]> for Bucket {
    fn from([lower, upper, score]: [f64; 3]) -> Self {
        Self::new(lower, upper, score)
    }
}

impl From<Bucket> for [f64; 3] {
    fn from(b: Bucket) -> Self {
        [b.lower, b.upper, b.score]
    }
}

/// Which edge of every bucket in a table is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusive {
    /// `[lower, upper)`
    #[default]
    Lower,
    /// `(lower, upper]`
    Upper,
}

/// A validated, exhaustive step table for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTable {
    metric: String,
    buckets: Vec<Bucket>,
    below: Option<f64>,
    above: Option<f64>,
    missing: f64,
    inclusive: Inclusive,
}

impl BucketTable {
    /// Build and validate a table.
    ///
    /// `missing` is the score used when the metric value is absent. `below`
    /// and `above` cover values outside a finite first/last edge.
    pub fn new(
        metric: impl Into<String>,
        buckets: Vec<Bucket>,
        below: Option<f64>,
        above: Option<f64>,
        missing: f64,
    ) -> Result<Self, ConfigError> {
        let metric = metric.into();

        let (first, last) = match (buckets.first(), buckets.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(ConfigError::EmptyTable { metric }),
        };

        for b in &buckets {
            if b.lower.is_nan() || b.upper.is_nan() || b.lower >= b.upper {
                return Err(ConfigError::InvertedBucket {
                    metric,
                    lower: b.lower,
                    upper: b.upper,
                });
            }
            check_score(&metric, b.score)?;
        }

        for pair in buckets.windows(2) {
            let (upper, next_lower) = (pair[0].upper, pair[1].lower);
            if next_lower > upper {
                return Err(ConfigError::BucketGap {
                    metric,
                    upper,
                    next_lower,
                });
            }
            if next_lower < upper {
                return Err(ConfigError::BucketOverlap {
                    metric,
                    upper,
                    next_lower,
                });
            }
        }

        if first.lower > f64::NEG_INFINITY && below.is_none() {
            return Err(ConfigError::Uncovered {
                metric,
                side: "below",
                edge: first.lower,
            });
        }
        if last.upper < f64::INFINITY && above.is_none() {
            return Err(ConfigError::Uncovered {
                metric,
                side: "at or above",
                edge: last.upper,
            });
        }

        for fallback in [below, above].into_iter().flatten() {
            check_score(&metric, fallback)?;
        }
        check_score(&metric, missing)?;

        Ok(Self {
            metric,
            buckets,
            below,
            above,
            missing,
            inclusive: Inclusive::Lower,
        })
    }

    /// Close buckets on the given edge instead of the lower one.
    pub fn with_inclusive(mut self, inclusive: Inclusive) -> Self {
        self.inclusive = inclusive;
        self
    }

    pub fn inclusive(&self) -> Inclusive {
        self.inclusive
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn missing_score(&self) -> f64 {
        self.missing
    }

    /// Score a value. Missing values get the table's missing score.
    pub fn score(&self, value: Option<f64>) -> f64 {
        match value {
            None => self.missing,
            Some(v) => self.lookup(v),
        }
    }

    fn lookup(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.missing;
        }
        // Validation guarantees first/last exist.
        let first = self.buckets[0];
        let last = self.buckets[self.buckets.len() - 1];

        let (below_first, above_last) = match self.inclusive {
            Inclusive::Lower => (value < first.lower, value >= last.upper),
            Inclusive::Upper => (value <= first.lower, value > last.upper),
        };
        if below_first {
            return self.below.unwrap_or(first.score);
        }
        if above_last {
            return self.above.unwrap_or(last.score);
        }

        // Buckets are sorted and contiguous: the first whose upper edge is
        // past the value (or at it, for upper-closed tables) is it.
        let idx = match self.inclusive {
            Inclusive::Lower => self.buckets.partition_point(|b| b.upper <= value),
            Inclusive::Upper => self.buckets.partition_point(|b| b.upper < value),
        };
        self.buckets
            .get(idx)
            .map(|b| b.score)
            .unwrap_or(last.score)
    }
}

fn check_score(metric: &str, score: f64) -> Result<(), ConfigError> {
    if (0.0..=100.0).contains(&score) {
        Ok(())
    } else {
        Err(ConfigError::ScoreOutOfRange {
            context: format!("bucket table for '{metric}'"),
            score,
        })
    }
}

/// Score a single metric value against a table.
pub fn score_metric(value: Option<f64>, table: &BucketTable) -> f64 {
    table.score(value)
}
