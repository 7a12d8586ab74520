//! Serializable model definitions, as written in model TOML files.
//!
//! A `ModelSpec` is raw, unvalidated data. `Model::compile` turns it into a
//! runnable [`Model`](super::Model) or a `ConfigError`.

use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, Inclusive};
use crate::flags::Category;
use crate::metric::DerivedMetric;
use crate::trend::{Collapse, Direction, TrendScores};

/// One investment-style model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSpec {
    /// Stable identifier (`quality_growth`, ...)
    pub id: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Investment style the model screens for
    pub theme: Category,

    /// File name of the dataset this model scans
    pub dataset: String,

    /// Inactive models are not discovered
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Columns the dataset must provide (in addition to metrics shared by
    /// two or more components)
    #[serde(default)]
    pub required: Vec<String>,

    /// Per-row derived metrics, evaluated in order
    #[serde(default)]
    pub derived: Vec<DerivedMetric>,

    pub components: Vec<ComponentSpec>,

    #[serde(default)]
    pub flags: Vec<FlagSpec>,
}

fn default_enabled() -> bool {
    true
}

/// One weighted component. Exactly one of `terms`/`trends` (together) or
/// `base` must be given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSpec {
    pub name: String,
    pub weight: f64,

    /// Constant starting score for adjustment-only components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,

    #[serde(default)]
    pub terms: Vec<TermSpec>,

    #[serde(default)]
    pub trends: Vec<TrendSpec>,

    #[serde(default)]
    pub adjustments: Vec<AdjustmentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackSpec>,
}

/// Replaces the component body for rows where `unless` does not hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackSpec {
    pub unless: String,
    pub base: f64,

    #[serde(default)]
    pub adjustments: Vec<AdjustmentSpec>,
}

/// Bucket-table lookup for one metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermSpec {
    pub metric: String,

    /// Share of the component; defaults to 1 for single-term components
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// `[lower, upper, score]` triples, lower bound inclusive unless
    /// `inclusive = "upper"`
    pub buckets: Vec<Bucket>,

    #[serde(default)]
    pub inclusive: Inclusive,

    /// Score when the value is missing
    pub missing: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

/// Trend-confirmation term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendSpec {
    /// Short-window delta (k/k)
    pub short: String,

    /// Long-window delta (r/r)
    pub long: String,

    pub favorable: Direction,

    #[serde(default = "default_weight")]
    pub weight: f64,

    pub scores: TrendScores,

    pub missing: f64,

    /// Flat short window counts as favorable, a tie as accelerating
    #[serde(default)]
    pub inclusive_short: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse: Option<Collapse>,
}

/// Ordered cases; the first whose condition holds adds its points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentSpec {
    pub cases: Vec<CaseSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseSpec {
    pub when: String,
    pub add: f64,
}

/// A flag predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlagSpec {
    pub tag: String,
    pub when: String,

    /// Overrides the taxonomy category for this model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}
