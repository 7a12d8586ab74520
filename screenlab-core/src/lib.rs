//! ScreenLab Core: scoring engine, flags, model scanner, consensus aggregation.
//!
//! This crate is pure and deterministic (no file I/O):
//! - Metric scorer: validated step-function bucket tables
//! - Condition language for flag predicates and score adjustments
//! - Flag taxonomy and evaluator
//! - Trend confirmation (short vs long window)
//! - Data-driven model scanner with six built-in investment styles
//! - Signal aggregator, thesis generator and summary views

pub mod bucket;
pub mod condition;
pub mod consensus;
pub mod error;
pub mod flags;
pub mod metric;
pub mod model;
pub mod result;
pub mod thesis;
pub mod trend;
pub mod views;

pub use bucket::{score_metric, Bucket, BucketTable, Inclusive};
pub use condition::Condition;
pub use consensus::{
    aggregate, consistency_bonus, elite_bonus, rank_percentile, signal_strength,
    AggregationConfig, CategoryWeights, ConsensusRecord, EliteTier, Placement, SignalWeights,
};
pub use error::{ConfigError, DataRowError, ScanError};
pub use flags::{evaluate_flags, Category, Flag, FlagPredicate, FlagSet, FlagTaxonomy, Polarity};
pub use metric::{Cell, Dataset, DerivedMetric, MetricExpr, MetricRow, RawRow, STANDARD_METRICS};
pub use model::builtin::{builtin_models, builtin_source, BUILTIN_MODELS};
pub use model::{Model, ModelSpec};
pub use result::{FlagMatch, ModelResult, ScoredRow, SkippedRow};
pub use thesis::{Conviction, Thesis, ThesisConfig};
pub use trend::{classify, classify_with, Collapse, Direction, TrendCase};
pub use views::{best_of, company_profile, rank_heatmap, CompanyProfile, RankHeatmap};
