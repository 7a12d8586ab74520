//! Signal aggregator: combine per-model results into one consensus ranking.
//!
//! For every ticker, over the models it appears in:
//! - `coverage`: number of models
//! - `elite_score`: sum of rank-tier bonuses
//! - `flag_density`: positive flags per appearance
//! - `warning_count`: warning flags across appearances
//! - `category_strength`: flag counts per category times the category weight
//! - `signal_strength`: the ranking key combining the above
//!
//! Everything is a pure function of the `ModelResult`s and the
//! `AggregationConfig`. Records are rebuilt from scratch on every call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flags::Category;
use crate::result::ModelResult;
use crate::thesis::{generate, Thesis, ThesisConfig};

// ─── Policy ─────────────────────────────────────────────────────────

/// Points for a placement at or above `max_rank`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EliteTier {
    pub max_rank: usize,
    pub points: f64,
}

/// Default tiers: top 5 → 5, top 10 → 3, top 20 → 1.
pub fn default_elite_tiers() -> Vec<EliteTier> {
    vec![
        EliteTier {
            max_rank: 5,
            points: 5.0,
        },
        EliteTier {
            max_rank: 10,
            points: 3.0,
        },
        EliteTier {
            max_rank: 20,
            points: 1.0,
        },
    ]
}

/// Bonus for one placement: the tightest tier containing `rank`.
pub fn elite_bonus(rank: usize, tiers: &[EliteTier]) -> f64 {
    tiers
        .iter()
        .filter(|t| rank >= 1 && rank <= t.max_rank)
        .min_by_key(|t| t.max_rank)
        .map(|t| t.points)
        .unwrap_or(0.0)
}

/// Analytical weight of one flag in each category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub quality: f64,
    pub value: f64,
    pub growth: f64,
    pub momentum: f64,
    pub safety: f64,
    pub cash: f64,
    pub turnaround: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            quality: 1.5,
            value: 1.0,
            growth: 1.0,
            momentum: 1.0,
            safety: 1.4,
            cash: 1.0,
            turnaround: 1.0,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Quality => self.quality,
            Category::Value => self.value,
            Category::Growth => self.growth,
            Category::Momentum => self.momentum,
            Category::Safety => self.safety,
            Category::Cash => self.cash,
            Category::Turnaround => self.turnaround,
        }
    }
}

/// Coefficients of the signal-strength formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    /// Multiplier on flag density
    pub flag_density: f64,
    /// Coverage counts up to this many models
    pub coverage_cap: usize,
    /// Points removed per warning flag
    pub warning_penalty: f64,
    /// Maximum consistency bonus
    pub consistency_max: f64,
    /// Below this coverage the consistency bonus is zero
    pub consistency_min_coverage: usize,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            flag_density: 3.0,
            coverage_cap: 6,
            warning_penalty: 2.0,
            consistency_max: 2.5,
            consistency_min_coverage: 2,
        }
    }
}

/// Full aggregation policy, loaded once and passed explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub elite_tiers: Vec<EliteTier>,
    pub category_weights: CategoryWeights,
    pub signal: SignalWeights,
    pub thesis: ThesisConfig,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            elite_tiers: default_elite_tiers(),
            category_weights: CategoryWeights::default(),
            signal: SignalWeights::default(),
            thesis: ThesisConfig::default(),
        }
    }
}

// ─── Records ────────────────────────────────────────────────────────

/// One appearance of a ticker in a model result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub model_id: String,
    pub rank: usize,
    /// Rows in that model's result
    pub of: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub ticker: String,
    pub coverage: usize,
    pub elite_score: f64,
    pub flag_density: f64,
    pub warning_count: usize,
    /// Only categories with at least one flag
    pub category_strength: BTreeMap<Category, f64>,
    pub consistency_bonus: f64,
    pub signal_strength: f64,
    pub avg_rank: f64,
    pub best_rank: usize,
    /// Placements within the thesis top-tier rank
    pub top_tier_hits: usize,
    pub placements: Vec<Placement>,
    pub thesis: Thesis,
}

// ─── Formula ────────────────────────────────────────────────────────

/// `elite + density·k + min(coverage, cap) + consistency − warnings·p`.
pub fn signal_strength(
    elite_score: f64,
    flag_density: f64,
    coverage: usize,
    consistency_bonus: f64,
    warning_count: usize,
    weights: &SignalWeights,
) -> f64 {
    elite_score
        + flag_density * weights.flag_density
        + coverage.min(weights.coverage_cap) as f64
        + consistency_bonus
        - warning_count as f64 * weights.warning_penalty
}

/// Percentile of a rank within a model: 0 for first, 1 for last.
pub fn rank_percentile(rank: usize, of: usize) -> f64 {
    if of <= 1 {
        0.0
    } else {
        (rank.saturating_sub(1)) as f64 / (of - 1) as f64
    }
}

/// `max · (1 − stddev(percentiles) / 0.5)`, clamped to `[0, max]`.
///
/// 0.5 is the largest population standard deviation of values in [0, 1].
pub fn consistency_bonus(percentiles: &[f64], weights: &SignalWeights) -> f64 {
    if percentiles.len() < weights.consistency_min_coverage.max(1) {
        return 0.0;
    }
    let n = percentiles.len() as f64;
    let mean = percentiles.iter().sum::<f64>() / n;
    let variance = percentiles.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let normalized = variance.sqrt() / 0.5;
    (weights.consistency_max * (1.0 - normalized)).clamp(0.0, weights.consistency_max)
}

// ─── Aggregation ────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
    placements: Vec<Placement>,
    positive_flags: usize,
    warnings: usize,
    categories: BTreeMap<Category, usize>,
}

/// Aggregate model results into consensus records, best first.
///
/// Ordering: signal strength descending, then coverage descending, then
/// ticker ascending.
pub fn aggregate(
    results: &BTreeMap<String, ModelResult>,
    config: &AggregationConfig,
) -> Vec<ConsensusRecord> {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

    for (model_id, result) in results {
        let of = result.len();
        for (rank, row) in result.ranked() {
            let tally = tallies.entry(row.ticker()).or_default();
            tally.placements.push(Placement {
                model_id: model_id.clone(),
                rank,
                of,
                score: row.score,
            });
            tally.positive_flags += row.flags.positive_count();
            tally.warnings += row.flags.warning_count();
            for flag in row.flags.iter() {
                if let Some(cat) = flag.category {
                    *tally.categories.entry(cat).or_default() += 1;
                }
            }
        }
    }

    let mut records: Vec<ConsensusRecord> = tallies
        .into_iter()
        .map(|(ticker, tally)| build_record(ticker, tally, config))
        .collect();

    records.sort_by(|a, b| {
        b.signal_strength
            .total_cmp(&a.signal_strength)
            .then(b.coverage.cmp(&a.coverage))
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    records
}

fn build_record(ticker: &str, tally: Tally, config: &AggregationConfig) -> ConsensusRecord {
    let coverage = tally.placements.len();
    let ranks: Vec<usize> = tally.placements.iter().map(|p| p.rank).collect();

    let elite_score = ranks
        .iter()
        .map(|&r| elite_bonus(r, &config.elite_tiers))
        .sum();
    let flag_density = if coverage == 0 {
        0.0
    } else {
        tally.positive_flags as f64 / coverage as f64
    };
    let percentiles: Vec<f64> = tally
        .placements
        .iter()
        .map(|p| rank_percentile(p.rank, p.of))
        .collect();
    let consistency = consistency_bonus(&percentiles, &config.signal);
    let signal = signal_strength(
        elite_score,
        flag_density,
        coverage,
        consistency,
        tally.warnings,
        &config.signal,
    );

    let category_strength = tally
        .categories
        .iter()
        .map(|(&cat, &count)| (cat, count as f64 * config.category_weights.get(cat)))
        .collect();

    let avg_rank = if coverage == 0 {
        0.0
    } else {
        ranks.iter().sum::<usize>() as f64 / coverage as f64
    };

    let mut record = ConsensusRecord {
        ticker: ticker.to_string(),
        coverage,
        elite_score,
        flag_density,
        warning_count: tally.warnings,
        category_strength,
        consistency_bonus: consistency,
        signal_strength: signal,
        avg_rank,
        best_rank: ranks.iter().copied().min().unwrap_or(0),
        top_tier_hits: ranks
            .iter()
            .filter(|&&r| r <= config.thesis.top_tier_rank)
            .count(),
        placements: tally.placements,
        thesis: Thesis::default(),
    };
    record.thesis = generate(&record, &config.thesis);
    record
}
