//! Aggregation, thesis and summary-view scenarios.

use std::collections::BTreeMap;

use screenlab_core::{
    aggregate, best_of, company_profile, consistency_bonus, elite_bonus, rank_heatmap,
    rank_percentile, AggregationConfig, Category, Conviction, Flag, FlagSet, MetricRow,
    ModelResult, ScoredRow, SignalWeights,
};

// ─── Shared helpers ─────────────────────────────────────────────────

fn flags(tags: &[&str]) -> FlagSet {
    tags.iter()
        .map(|t| match *t {
            "Q" => Flag::positive("Q", Category::Quality),
            "V" => Flag::positive("V", Category::Value),
            "S" => Flag::positive("S", Category::Safety),
            other => Flag::warning(other),
        })
        .collect()
}

fn scored(ticker: &str, score: f64, tags: &[&str]) -> ScoredRow {
    ScoredRow {
        row: MetricRow::new(ticker, BTreeMap::new()),
        score,
        components: BTreeMap::new(),
        flags: flags(tags),
    }
}

/// A model of `size` rows with `ticker` placed at `rank`; filler tickers are
/// unique to the model.
fn model_with(id: &str, size: usize, ticker: &str, rank: usize, tags: &[&str]) -> ModelResult {
    let rows = (1..=size)
        .map(|pos| {
            let score = 100.0 - pos as f64;
            if pos == rank {
                scored(ticker, score, tags)
            } else {
                scored(&format!("{id}_{pos:02}"), score, &[])
            }
        })
        .collect();
    ModelResult::new(id, id.to_uppercase(), Category::Quality, rows, vec![])
}

fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn aaa_results() -> BTreeMap<String, ModelResult> {
    let mut results = BTreeMap::new();
    results.insert("m1".to_string(), model_with("m1", 20, "AAA", 2, &["Q"]));
    results.insert("m2".to_string(), model_with("m2", 20, "AAA", 4, &["Q"]));
    results.insert("m3".to_string(), model_with("m3", 20, "AAA", 18, &["V"]));
    results
}

// ─── Aggregator ─────────────────────────────────────────────────────

#[test]
fn elite_bonus_table() {
    let tiers = AggregationConfig::default().elite_tiers;
    assert_eq!(elite_bonus(3, &tiers), 5.0);
    assert_eq!(elite_bonus(7, &tiers), 3.0);
    assert_eq!(elite_bonus(15, &tiers), 1.0);
    assert_eq!(elite_bonus(25, &tiers), 0.0);
}

#[test]
fn aaa_scenario_reproduces_formula() {
    let config = AggregationConfig::default();
    let consensus = aggregate(&aaa_results(), &config);
    let aaa = consensus.iter().find(|r| r.ticker == "AAA").unwrap();

    assert_eq!(aaa.coverage, 3);
    assert_eq!(aaa.elite_score, 9.0);
    assert_eq!(aaa.flag_density, 1.0);
    assert_eq!(aaa.warning_count, 0);
    assert_eq!(aaa.category_strength[&Category::Quality], 3.0);
    assert_eq!(aaa.category_strength[&Category::Value], 1.0);
    assert_eq!(aaa.best_rank, 2);
    assert_eq!(aaa.avg_rank, 8.0);
    assert_eq!(aaa.top_tier_hits, 2);

    let pct = [1.0 / 19.0, 3.0 / 19.0, 17.0 / 19.0];
    let expected_bonus = (2.5 * (1.0 - population_std(&pct) / 0.5)).clamp(0.0, 2.5);
    assert!((aaa.consistency_bonus - expected_bonus).abs() < 1e-12);

    let expected = 9.0 + 1.0 * 3.0 + 3.0 + expected_bonus - 0.0;
    assert!((aaa.signal_strength - expected).abs() < 1e-12);

    // Quality 3.0 is above the medium threshold but below strong.
    assert_eq!(aaa.thesis.category, Some(Category::Quality));
    assert_eq!(aaa.thesis.conviction, Conviction::Medium);
    assert_eq!(aaa.thesis.detail, "3 model(s), 2x TOP5; supported by value");

    // AAA is the only ticker in more than one model.
    assert_eq!(consensus[0].ticker, "AAA");
}

#[test]
fn warnings_reduce_signal() {
    let mut results = BTreeMap::new();
    results.insert("m1".to_string(), model_with("m1", 10, "AAA", 1, &["Q", "!"]));
    let consensus = aggregate(&results, &AggregationConfig::default());
    let aaa = consensus.iter().find(|r| r.ticker == "AAA").unwrap();
    assert_eq!(aaa.warning_count, 1);
    assert_eq!(aaa.flag_density, 1.0);
    // 5 + 3 + 1 + 0 (single model) - 2
    assert_eq!(aaa.signal_strength, 7.0);
    assert!(aaa.thesis.detail.ends_with("1 warning(s)"));
}

#[test]
fn ties_break_on_coverage_then_ticker() {
    let mut results = BTreeMap::new();
    // BBB and AAA each lead one model of equal size with no flags.
    results.insert("m1".to_string(), model_with("m1", 30, "BBB", 1, &[]));
    results.insert("m2".to_string(), model_with("m2", 30, "AAA", 1, &[]));
    let consensus = aggregate(&results, &AggregationConfig::default());
    assert_eq!(consensus[0].signal_strength, consensus[1].signal_strength);
    assert_eq!(consensus[0].ticker, "AAA");
    assert_eq!(consensus[1].ticker, "BBB");
}

#[test]
fn aggregation_is_deterministic() {
    let config = AggregationConfig::default();
    let a = serde_json::to_string(&aggregate(&aaa_results(), &config)).unwrap();
    let b = serde_json::to_string(&aggregate(&aaa_results(), &config)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn custom_coefficients_are_honored() {
    let mut config = AggregationConfig::default();
    config.signal.warning_penalty = 5.0;
    config.category_weights.quality = 2.0;
    let mut results = BTreeMap::new();
    results.insert("m1".to_string(), model_with("m1", 10, "AAA", 1, &["Q", "!"]));
    let consensus = aggregate(&results, &config);
    let aaa = consensus.iter().find(|r| r.ticker == "AAA").unwrap();
    assert_eq!(aaa.signal_strength, 5.0 + 3.0 + 1.0 - 5.0);
    assert_eq!(aaa.category_strength[&Category::Quality], 2.0);
}

#[test]
fn consistency_helpers() {
    let w = SignalWeights::default();
    assert_eq!(rank_percentile(1, 1), 0.0);
    assert_eq!(consistency_bonus(&[rank_percentile(1, 5)], &w), 0.0);
    assert_eq!(
        consistency_bonus(&[rank_percentile(3, 5), rank_percentile(3, 5)], &w),
        2.5
    );
}

// ─── Views ──────────────────────────────────────────────────────────

#[test]
fn heatmap_marks_absent_models() {
    let results = aaa_results();
    let consensus = aggregate(&results, &AggregationConfig::default());
    let heatmap = rank_heatmap(&results, &consensus, 1);
    assert_eq!(heatmap.models, vec!["m1", "m2", "m3"]);
    assert_eq!(heatmap.rows.len(), 1);
    assert_eq!(heatmap.rows[0].ticker, "AAA");
    assert_eq!(heatmap.rows[0].ranks, vec![Some(2), Some(4), Some(18)]);

    let full = rank_heatmap(&results, &consensus, usize::MAX);
    let filler = full.rows.iter().find(|r| r.ticker == "m1_01").unwrap();
    assert_eq!(filler.ranks, vec![Some(1), None, None]);
}

#[test]
fn best_of_orders_by_category_strength() {
    let mut results = BTreeMap::new();
    results.insert("m1".to_string(), model_with("m1", 10, "AAA", 1, &["S"]));
    results.insert("m2".to_string(), model_with("m2", 10, "BBB", 2, &["S"]));
    results.insert("m3".to_string(), model_with("m3", 10, "BBB", 3, &["S"]));
    let consensus = aggregate(&results, &AggregationConfig::default());

    let safety = best_of(&consensus, Category::Safety, 5);
    let order: Vec<_> = safety.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(order, vec!["BBB", "AAA"]);
    assert!(best_of(&consensus, Category::Cash, 5).is_empty());
    assert_eq!(best_of(&consensus, Category::Safety, 1).len(), 1);
}

#[test]
fn profile_collects_every_model() {
    let results = aaa_results();
    let consensus = aggregate(&results, &AggregationConfig::default());
    let profile = company_profile("AAA", &results, &consensus).unwrap();
    assert_eq!(profile.consensus_rank, Some(1));
    assert_eq!(profile.models.len(), 3);
    assert_eq!(profile.models[2].model_id, "m3");
    assert_eq!(profile.models[2].rank, 18);
    assert_eq!(profile.models[2].of, 20);
    assert!(profile.models[2].flags.contains("V"));
    assert!(company_profile("ZZZ", &results, &consensus).is_none());
}
