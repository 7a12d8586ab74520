//! Scenario tests for the six built-in models.

use std::collections::BTreeMap;

use screenlab_core::{
    builtin_models, builtin_source, Category, ConfigError, Dataset, FlagTaxonomy, Model,
    ModelResult, ScanError,
};

// ─── Shared helpers ─────────────────────────────────────────────────

fn model(id: &str) -> Model {
    let text = builtin_source(id).unwrap();
    Model::from_toml(text, &FlagTaxonomy::standard()).unwrap()
}

fn dataset(name: &str, rows: &[(&str, &[(&str, f64)])]) -> Dataset {
    let values: BTreeMap<String, BTreeMap<String, Option<f64>>> = rows
        .iter()
        .map(|(ticker, metrics)| {
            let m = metrics
                .iter()
                .map(|(k, v)| (k.to_string(), Some(*v)))
                .collect();
            (ticker.to_string(), m)
        })
        .collect();
    Dataset::from_values(name, values)
}

fn scan_one(id: &str, metrics: &[(&str, f64)]) -> ModelResult {
    model(id).score(&dataset(id, &[("AAA", metrics)])).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn tags(result: &ModelResult) -> Vec<String> {
    result.rows()[0].flags.tags().map(str::to_string).collect()
}

// ─── Valuation Compression ──────────────────────────────────────────

#[test]
fn valuation_compression_sweet_spot() {
    let result = scan_one(
        "valuation_compression",
        &[
            ("P_E_YY", -45.0),
            ("P_BV_YY", -22.0),
            ("P_E_QQ", -10.0),
            ("P_BV_QQ", -5.0),
            ("P_BV", 0.8),
            ("EV_EBITDA", 4.0),
        ],
    );
    let row = &result.rows()[0];
    assert_eq!(row.components["pe_compression"], 100.0);
    assert_eq!(row.components["pbv_compression"], 100.0);
    // both windows falling, long window steeper
    assert_eq!(row.components["trend"], 85.0);
    // base 80 plus the sweet-spot bonus
    assert_eq!(row.components["safety"], 100.0);
    assert!(approx(row.score, 97.0), "score {}", row.score);
    assert_eq!(tags(&result), vec!["C", "V", "T"]);

    let c = row.flags.iter().find(|f| f.tag == "C").unwrap();
    assert_eq!(c.category, Some(Category::Value));
    let t = row.flags.iter().find(|f| f.tag == "T").unwrap();
    assert_eq!(t.category, Some(Category::Momentum));
}

#[test]
fn valuation_compression_penalizes_collapse() {
    let result = scan_one(
        "valuation_compression",
        &[("P_E_YY", -95.0), ("P_BV_YY", -60.0), ("P_BV", 0.2), ("EV_EBITDA", 0.5)],
    );
    let row = &result.rows()[0];
    assert_eq!(row.components["pe_compression"], 50.0);
    // 80 - 30 - 20 - 20 - 20, clamped
    assert_eq!(row.components["safety"], 0.0);
    assert!(row.flags.contains("!"));
}

#[test]
fn valuation_compression_thresholds_belong_to_the_band_above() {
    let scores = |pe_yy: f64, pbv_yy: f64| {
        let result = scan_one(
            "valuation_compression",
            &[("P_E_YY", pe_yy), ("P_BV_YY", pbv_yy), ("P_BV", 1.2), ("EV_EBITDA", 6.0)],
        );
        let row = &result.rows()[0];
        (row.components["pe_compression"], row.components["pbv_compression"])
    };
    assert_eq!(scores(0.0, 0.0), (55.0, 55.0));
    assert_eq!(scores(-10.0, -10.0), (75.0, 85.0));
    assert_eq!(scores(-20.0, -20.0), (100.0, 100.0));
    assert_eq!(scores(-60.0, -35.0), (80.0, 75.0));
    assert_eq!(scores(-90.0, -50.0), (50.0, 50.0));
    assert_eq!(scores(20.0, 10.0), (25.0, 35.0));
    assert_eq!(scores(20.5, 10.5), (10.0, 15.0));
}

// ─── Quality Growth ─────────────────────────────────────────────────

#[test]
fn quality_growth_ideal_company() {
    let result = scan_one(
        "quality_growth",
        &[
            ("ROE", 30.0),
            ("ROA", 16.0),
            ("EBIT_3Y", 40.0),
            ("Rev_3Y", 25.0),
            ("P_E", 7.0),
            ("P_EBIT", 5.0),
            ("P_BV", 1.5),
        ],
    );
    assert!(approx(result.rows()[0].score, 100.0));
    assert_eq!(tags(&result), vec!["Q", "G", "V", "R"]);
}

#[test]
fn quality_growth_unverified_growth_is_scored_down() {
    let base = [
        ("ROE", 30.0),
        ("ROA", 16.0),
        ("Rev_3Y", 25.0),
        ("P_E", 7.0),
        ("P_EBIT", 5.0),
        ("P_BV", 1.5),
    ];
    let mut hot = base.to_vec();
    hot.push(("EBIT_3Y", 150.0));
    let result = scan_one("quality_growth", &hot);
    let row = &result.rows()[0];
    assert_eq!(row.components["growth"], 60.0);
    assert!(row.flags.contains("?"));
    assert!(!row.flags.contains("G"));
}

#[test]
fn quality_growth_missing_optional_metrics_never_fail() {
    let result = scan_one("quality_growth", &[("ROE", 12.0), ("ROA", 4.0)]);
    let row = &result.rows()[0];
    // missing EBIT_3Y, Rev_3Y use their configured defaults
    assert_eq!(row.components["growth"], 20.0);
    assert_eq!(row.components["rev_confirm"], 30.0);
    assert!(row.flags.is_empty());
}

// ─── Turnaround ─────────────────────────────────────────────────────

#[test]
fn turnaround_rewards_cheap_book_with_returns() {
    let result = scan_one(
        "turnaround",
        &[
            ("P_BV", 0.4),
            ("P_E", 4.0),
            ("ROE", 15.0),
            ("ROA", 6.0),
            ("Margin_YY", 30.0),
            ("Margin_QQ", 25.0),
        ],
    );
    let row = &result.rows()[0];
    assert_eq!(row.components["deep_value"], 100.0);
    assert_eq!(row.components["contrarian"], 80.0);
    assert_eq!(tags(&result), vec!["D", "T", "S"]);
    let s = row.flags.iter().find(|f| f.tag == "S").unwrap();
    assert_eq!(s.category, Some(Category::Value));
}

// ─── Revenue Momentum ───────────────────────────────────────────────

#[test]
fn revenue_momentum_consistent_acceleration() {
    let result = scan_one(
        "revenue_momentum",
        &[
            ("Rev_QQ", 30.0),
            ("Rev_O4K", 20.0),
            ("Rev_3Y", 10.0),
            ("ROE", 18.0),
            ("ROA", 9.0),
        ],
    );
    let row = &result.rows()[0];
    // cv 0.41 -> 70, windows ordered QQ >= O4K >= 3Y -> +15
    assert_eq!(row.components["consistency"], 85.0);
    assert!(row.flags.contains("M"));
    assert!(row.flags.contains("A"));
}

#[test]
fn revenue_momentum_shrinking_windows_score_by_count() {
    let consistency = |qq: f64, o4k: f64, y3: f64| {
        let result = scan_one(
            "revenue_momentum",
            &[
                ("Rev_QQ", qq),
                ("Rev_O4K", o4k),
                ("Rev_3Y", y3),
                ("ROE", 18.0),
                ("ROA", 9.0),
            ],
        );
        result.rows()[0].components["consistency"]
    };
    // 30 + 15 per growing window; ordering bonuses do not apply
    assert_eq!(consistency(-5.0, -2.0, 10.0), 45.0);
    assert_eq!(consistency(-5.0, -2.0, -1.0), 30.0);
    assert_eq!(consistency(20.0, 0.0, 10.0), 60.0);
}

#[test]
fn revenue_momentum_slowing_growth_is_penalized() {
    let result = scan_one(
        "revenue_momentum",
        &[
            ("Rev_QQ", 4.0),
            ("Rev_O4K", 8.0),
            ("Rev_3Y", 12.0),
            ("ROE", 18.0),
            ("ROA", 9.0),
        ],
    );
    // cv 0.41 -> 70, QQ below half of 3Y -> -15
    assert_eq!(result.rows()[0].components["consistency"], 55.0);
}

#[test]
fn revenue_momentum_requires_revenue_columns() {
    let metrics: &[(&str, f64)] = &[("ROE", 10.0), ("ROA", 5.0)];
    let ds = dataset("revenue_momentum", &[("AAA", metrics)]);
    match model("revenue_momentum").score(&ds) {
        Err(ScanError::MissingColumns { missing, .. }) => {
            assert!(missing.contains(&"Rev_QQ".to_string()));
            assert!(missing.contains(&"Rev_3Y".to_string()));
        }
        other => panic!("expected missing columns, got {other:?}"),
    }
}

// ─── Cash Quality ───────────────────────────────────────────────────

#[test]
fn cash_quality_conversion_curve_peaks() {
    let base = [("ROE", 20.0), ("ROA", 10.0), ("P_E", 8.0)];
    let with_conv = |conv: f64| {
        let mut metrics = base.to_vec();
        metrics.push(("Cash_Conv", conv));
        scan_one("cash_quality", &metrics)
    };
    let peak = with_conv(120.0);
    let high = with_conv(250.0);
    assert_eq!(peak.rows()[0].components["cash_quality"], 100.0);
    assert_eq!(high.rows()[0].components["cash_quality"], 70.0);
    assert!(peak.rows()[0].score > high.rows()[0].score);
    assert!(high.rows()[0].flags.contains("?"));
    assert!(peak.rows()[0].flags.contains("C"));
}

// ─── Quality Momentum ───────────────────────────────────────────────

#[test]
fn quality_momentum_low_base_artifact() {
    let sweet = scan_one(
        "quality_momentum",
        &[("ROE_YY", 50.0), ("ROA_YY", 40.0), ("Margin_Op_YY", 20.0), ("P_E", 6.0)],
    );
    let spike = scan_one(
        "quality_momentum",
        &[("ROE_YY", 600.0), ("ROA_YY", 40.0), ("Margin_Op_YY", 20.0), ("P_E", 6.0)],
    );
    assert!(sweet.rows()[0].score > spike.rows()[0].score);
    assert!(spike.rows()[0].flags.contains("!"));
    assert!(sweet.rows()[0].flags.contains("Q"));
}

#[test]
fn quality_momentum_trend_confirmation_tiers() {
    let trend = |metrics: &[(&str, f64)]| {
        let mut all = vec![("P_E", 8.0)];
        all.extend_from_slice(metrics);
        let result = scan_one("quality_momentum", &all);
        result.rows()[0].components["trend"]
    };

    // ROE level with its year (100), ROA flat quarter (70), margin
    // collapsing quarter (20); one accelerating metric, no bonus
    let one = trend(&[
        ("ROE_YY", 40.0),
        ("ROE_QQ", 40.0),
        ("ROA_YY", 30.0),
        ("ROA_QQ", 0.0),
        ("Margin_Op_YY", 20.0),
        ("Margin_Op_QQ", -25.0),
    ]);
    assert!(approx(one, 0.34 * 100.0 + 0.33 * 70.0 + 0.33 * 20.0), "{one}");

    // two metrics at least level with their year earn the +10 bonus
    let two = trend(&[
        ("ROE_YY", 40.0),
        ("ROE_QQ", 40.0),
        ("ROA_YY", 30.0),
        ("ROA_QQ", 35.0),
        ("Margin_Op_YY", 20.0),
        ("Margin_Op_QQ", -10.0),
    ]);
    assert!(approx(two, 0.34 * 100.0 + 0.33 * 100.0 + 0.33 * 40.0 + 10.0), "{two}");

    // a shrinking year scores 30 whatever the quarter did
    let flat = trend(&[
        ("ROE_YY", -5.0),
        ("ROE_QQ", 50.0),
        ("ROA_YY", 0.0),
        ("ROA_QQ", -30.0),
        ("Margin_Op_YY", -1.0),
        ("Margin_Op_QQ", 0.0),
    ]);
    assert!(approx(flat, 30.0), "{flat}");
}

// ─── Registry-level behavior ────────────────────────────────────────

#[test]
fn all_builtins_compile() {
    let models = builtin_models(&FlagTaxonomy::standard());
    assert_eq!(models.len(), 6);
    assert!(models.iter().all(|(_, m)| m.is_ok()));
}

#[test]
fn weight_sum_of_095_is_rejected_others_unaffected() {
    let taxonomy = FlagTaxonomy::standard();
    let mut outcomes = Vec::new();
    for (id, _) in builtin_models(&taxonomy) {
        let mut text = builtin_source(&id).unwrap().to_string();
        if id == "cash_quality" {
            // value component 0.20 -> 0.15, total 0.95
            text = text.replace("name = \"value\"\nweight = 0.20", "name = \"value\"\nweight = 0.15");
        }
        outcomes.push((id, Model::from_toml(&text, &taxonomy)));
    }
    let failed: Vec<_> = outcomes.iter().filter(|(_, r)| r.is_err()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "cash_quality");
    match &failed[0].1 {
        Err(ConfigError::WeightSum { sum, .. }) => assert!((sum - 0.95).abs() < 1e-9),
        other => panic!("expected weight-sum error, got {other:?}"),
    }
    assert_eq!(outcomes.iter().filter(|(_, r)| r.is_ok()).count(), 5);
}

#[test]
fn rescanning_is_deterministic() {
    let rows: Vec<(String, Vec<(&str, f64)>)> = (0..40)
        .map(|i| {
            let x = i as f64;
            (
                format!("T{i:02}"),
                vec![("ROE", (x * 7.0) % 35.0), ("ROA", (x * 3.0) % 18.0), ("P_E", 4.0 + x % 9.0)],
            )
        })
        .collect();
    let refs: Vec<(&str, &[(&str, f64)])> =
        rows.iter().map(|(t, m)| (t.as_str(), m.as_slice())).collect();
    let ds = dataset("cash_quality", &refs);
    let m = model("cash_quality");
    let a = serde_json::to_string(&m.score(&ds).unwrap()).unwrap();
    let b = serde_json::to_string(&m.score(&ds).unwrap()).unwrap();
    assert_eq!(a, b);
}
