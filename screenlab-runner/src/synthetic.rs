//! Synthetic datasets for demo and debug runs.
//!
//! One table is generated per dataset name, holding every column the models
//! reading it use. Tickers come from a shared pool and each table keeps
//! roughly 80% of them, so the consensus step sees partial overlap the way it
//! does with real screener exports.
//!
//! Each table draws from its own `StdRng`, seeded from the master seed and the
//! dataset name through BLAKE3. Generation order therefore never changes the
//! output.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use screenlab_core::{Dataset, Model};

use crate::dataset::InMemorySource;

/// Share of the ticker pool present in each table.
const COVERAGE: f64 = 0.8;

/// Chance that an optional cell is left missing.
const MISSING_RATE: f64 = 0.05;

/// Derive the RNG seed for one dataset.
pub fn dataset_seed(master_seed: u64, dataset: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(dataset.as_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Plausible value range for a catalog metric.
fn metric_range(metric: &str) -> (f64, f64) {
    match metric {
        "ROE" => (-10.0, 40.0),
        "ROA" => (-5.0, 20.0),
        "OpMargin" => (-5.0, 35.0),
        "P_E" => (2.0, 40.0),
        "P_BV" => (0.2, 6.0),
        "P_EBIT" => (2.0, 30.0),
        "EV_EBITDA" => (1.0, 25.0),
        "EBIT_3Y" => (-20.0, 120.0),
        "Debt_Ratio" => (0.0, 90.0),
        "Asset_Coverage" => (0.5, 5.0),
        "Coverage_I" => (-2.0, 30.0),
        "Current_Ratio" => (0.5, 4.0),
        "Cash_Conv" => (0.0, 250.0),
        m if m.starts_with("Rev_") => (-20.0, 60.0),
        m if m.ends_with("_QQ") || m.ends_with("_YY") => (-60.0, 80.0),
        _ => (-50.0, 50.0),
    }
}

/// Ticker pool shared by all tables: `SYN001`, `SYN002`, ...
pub fn ticker_pool(size: usize) -> Vec<String> {
    (1..=size).map(|i| format!("SYN{i:03}")).collect()
}

/// Generate one table per dataset read by `models`.
pub fn synthetic_source<'a>(
    models: impl IntoIterator<Item = &'a Model>,
    pool_size: usize,
    seed: u64,
) -> InMemorySource {
    // dataset -> (used columns, required columns)
    let mut plans: BTreeMap<&str, (BTreeSet<&str>, BTreeSet<&str>)> = BTreeMap::new();
    for model in models {
        let plan = plans.entry(model.dataset()).or_default();
        plan.0.extend(model.used_metrics().iter().map(String::as_str));
        plan.1.extend(model.required_metrics().iter().map(String::as_str));
    }

    let pool = ticker_pool(pool_size);
    let mut source = InMemorySource::new().synthetic();
    for (name, (used, required)) in plans {
        let dataset = generate_dataset(name, &pool, &used, &required, seed);
        debug!(dataset = name, rows = dataset.len(), "generated synthetic dataset");
        source.insert(dataset);
    }
    source
}

fn generate_dataset(
    name: &str,
    pool: &[String],
    used: &BTreeSet<&str>,
    required: &BTreeSet<&str>,
    seed: u64,
) -> Dataset {
    let mut rng = StdRng::seed_from_u64(dataset_seed(seed, name));
    let mut values = BTreeMap::new();

    for ticker in pool {
        if !rng.gen_bool(COVERAGE) {
            continue;
        }
        let metrics: BTreeMap<String, Option<f64>> = used
            .iter()
            .map(|&metric| {
                let (lo, hi) = metric_range(metric);
                let raw: f64 = rng.gen_range(lo..hi);
                let value = if !required.contains(metric) && rng.gen_bool(MISSING_RATE) {
                    None
                } else {
                    Some((raw * 100.0).round() / 100.0)
                };
                (metric.to_string(), value)
            })
            .collect();
        values.insert(ticker.clone(), metrics);
    }

    let mut dataset = Dataset::from_values(name, values);
    // A table where every optional cell came out missing still has the column.
    dataset
        .columns
        .extend(used.iter().map(|c| c.to_string()));
    dataset
}
