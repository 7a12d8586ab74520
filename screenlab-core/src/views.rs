//! Summary views over model results and the consensus ranking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusRecord;
use crate::flags::{Category, FlagSet};
use crate::result::ModelResult;

/// Rank of each ticker in each model (`None` = not present).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankHeatmap {
    pub models: Vec<String>,
    pub rows: Vec<HeatmapRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRow {
    pub ticker: String,
    pub ranks: Vec<Option<usize>>,
}

/// Heatmap of the first `top_n` consensus tickers across every model.
pub fn rank_heatmap(
    results: &BTreeMap<String, ModelResult>,
    consensus: &[ConsensusRecord],
    top_n: usize,
) -> RankHeatmap {
    let models: Vec<String> = results.keys().cloned().collect();
    let rows = consensus
        .iter()
        .take(top_n)
        .map(|record| HeatmapRow {
            ticker: record.ticker.clone(),
            ranks: results
                .values()
                .map(|r| r.rank_of(&record.ticker))
                .collect(),
        })
        .collect();
    RankHeatmap { models, rows }
}

/// Best `n` tickers for one category: strength descending, then signal.
pub fn best_of(consensus: &[ConsensusRecord], category: Category, n: usize) -> Vec<&ConsensusRecord> {
    let strength = |r: &ConsensusRecord| r.category_strength.get(&category).copied().unwrap_or(0.0);
    let mut picked: Vec<&ConsensusRecord> =
        consensus.iter().filter(|r| strength(r) > 0.0).collect();
    picked.sort_by(|a, b| {
        strength(b)
            .total_cmp(&strength(a))
            .then(b.signal_strength.total_cmp(&a.signal_strength))
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    picked.truncate(n);
    picked
}

/// One model's view of a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub model_id: String,
    pub model_name: String,
    pub rank: usize,
    pub of: usize,
    pub score: f64,
    pub components: BTreeMap<String, f64>,
    pub flags: FlagSet,
}

/// Everything known about one ticker across a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: String,
    /// Position in the consensus ranking (1-based)
    pub consensus_rank: Option<usize>,
    pub consensus: Option<ConsensusRecord>,
    pub models: Vec<ProfileEntry>,
}

/// Profile of `ticker`, or `None` when no model scored it.
pub fn company_profile(
    ticker: &str,
    results: &BTreeMap<String, ModelResult>,
    consensus: &[ConsensusRecord],
) -> Option<CompanyProfile> {
    let models: Vec<ProfileEntry> = results
        .iter()
        .filter_map(|(id, result)| {
            let rank = result.rank_of(ticker)?;
            let row = &result.rows()[rank - 1];
            Some(ProfileEntry {
                model_id: id.clone(),
                model_name: result.model_name.clone(),
                rank,
                of: result.len(),
                score: row.score,
                components: row.components.clone(),
                flags: row.flags.clone(),
            })
        })
        .collect();
    if models.is_empty() {
        return None;
    }

    let position = consensus.iter().position(|r| r.ticker == ticker);
    Some(CompanyProfile {
        ticker: ticker.to_string(),
        consensus_rank: position.map(|i| i + 1),
        consensus: position.map(|i| consensus[i].clone()),
        models,
    })
}
