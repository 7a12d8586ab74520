//! Run orchestration: select models, load their datasets, scan, aggregate.
//!
//! A run never aborts because of one model. Every selected model ends up
//! either in `RunReport::results` or in `RunReport::skipped_models` with the
//! reason. Model scans are independent and run on the rayon pool; the
//! aggregation step waits for all of them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use screenlab_core::{
    aggregate, AggregationConfig, ConsensusRecord, Dataset, Model, ModelResult, ScanError,
    SkippedRow,
};

use crate::dataset::{DatasetSource, LoadError};
use crate::registry::ModelRegistry;

/// Errors that stop a run before any model is scanned.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Current schema version for run reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Which models a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every enabled model in the registry
    All,
    /// Exactly these ids, in any state; disabled models run when named
    Only(Vec<String>),
}

impl Selection {
    /// `All` for an empty list, `Only` otherwise.
    pub fn from_ids(ids: Vec<String>) -> Self {
        if ids.is_empty() {
            Selection::All
        } else {
            Selection::Only(ids)
        }
    }
}

/// Why a model produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// The definition failed validation
    Config,
    /// The model's dataset does not exist
    DatasetMissing,
    /// The dataset exists but could not be read
    DatasetUnreadable,
    /// The dataset lacks required columns
    MissingColumns,
    /// No model with this id
    UnknownModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedModel {
    pub model_id: String,
    pub kind: SkipKind,
    pub reason: String,
}

/// Complete output of one screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    /// BLAKE3 hex digest over model definitions, datasets and aggregation policy
    pub fingerprint: String,
    pub data_source: String,
    /// Set when the datasets were generated, not loaded
    pub synthetic: bool,
    pub results: BTreeMap<String, ModelResult>,
    pub skipped_models: Vec<SkippedModel>,
    pub consensus: Vec<ConsensusRecord>,
}

impl RunReport {
    /// Every skipped row, tagged with its model id.
    pub fn skipped_rows(&self) -> impl Iterator<Item = (&str, &SkippedRow)> {
        self.results
            .iter()
            .flat_map(|(id, r)| r.skipped().iter().map(move |s| (id.as_str(), s)))
    }

    pub fn skipped_row_count(&self) -> usize {
        self.results.values().map(|r| r.skipped().len()).sum()
    }

    /// Position (1-based) of a ticker in the consensus list.
    pub fn consensus_rank(&self, ticker: &str) -> Option<usize> {
        self.consensus
            .iter()
            .position(|r| r.ticker == ticker)
            .map(|i| i + 1)
    }
}

// ─── Runner ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Runner {
    aggregation: AggregationConfig,
    parallel: bool,
}

impl Runner {
    pub fn new(aggregation: AggregationConfig) -> Self {
        Self {
            aggregation,
            parallel: true,
        }
    }

    /// Enables or disables parallel model scans.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn aggregation(&self) -> &AggregationConfig {
        &self.aggregation
    }

    /// Run the selected models and aggregate whatever succeeded.
    pub fn run(
        &self,
        registry: &ModelRegistry,
        source: &dyn DatasetSource,
        selection: &Selection,
    ) -> Result<RunReport, RunError> {
        let (models, mut skipped_models) = resolve(registry, selection);
        info!(
            selected = models.len(),
            source = %source.describe(),
            parallel = self.parallel,
            "starting run"
        );

        // Each distinct table is loaded once, however many models read it.
        let names: BTreeSet<&str> = models.iter().map(|m| m.dataset()).collect();
        let datasets: BTreeMap<&str, Result<Dataset, LoadError>> =
            names.into_iter().map(|n| (n, source.load(n))).collect();

        let mut runnable = Vec::with_capacity(models.len());
        for model in models {
            match datasets.get(model.dataset()) {
                Some(Ok(dataset)) => runnable.push((model, dataset)),
                Some(Err(error)) => {
                    let kind = if error.is_not_found() {
                        SkipKind::DatasetMissing
                    } else {
                        SkipKind::DatasetUnreadable
                    };
                    warn!(model = %model.id(), %error, "model skipped");
                    skipped_models.push(SkippedModel {
                        model_id: model.id().to_string(),
                        kind,
                        reason: error.to_string(),
                    });
                }
                None => {}
            }
        }

        let fingerprint = fingerprint(&runnable, &self.aggregation)?;

        let outcomes: Vec<(String, Result<ModelResult, ScanError>)> = if self.parallel {
            runnable
                .par_iter()
                .map(|(model, dataset)| (model.id().to_string(), run_model(model, dataset)))
                .collect()
        } else {
            runnable
                .iter()
                .map(|(model, dataset)| (model.id().to_string(), run_model(model, dataset)))
                .collect()
        };

        let mut results = BTreeMap::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    results.insert(id, result);
                }
                Err(error) => {
                    warn!(model = %id, %error, "model skipped");
                    skipped_models.push(SkippedModel {
                        model_id: id,
                        kind: SkipKind::MissingColumns,
                        reason: error.to_string(),
                    });
                }
            }
        }
        skipped_models.sort_by(|a, b| a.model_id.cmp(&b.model_id));

        let consensus = aggregate(&results, &self.aggregation);
        info!(
            models = results.len(),
            skipped = skipped_models.len(),
            tickers = consensus.len(),
            "run complete"
        );

        Ok(RunReport {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            fingerprint,
            data_source: source.describe(),
            synthetic: source.is_synthetic(),
            results,
            skipped_models,
            consensus,
        })
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}

/// Scan one dataset with one model.
pub fn run_model(model: &Model, dataset: &Dataset) -> Result<ModelResult, ScanError> {
    let result = model.score(dataset)?;
    info!(
        model = %model.id(),
        rows = result.len(),
        skipped = result.skipped().len(),
        "model scanned"
    );
    Ok(result)
}

/// Split a selection into runnable models and models skipped up front.
fn resolve<'a>(
    registry: &'a ModelRegistry,
    selection: &Selection,
) -> (Vec<&'a Model>, Vec<SkippedModel>) {
    let mut models = Vec::new();
    let mut skipped = Vec::new();

    let config_skip = |id: &str, error: &str| SkippedModel {
        model_id: id.to_string(),
        kind: SkipKind::Config,
        reason: error.to_string(),
    };

    match selection {
        Selection::All => {
            models.extend(registry.models().filter(|m| m.enabled()));
            skipped.extend(
                registry
                    .rejected()
                    .iter()
                    .map(|r| config_skip(&r.id, &r.error)),
            );
        }
        Selection::Only(ids) => {
            let unique: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
            for id in unique {
                if let Some(model) = registry.get(id) {
                    models.push(model);
                } else if let Some(rejected) = registry.rejection(id) {
                    skipped.push(config_skip(id, &rejected.error));
                } else {
                    warn!(model = id, "unknown model id");
                    skipped.push(SkippedModel {
                        model_id: id.to_string(),
                        kind: SkipKind::UnknownModel,
                        reason: format!("no model with id '{id}'"),
                    });
                }
            }
        }
    }

    (models, skipped)
}

/// Hash the model definitions, their datasets and the aggregation policy.
///
/// Inputs are visited in id order and serialized through `BTreeMap`-backed
/// types, so the digest is independent of load order and thread count.
fn fingerprint(
    runnable: &[(&Model, &Dataset)],
    aggregation: &AggregationConfig,
) -> Result<String, RunError> {
    let mut ordered: Vec<_> = runnable.to_vec();
    ordered.sort_by(|a, b| a.0.id().cmp(b.0.id()));

    let mut hasher = blake3::Hasher::new();
    let mut hashed_datasets = BTreeSet::new();
    for (model, dataset) in ordered {
        hasher.update(model.id().as_bytes());
        hasher.update(&serde_json::to_vec(model.spec())?);
        if hashed_datasets.insert(dataset.name.as_str()) {
            hasher.update(dataset.name.as_bytes());
            hasher.update(&serde_json::to_vec(dataset)?);
        }
    }
    hasher.update(&serde_json::to_vec(aggregation)?);
    Ok(hasher.finalize().to_hex().to_string())
}
