//! Model registry: the set of compiled models available to a run.
//!
//! Models come from the embedded built-in definitions or from a directory of
//! `*.toml` files. A definition that fails to compile is kept as a
//! `RejectedModel` with its error, so one bad file never hides the others.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use screenlab_core::{builtin_models, ConfigError, FlagTaxonomy, Model};

/// A model definition that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedModel {
    /// Model id, or the file stem when the definition did not parse
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    taxonomy: FlagTaxonomy,
    models: BTreeMap<String, Model>,
    rejected: Vec<RejectedModel>,
}

impl ModelRegistry {
    /// Registry of the six embedded models with the standard flag taxonomy.
    pub fn builtin() -> Self {
        let taxonomy = FlagTaxonomy::standard();
        let compiled = builtin_models(&taxonomy);
        Self::from_compiled(taxonomy, compiled)
    }

    /// Load every `*.toml` definition in `dir`, in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let taxonomy = FlagTaxonomy::standard();
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read models dir: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            sources.push((stem, text));
        }

        let registry = Self::from_sources(taxonomy, sources);
        info!(
            dir = %dir.display(),
            models = registry.models.len(),
            rejected = registry.rejected.len(),
            "loaded model definitions"
        );
        Ok(registry)
    }

    /// Compile `(fallback id, TOML text)` pairs.
    pub fn from_sources(
        taxonomy: FlagTaxonomy,
        sources: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let compiled: Vec<_> = sources
            .into_iter()
            .map(|(id, text)| {
                let model = Model::from_toml(&text, &taxonomy);
                (id, model)
            })
            .collect();
        Self::from_compiled(taxonomy, compiled)
    }

    fn from_compiled(
        taxonomy: FlagTaxonomy,
        compiled: Vec<(String, Result<Model, ConfigError>)>,
    ) -> Self {
        let mut models = BTreeMap::new();
        let mut rejected = Vec::new();

        for (fallback_id, outcome) in compiled {
            match outcome {
                Ok(model) => {
                    let id = model.id().to_string();
                    if models.contains_key(&id) {
                        warn!(model = %id, "duplicate model id, later definition rejected");
                        rejected.push(RejectedModel {
                            id: id.clone(),
                            error: ConfigError::Duplicate { kind: "model", name: id }.to_string(),
                        });
                    } else {
                        models.insert(id, model);
                    }
                }
                Err(error) => {
                    warn!(model = %fallback_id, %error, "model definition rejected");
                    rejected.push(RejectedModel {
                        id: fallback_id,
                        error: error.to_string(),
                    });
                }
            }
        }

        Self {
            taxonomy,
            models,
            rejected,
        }
    }

    /// Ids of enabled models, sorted.
    pub fn discover(&self) -> Vec<String> {
        self.models
            .values()
            .filter(|m| m.enabled())
            .map(|m| m.id().to_string())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn rejected(&self) -> &[RejectedModel] {
        &self.rejected
    }

    /// Find a rejected definition by id.
    pub fn rejection(&self, id: &str) -> Option<&RejectedModel> {
        self.rejected.iter().find(|r| r.id == id)
    }

    pub fn taxonomy(&self) -> &FlagTaxonomy {
        &self.taxonomy
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenlab_core::builtin_source;

    fn sources_with(id: &str, text: String) -> Vec<(String, String)> {
        screenlab_core::BUILTIN_MODELS
            .iter()
            .map(|(bid, src)| {
                if *bid == id {
                    (bid.to_string(), text.clone())
                } else {
                    (bid.to_string(), src.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn builtin_registry_discovers_six() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.discover().len(), 6);
        assert!(registry.rejected().is_empty());
        assert!(registry.get("turnaround").is_some());
    }

    #[test]
    fn broken_definition_is_isolated() {
        let sources = sources_with("turnaround", "id = \"turnaround\"\n[[oops".to_string());
        let registry = ModelRegistry::from_sources(FlagTaxonomy::standard(), sources);
        assert_eq!(registry.discover().len(), 5);
        assert_eq!(registry.rejected().len(), 1);
        assert_eq!(registry.rejected()[0].id, "turnaround");
        assert!(registry.rejection("turnaround").is_some());
    }

    #[test]
    fn disabled_models_are_not_discovered() {
        let text = builtin_source("cash_quality")
            .unwrap()
            .replace("dataset = \"cash_quality.csv\"", "dataset = \"cash_quality.csv\"\nenabled = false");
        let registry =
            ModelRegistry::from_sources(FlagTaxonomy::standard(), sources_with("cash_quality", text));
        assert!(!registry.discover().contains(&"cash_quality".to_string()));
        assert!(registry.get("cash_quality").is_some());
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let text = builtin_source("turnaround").unwrap().to_string();
        let sources = vec![("a".to_string(), text.clone()), ("b".to_string(), text)];
        let registry = ModelRegistry::from_sources(FlagTaxonomy::standard(), sources);
        assert_eq!(registry.discover(), vec!["turnaround"]);
        assert_eq!(registry.rejected().len(), 1);
    }

    #[test]
    fn from_dir_reads_toml_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("turnaround.toml"),
            builtin_source("turnaround").unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not = [valid").unwrap();

        let registry = ModelRegistry::from_dir(dir.path()).unwrap();
        assert_eq!(registry.discover(), vec!["turnaround"]);
        assert_eq!(registry.rejected()[0].id, "broken");
    }
}
