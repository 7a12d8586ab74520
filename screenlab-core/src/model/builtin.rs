//! The six built-in model definitions, embedded at compile time.

use super::Model;
use crate::error::ConfigError;
use crate::flags::FlagTaxonomy;

/// `(id, TOML source)` for every built-in model, in display order.
pub const BUILTIN_MODELS: &[(&str, &str)] = &[
    (
        "quality_growth",
        include_str!("../../models/quality_growth.toml"),
    ),
    ("turnaround", include_str!("../../models/turnaround.toml")),
    (
        "revenue_momentum",
        include_str!("../../models/revenue_momentum.toml"),
    ),
    ("cash_quality", include_str!("../../models/cash_quality.toml")),
    (
        "quality_momentum",
        include_str!("../../models/quality_momentum.toml"),
    ),
    (
        "valuation_compression",
        include_str!("../../models/valuation_compression.toml"),
    ),
];

/// Compile every built-in model. A failure is returned per model so that one
/// bad definition never hides the others.
pub fn builtin_models(taxonomy: &FlagTaxonomy) -> Vec<(String, Result<Model, ConfigError>)> {
    BUILTIN_MODELS
        .iter()
        .map(|(id, text)| (id.to_string(), Model::from_toml(text, taxonomy)))
        .collect()
}

/// Source text of one built-in model.
pub fn builtin_source(id: &str) -> Option<&'static str> {
    BUILTIN_MODELS
        .iter()
        .find(|(builtin, _)| *builtin == id)
        .map(|(_, text)| *text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_compiles_with_matching_id() {
        for (id, result) in builtin_models(&FlagTaxonomy::standard()) {
            let model = result.unwrap_or_else(|e| panic!("{id}: {e}"));
            assert_eq!(model.id(), id);
            assert!(model.enabled());
        }
    }

    #[test]
    fn source_lookup() {
        assert!(builtin_source("turnaround").is_some());
        assert!(builtin_source("nope").is_none());
    }
}
