//! ScreenLab Runner: orchestration around the scoring engine.
//!
//! This crate builds on `screenlab-core` to provide:
//! - Settings file loading (`screenlab.toml`)
//! - Model registry from built-in or on-disk definitions
//! - Dataset loading from a CSV directory or memory
//! - Parallel model runs with partial-failure isolation and fingerprinting
//! - JSON, CSV and Markdown export with timestamped artifact directories
//! - Deterministic synthetic datasets for demo runs

pub mod dataset;
pub mod export;
pub mod registry;
pub mod runner;
pub mod settings;
pub mod synthetic;

pub use dataset::{parse_csv, CsvDirectory, DatasetSource, InMemorySource, LoadError};
pub use export::{
    export_consensus_csv, export_heatmap_csv, export_json, export_model_csv, generate_report,
    import_json, load_artifacts, save_artifacts,
};
pub use registry::{ModelRegistry, RejectedModel};
pub use runner::{
    run_model, RunError, RunReport, Runner, Selection, SkipKind, SkippedModel, SCHEMA_VERSION,
};
pub use settings::{RunSettings, ScreenerConfig, SettingsError};
pub use synthetic::synthetic_source;
