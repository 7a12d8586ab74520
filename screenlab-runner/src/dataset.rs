//! Dataset loading for the runner.
//!
//! Each model names the table it reads (`dataset = "turnaround.csv"`). A
//! `DatasetSource` resolves that name to a normalized `Dataset`:
//! - `CsvDirectory`: one CSV file per dataset under a root directory
//! - `InMemorySource`: prebuilt tables (tests, synthetic runs)
//!
//! CSV files need a `Ticker` header (any case). Every other column is kept as
//! text cells classified by `Cell::parse`; short rows read as missing values.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use screenlab_core::{Cell, Dataset, RawRow};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("dataset '{name}' not found in {location}")]
    NotFound { name: String, location: String },

    #[error("failed to read dataset '{name}': {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },

    #[error("dataset '{name}' has no Ticker column")]
    MissingTickerColumn { name: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl LoadError {
    /// Whether the table simply does not exist (as opposed to being unreadable).
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}

/// Where model datasets come from.
pub trait DatasetSource: Send + Sync {
    fn load(&self, name: &str) -> Result<Dataset, LoadError>;

    /// Short human-readable location, used in logs and reports.
    fn describe(&self) -> String;

    /// Whether datasets from this source are generated rather than real.
    fn is_synthetic(&self) -> bool {
        false
    }
}

// ─── CSV parsing ────────────────────────────────────────────────────

/// Parse a CSV table into a `Dataset` named `name`.
pub fn parse_csv<R: Read>(name: &str, reader: R) -> Result<Dataset, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let ticker_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("ticker"))
        .ok_or_else(|| LoadError::MissingTickerColumn {
            name: name.to_string(),
        })?;

    let columns: BTreeSet<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != ticker_idx && !h.is_empty())
        .map(|(_, h)| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let ticker = record.get(ticker_idx).unwrap_or_default().to_string();
        let cells: BTreeMap<String, Cell> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| *i != ticker_idx && !h.is_empty())
            .map(|(i, h)| {
                let cell = record.get(i).map(Cell::parse).unwrap_or(Cell::Missing);
                (h.to_string(), cell)
            })
            .collect();
        rows.push(RawRow { ticker, cells });
    }

    debug!(dataset = name, rows = rows.len(), columns = columns.len(), "parsed csv");
    Ok(Dataset::new(name, columns, rows))
}

// ─── Sources ────────────────────────────────────────────────────────

/// One CSV file per dataset under `root`.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DatasetSource for CsvDirectory {
    fn load(&self, name: &str) -> Result<Dataset, LoadError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(LoadError::NotFound {
                name: name.to_string(),
                location: self.root.display().to_string(),
            });
        }
        let file = std::fs::File::open(&path).map_err(|source| LoadError::Io {
            name: name.to_string(),
            source,
        })?;
        parse_csv(name, file)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Prebuilt datasets keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    datasets: BTreeMap<String, Dataset>,
    synthetic: bool,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the contents as generated data.
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn insert(&mut self, dataset: Dataset) {
        self.datasets.insert(dataset.name.clone(), dataset);
    }

    pub fn with(mut self, dataset: Dataset) -> Self {
        self.insert(dataset);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

impl DatasetSource for InMemorySource {
    fn load(&self, name: &str) -> Result<Dataset, LoadError> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
                location: "memory".to_string(),
            })
    }

    fn describe(&self) -> String {
        if self.synthetic {
            format!("synthetic ({} datasets)", self.datasets.len())
        } else {
            format!("memory ({} datasets)", self.datasets.len())
        }
    }

    fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}
