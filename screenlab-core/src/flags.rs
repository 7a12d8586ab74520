//! Flag taxonomy and the flag evaluator.
//!
//! A flag is a short tag (`Q`, `V`, `!` ...) with a polarity and, for
//! positive flags, an analytical category. The taxonomy is an immutable value
//! built once and handed to model construction; nothing here is global.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::ConfigError;
use crate::metric::MetricRow;

/// Analytical category of a positive flag.
///
/// Declaration order is the tie-break priority (Quality first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Quality,
    Value,
    Growth,
    Momentum,
    Safety,
    Cash,
    Turnaround,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Quality,
        Category::Value,
        Category::Growth,
        Category::Momentum,
        Category::Safety,
        Category::Cash,
        Category::Turnaround,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Value => "value",
            Self::Growth => "growth",
            Self::Momentum => "momentum",
            Self::Safety => "safety",
            Self::Cash => "cash",
            Self::Turnaround => "turnaround",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Warning,
}

/// A resolved flag: tag, category (positive flags only) and polarity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub tag: String,
    pub category: Option<Category>,
    pub polarity: Polarity,
}

impl Flag {
    pub fn positive(tag: impl Into<String>, category: Category) -> Self {
        Self {
            tag: tag.into(),
            category: Some(category),
            polarity: Polarity::Positive,
        }
    }

    pub fn warning(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            category: None,
            polarity: Polarity::Warning,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.polarity == Polarity::Warning
    }
}

// ─── Taxonomy ───────────────────────────────────────────────────────

/// Default tag → (category, polarity) table.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagTaxonomy {
    entries: BTreeMap<String, Flag>,
}

impl FlagTaxonomy {
    /// The standard table shared by the built-in models.
    pub fn standard() -> Self {
        use Category::*;
        let positives = [
            ("Q", Quality),
            ("V", Value),
            ("D", Value),
            ("G", Growth),
            ("R", Growth),
            ("M", Momentum),
            ("A", Momentum),
            ("S", Safety),
            ("B", Safety),
            ("C", Cash),
            ("L", Cash),
            ("T", Turnaround),
        ];
        let mut entries: BTreeMap<String, Flag> = positives
            .into_iter()
            .map(|(tag, cat)| (tag.to_string(), Flag::positive(tag, cat)))
            .collect();
        for tag in ["!", "?"] {
            entries.insert(tag.to_string(), Flag::warning(tag));
        }
        Self { entries }
    }

    pub fn get(&self, tag: &str) -> Option<&Flag> {
        self.entries.get(tag)
    }

    /// Resolve a tag declared by a model, applying an optional category
    /// override.
    ///
    /// Warning tags keep their polarity and reject overrides. A tag absent
    /// from the table becomes a positive flag only when a category is given.
    pub fn resolve(&self, tag: &str, category: Option<Category>) -> Result<Flag, ConfigError> {
        match (self.entries.get(tag), category) {
            (Some(flag), _) if flag.is_warning() => match category {
                Some(_) => Err(ConfigError::WarningCategory(tag.to_string())),
                None => Ok(flag.clone()),
            },
            (Some(_), Some(cat)) | (None, Some(cat)) => Ok(Flag::positive(tag, cat)),
            (Some(flag), None) => Ok(flag.clone()),
            (None, None) => Err(ConfigError::UnknownFlag(tag.to_string())),
        }
    }
}

impl Default for FlagTaxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

// ─── Flag sets ──────────────────────────────────────────────────────

/// Ordered, duplicate-free set of flags (insertion order kept).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSet(Vec<Flag>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a flag unless its tag is already present.
    pub fn insert(&mut self, flag: Flag) -> bool {
        if self.contains(&flag.tag) {
            return false;
        }
        self.0.push(flag);
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|f| f.tag == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|f| f.tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn positive_count(&self) -> usize {
        self.0.iter().filter(|f| !f.is_warning()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.0.iter().filter(|f| f.is_warning()).count()
    }

    pub fn count_in(&self, category: Category) -> usize {
        self.0
            .iter()
            .filter(|f| f.category == Some(category))
            .count()
    }

    /// Report form: `[Q][V][!]`.
    pub fn render_brackets(&self) -> String {
        self.0.iter().map(|f| format!("[{}]", f.tag)).collect()
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut set = FlagSet::new();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

// ─── Evaluator ──────────────────────────────────────────────────────

/// A flag attached when its condition holds.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagPredicate {
    pub flag: Flag,
    pub condition: Condition,
}

/// Evaluate predicates in declaration order; a tag is emitted at most once.
pub fn evaluate_flags(row: &MetricRow, predicates: &[FlagPredicate]) -> FlagSet {
    predicates
        .iter()
        .filter(|p| p.condition.evaluate(row))
        .map(|p| p.flag.clone())
        .collect()
}
