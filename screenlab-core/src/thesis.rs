//! Investment thesis: dominant category, conviction and a short detail line,
//! derived purely from an aggregated consensus record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusRecord;
use crate::flags::Category;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conviction {
    #[default]
    Weak,
    Medium,
    Strong,
}

impl fmt::Display for Conviction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
        })
    }
}

/// Thresholds for conviction levels and the detail line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThesisConfig {
    /// Dominant strength needed for `Strong`
    pub strong_strength: f64,
    /// Coverage needed for `Strong`
    pub strong_min_coverage: usize,
    /// Dominant strength needed for `Medium`
    pub medium_strength: f64,
    /// Rank that counts as a top-tier placement
    pub top_tier_rank: usize,
    /// Secondary categories listed in the detail
    pub max_secondary: usize,
}

impl Default for ThesisConfig {
    fn default() -> Self {
        Self {
            strong_strength: 4.0,
            strong_min_coverage: 3,
            medium_strength: 2.0,
            top_tier_rank: 5,
            max_secondary: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thesis {
    /// `None` when the ticker has no positive flags
    pub category: Option<Category>,
    pub conviction: Conviction,
    pub detail: String,
}

impl fmt::Display for Thesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Some(cat) => write!(f, "{cat} ({}): {}", self.conviction, self.detail),
            None => write!(f, "none ({}): {}", self.conviction, self.detail),
        }
    }
}

/// Strongest category; ties go to the higher-priority category.
pub fn dominant_category(strengths: &BTreeMap<Category, f64>) -> Option<Category> {
    let mut best: Option<(Category, f64)> = None;
    // BTreeMap iterates in priority order, so a strict `>` keeps the earlier
    // category on ties.
    for (&cat, &strength) in strengths {
        if strength <= 0.0 {
            continue;
        }
        match best {
            Some((_, top)) if strength <= top => {}
            _ => best = Some((cat, strength)),
        }
    }
    best.map(|(cat, _)| cat)
}

pub fn generate(record: &ConsensusRecord, config: &ThesisConfig) -> Thesis {
    let Some(category) = dominant_category(&record.category_strength) else {
        return Thesis {
            category: None,
            conviction: Conviction::Weak,
            detail: with_warnings("no positive flags".to_string(), record.warning_count),
        };
    };
    let strength = record
        .category_strength
        .get(&category)
        .copied()
        .unwrap_or(0.0);

    let conviction =
        if strength >= config.strong_strength && record.coverage >= config.strong_min_coverage {
            Conviction::Strong
        } else if strength >= config.medium_strength {
            Conviction::Medium
        } else {
            Conviction::Weak
        };

    let mut secondary: Vec<(Category, f64)> = record
        .category_strength
        .iter()
        .filter(|(&cat, &s)| cat != category && s > 0.0)
        .map(|(&cat, &s)| (cat, s))
        .collect();
    secondary.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut parts = vec![format!(
        "{} model(s), {}x TOP{}",
        record.coverage, record.top_tier_hits, config.top_tier_rank
    )];
    if !secondary.is_empty() {
        let names: Vec<&str> = secondary
            .iter()
            .take(config.max_secondary)
            .map(|(cat, _)| cat.as_str())
            .collect();
        parts.push(format!("supported by {}", names.join(", ")));
    }

    Thesis {
        category: Some(category),
        conviction,
        detail: with_warnings(parts.join("; "), record.warning_count),
    }
}

fn with_warnings(detail: String, warnings: usize) -> String {
    if warnings > 0 {
        format!("{detail}; {warnings} warning(s)")
    } else {
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(strengths: &[(Category, f64)], coverage: usize, warnings: usize) -> ConsensusRecord {
        ConsensusRecord {
            ticker: "AAA".into(),
            coverage,
            top_tier_hits: 1,
            warning_count: warnings,
            category_strength: strengths.iter().copied().collect(),
            ..ConsensusRecord::default()
        }
    }

    #[test]
    fn ties_follow_priority() {
        let s: BTreeMap<_, _> = [(Category::Cash, 3.0), (Category::Value, 3.0)]
            .into_iter()
            .collect();
        assert_eq!(dominant_category(&s), Some(Category::Value));
        assert_eq!(dominant_category(&BTreeMap::new()), None);
    }

    #[test]
    fn conviction_levels() {
        let cfg = ThesisConfig::default();
        let strong = generate(&record(&[(Category::Quality, 4.5)], 3, 0), &cfg);
        assert_eq!(strong.conviction, Conviction::Strong);

        // high strength but narrow coverage
        let medium = generate(&record(&[(Category::Quality, 4.5)], 2, 0), &cfg);
        assert_eq!(medium.conviction, Conviction::Medium);

        let weak = generate(&record(&[(Category::Growth, 1.0)], 5, 0), &cfg);
        assert_eq!(weak.conviction, Conviction::Weak);
    }

    #[test]
    fn detail_lists_secondaries_and_warnings() {
        let t = generate(
            &record(
                &[
                    (Category::Quality, 3.0),
                    (Category::Value, 2.0),
                    (Category::Growth, 1.0),
                    (Category::Cash, 1.0),
                ],
                3,
                2,
            ),
            &ThesisConfig::default(),
        );
        assert_eq!(t.category, Some(Category::Quality));
        assert_eq!(
            t.detail,
            "3 model(s), 1x TOP5; supported by value, growth; 2 warning(s)"
        );
    }

    #[test]
    fn no_positive_flags() {
        let t = generate(&record(&[], 1, 1), &ThesisConfig::default());
        assert_eq!(t.category, None);
        assert_eq!(t.conviction, Conviction::Weak);
        assert_eq!(t.detail, "no positive flags; 1 warning(s)");
    }
}
