//! Compiled components: weighted terms, adjustment rules, scoring.

use std::collections::BTreeSet;

use crate::bucket::BucketTable;
use crate::condition::Condition;
use crate::metric::MetricRow;
use crate::trend::Trend;

/// One weighted input of a component.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Bucket { weight: f64, table: BucketTable },
    Trend { weight: f64, trend: Trend },
}

impl Term {
    pub fn weight(&self) -> f64 {
        match self {
            Self::Bucket { weight, .. } | Self::Trend { weight, .. } => *weight,
        }
    }

    pub fn score(&self, row: &MetricRow) -> f64 {
        match self {
            Self::Bucket { table, .. } => table.score(row.get(table.metric())),
            Self::Trend { trend, .. } => trend.score(row.get(&trend.short), row.get(&trend.long)),
        }
    }

    fn metrics(&self) -> Vec<&str> {
        match self {
            Self::Bucket { table, .. } => vec![table.metric()],
            Self::Trend { trend, .. } => vec![trend.short.as_str(), trend.long.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentBody {
    /// Constant starting score, shaped only by adjustments.
    Base(f64),
    Terms(Vec<Term>),
}

/// First matching case adds its points.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentRule {
    pub cases: Vec<(Condition, f64)>,
}

impl AdjustmentRule {
    pub fn apply(&self, row: &MetricRow) -> f64 {
        self.cases
            .iter()
            .find(|(cond, _)| cond.evaluate(row))
            .map(|(_, add)| *add)
            .unwrap_or(0.0)
    }
}

/// Constant score used instead of the body when `unless` is false for a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Fallback {
    pub unless: Condition,
    pub base: f64,
    pub adjustments: Vec<AdjustmentRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub weight: f64,
    pub body: ComponentBody,
    pub adjustments: Vec<AdjustmentRule>,
    pub fallback: Option<Fallback>,
}

impl Component {
    /// Component sub-score, clamped to [0, 100].
    pub fn score(&self, row: &MetricRow) -> f64 {
        if let Some(fallback) = &self.fallback {
            if !fallback.unless.evaluate(row) {
                return apply_rules(fallback.base, &fallback.adjustments, row);
            }
        }
        let base = match &self.body {
            ComponentBody::Base(score) => *score,
            ComponentBody::Terms(terms) => terms.iter().map(|t| t.weight() * t.score(row)).sum(),
        };
        apply_rules(base, &self.adjustments, row)
    }

    /// Metric names read by terms and adjustment conditions.
    pub fn metrics(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let ComponentBody::Terms(terms) = &self.body {
            for term in terms {
                out.extend(term.metrics().into_iter().map(str::to_string));
            }
        }
        let fallback_rules = self.fallback.iter().flat_map(|f| &f.adjustments);
        for rule in self.adjustments.iter().chain(fallback_rules) {
            for (cond, _) in &rule.cases {
                out.extend(cond.metrics());
            }
        }
        if let Some(fallback) = &self.fallback {
            out.extend(fallback.unless.metrics());
        }
        out
    }
}

fn apply_rules(base: f64, rules: &[AdjustmentRule], row: &MetricRow) -> f64 {
    let adjusted = base + rules.iter().map(|r| r.apply(row)).sum::<f64>();
    adjusted.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Bucket;

    fn row(values: &[(&str, Option<f64>)]) -> MetricRow {
        MetricRow::new(
            "AAA",
            values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        )
    }

    fn rule(cases: &[(&str, f64)]) -> AdjustmentRule {
        AdjustmentRule {
            cases: cases
                .iter()
                .map(|(w, a)| (Condition::parse(w).unwrap(), *a))
                .collect(),
        }
    }

    #[test]
    fn base_with_first_matching_case() {
        let c = Component {
            name: "contrarian".into(),
            weight: 0.25,
            body: ComponentBody::Base(60.0),
            adjustments: vec![rule(&[("M < 50 and Q > 0", 20.0), ("M > 200", -20.0)])],
            fallback: None,
        };
        assert_eq!(c.score(&row(&[("M", Some(10.0)), ("Q", Some(5.0))])), 80.0);
        assert_eq!(c.score(&row(&[("M", Some(300.0)), ("Q", Some(5.0))])), 40.0);
        assert_eq!(c.score(&row(&[("M", None), ("Q", None)])), 60.0);
    }

    #[test]
    fn rules_accumulate_and_clamp() {
        let table = BucketTable::new(
            "X",
            vec![Bucket::new(f64::NEG_INFINITY, f64::INFINITY, 95.0)],
            None,
            None,
            0.0,
        )
        .unwrap();
        let c = Component {
            name: "c".into(),
            weight: 1.0,
            body: ComponentBody::Terms(vec![Term::Bucket { weight: 1.0, table }]),
            adjustments: vec![rule(&[("X > 0", 10.0)]), rule(&[("X > 0", 10.0)])],
            fallback: None,
        };
        assert_eq!(c.score(&row(&[("X", Some(1.0))])), 100.0);
        assert_eq!(c.metrics().into_iter().collect::<Vec<_>>(), vec!["X"]);
    }

    #[test]
    fn fallback_replaces_body_when_gate_fails() {
        let table = BucketTable::new(
            "X",
            vec![Bucket::new(f64::NEG_INFINITY, f64::INFINITY, 80.0)],
            None,
            None,
            0.0,
        )
        .unwrap();
        let c = Component {
            name: "c".into(),
            weight: 1.0,
            body: ComponentBody::Terms(vec![Term::Bucket { weight: 1.0, table }]),
            adjustments: vec![rule(&[("X > 5", 10.0)])],
            fallback: Some(Fallback {
                unless: Condition::parse("X > 0 and Y > 0").unwrap(),
                base: 30.0,
                adjustments: vec![rule(&[("X > 0", 15.0)]), rule(&[("Y > 0", 15.0)])],
            }),
        };
        assert_eq!(c.score(&row(&[("X", Some(10.0)), ("Y", Some(1.0))])), 90.0);
        assert_eq!(c.score(&row(&[("X", Some(10.0)), ("Y", Some(-1.0))])), 45.0);
        assert_eq!(c.score(&row(&[("X", Some(-1.0)), ("Y", None)])), 30.0);
        let metrics: Vec<_> = c.metrics().into_iter().collect();
        assert_eq!(metrics, vec!["X", "Y"]);
    }
}
