//! Data-driven model scanner.
//!
//! Every investment style is the same engine run over different data:
//! - `spec`: serializable model definitions (TOML)
//! - `component`: compiled components and their scoring
//! - `scanner`: validating and scoring a dataset
//! - `builtin`: the six embedded model definitions

pub mod builtin;
pub mod component;
pub mod scanner;
pub mod spec;

use std::collections::{BTreeMap, BTreeSet};

use crate::bucket::BucketTable;
use crate::condition::Condition;
use crate::error::ConfigError;
use crate::flags::{Category, FlagPredicate, FlagTaxonomy};
use crate::metric::{is_standard_metric, DerivedMetric};
use crate::trend::Trend;

pub use component::{AdjustmentRule, Component, ComponentBody, Fallback, Term};
pub use spec::{
    AdjustmentSpec, CaseSpec, ComponentSpec, FallbackSpec, FlagSpec, ModelSpec, TermSpec, TrendSpec,
};

/// Allowed distance of a weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-3;

/// A validated, runnable model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    spec: ModelSpec,
    derived: Vec<DerivedMetric>,
    components: Vec<Component>,
    flags: Vec<FlagPredicate>,
    /// Catalog metrics read from dataset rows (derived inputs included)
    used: BTreeSet<String>,
    /// Columns the dataset must carry and rows must fill
    required: BTreeSet<String>,
}

impl Model {
    /// Parse and compile a TOML model definition.
    pub fn from_toml(text: &str, taxonomy: &FlagTaxonomy) -> Result<Self, ConfigError> {
        let spec: ModelSpec =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::compile(spec, taxonomy)
    }

    /// Validate a definition and build the runnable model.
    pub fn compile(spec: ModelSpec, taxonomy: &FlagTaxonomy) -> Result<Self, ConfigError> {
        if spec.components.is_empty() {
            return Err(ConfigError::NoComponents);
        }

        // Derived metrics: names are new, inputs are known by the time they run.
        let mut known_derived: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for d in &spec.derived {
            if is_standard_metric(&d.name) || known_derived.contains_key(&d.name) {
                return Err(ConfigError::Duplicate {
                    kind: "metric",
                    name: d.name.clone(),
                });
            }
            let mut roots = Vec::new();
            for input in d.expr.inputs() {
                if is_standard_metric(input) {
                    roots.push(input.to_string());
                } else if let Some(inner) = known_derived.get(input) {
                    roots.extend(inner.iter().cloned());
                } else {
                    return Err(ConfigError::UnknownMetric {
                        metric: input.to_string(),
                        context: format!("derived metric '{}'", d.name),
                    });
                }
            }
            known_derived.insert(d.name.clone(), roots);
        }

        // Expand a referenced metric to the catalog columns behind it.
        let expand = |metric: &str, context: &str| -> Result<Vec<String>, ConfigError> {
            if is_standard_metric(metric) {
                Ok(vec![metric.to_string()])
            } else if let Some(roots) = known_derived.get(metric) {
                Ok(roots.clone())
            } else {
                Err(ConfigError::UnknownMetric {
                    metric: metric.to_string(),
                    context: context.to_string(),
                })
            }
        };

        let mut used = BTreeSet::new();
        let mut references: BTreeMap<String, usize> = BTreeMap::new();
        let mut components = Vec::with_capacity(spec.components.len());
        let mut seen_components = BTreeSet::new();

        for cs in &spec.components {
            if !seen_components.insert(cs.name.clone()) {
                return Err(ConfigError::Duplicate {
                    kind: "component",
                    name: cs.name.clone(),
                });
            }
            let component = compile_component(cs)?;
            let context = format!("component '{}'", cs.name);
            let mut columns = BTreeSet::new();
            for metric in component.metrics() {
                columns.extend(expand(&metric, &context)?);
            }
            for column in columns {
                *references.entry(column.clone()).or_default() += 1;
                used.insert(column);
            }
            components.push(component);
        }

        let component_weights: Vec<f64> = components.iter().map(|c| c.weight).collect();
        check_weights(&component_weights, &format!("model '{}'", spec.id))?;

        let mut flags = Vec::with_capacity(spec.flags.len());
        for fs in &spec.flags {
            let flag = taxonomy.resolve(&fs.tag, fs.category)?;
            let condition = Condition::parse(&fs.when)?;
            let context = format!("flag '{}'", fs.tag);
            for metric in condition.metrics() {
                used.extend(expand(&metric, &context)?);
            }
            flags.push(FlagPredicate { flag, condition });
        }

        let mut required: BTreeSet<String> = references
            .into_iter()
            .filter(|(_, count)| *count >= 2)
            .map(|(metric, _)| metric)
            .collect();
        for metric in &spec.required {
            let roots = expand(metric, "required list")?;
            required.extend(roots.iter().cloned());
            used.extend(roots);
        }

        Ok(Self {
            derived: spec.derived.clone(),
            spec,
            components,
            flags,
            used,
            required,
        })
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn theme(&self) -> Category {
        self.spec.theme
    }

    /// Dataset file name this model scans.
    pub fn dataset(&self) -> &str {
        &self.spec.dataset
    }

    pub fn enabled(&self) -> bool {
        self.spec.enabled
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn flag_predicates(&self) -> &[FlagPredicate] {
        &self.flags
    }

    pub fn used_metrics(&self) -> &BTreeSet<String> {
        &self.used
    }

    pub fn required_metrics(&self) -> &BTreeSet<String> {
        &self.required
    }
}

fn compile_component(cs: &ComponentSpec) -> Result<Component, ConfigError> {
    let context = format!("component '{}'", cs.name);
    check_weight(cs.weight, &context)?;

    let has_terms = !cs.terms.is_empty() || !cs.trends.is_empty();
    let body = match (cs.base, has_terms) {
        (Some(base), false) => {
            if !(0.0..=100.0).contains(&base) {
                return Err(ConfigError::ScoreOutOfRange {
                    context,
                    score: base,
                });
            }
            ComponentBody::Base(base)
        }
        (None, true) => {
            let mut terms = Vec::with_capacity(cs.terms.len() + cs.trends.len());
            for t in &cs.terms {
                check_weight(t.weight, &format!("{context} term '{}'", t.metric))?;
                let table =
                    BucketTable::new(&t.metric, t.buckets.clone(), t.below, t.above, t.missing)?
                        .with_inclusive(t.inclusive);
                terms.push(Term::Bucket {
                    weight: t.weight,
                    table,
                });
            }
            for t in &cs.trends {
                let trend_context = format!("{context} trend '{}'/'{}'", t.short, t.long);
                check_weight(t.weight, &trend_context)?;
                t.scores.validate(&trend_context)?;
                if let Some(collapse) = &t.collapse {
                    collapse.validate(&t.scores, &trend_context)?;
                }
                if !(0.0..=100.0).contains(&t.missing) {
                    return Err(ConfigError::ScoreOutOfRange {
                        context: trend_context,
                        score: t.missing,
                    });
                }
                terms.push(Term::Trend {
                    weight: t.weight,
                    trend: Trend {
                        short: t.short.clone(),
                        long: t.long.clone(),
                        favorable: t.favorable,
                        scores: t.scores,
                        missing: t.missing,
                        inclusive_short: t.inclusive_short,
                        collapse: t.collapse,
                    },
                });
            }
            let weights: Vec<f64> = terms.iter().map(Term::weight).collect();
            check_weights(&weights, &context)?;
            ComponentBody::Terms(terms)
        }
        _ => return Err(ConfigError::ComponentShape(cs.name.clone())),
    };

    let adjustments = compile_adjustments(&cs.adjustments, &context)?;

    let fallback = match &cs.fallback {
        Some(fs) => {
            let fallback_context = format!("{context} fallback");
            if !(0.0..=100.0).contains(&fs.base) {
                return Err(ConfigError::ScoreOutOfRange {
                    context: fallback_context,
                    score: fs.base,
                });
            }
            Some(Fallback {
                unless: Condition::parse(&fs.unless)?,
                base: fs.base,
                adjustments: compile_adjustments(&fs.adjustments, &fallback_context)?,
            })
        }
        None => None,
    };

    Ok(Component {
        name: cs.name.clone(),
        weight: cs.weight,
        body,
        adjustments,
        fallback,
    })
}

fn compile_adjustments(
    rules: &[AdjustmentSpec],
    context: &str,
) -> Result<Vec<AdjustmentRule>, ConfigError> {
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules {
        let mut cases = Vec::with_capacity(rule.cases.len());
        for case in &rule.cases {
            if !case.add.is_finite() {
                return Err(ConfigError::InvalidWeight {
                    context: format!("{context} adjustment '{}'", case.when),
                    weight: case.add,
                });
            }
            cases.push((Condition::parse(&case.when)?, case.add));
        }
        compiled.push(AdjustmentRule { cases });
    }
    Ok(compiled)
}

fn check_weight(weight: f64, context: &str) -> Result<(), ConfigError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight {
            context: context.to_string(),
            weight,
        })
    }
}

fn check_weights(weights: &[f64], context: &str) -> Result<(), ConfigError> {
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() <= WEIGHT_TOLERANCE {
        Ok(())
    } else {
        Err(ConfigError::WeightSum {
            context: context.to_string(),
            sum,
        })
    }
}
