//! Trend confirmation: compare a short-window delta with a long-window
//! delta of the same metric and classify the pair into one of five cases.
//!
//! Case order encodes "confirmation beats magnitude": a trend seen in both
//! windows outranks a large move seen in only one.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which direction of change counts as good for the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Rising,
    Falling,
}

impl Direction {
    fn favorable(self, delta: f64) -> bool {
        match self {
            Self::Rising => delta > 0.0,
            Self::Falling => delta < 0.0,
        }
    }

    /// `a` is further in the favorable direction than `b`.
    fn more_extreme(self, a: f64, b: f64) -> bool {
        match self {
            Self::Rising => a > b,
            Self::Falling => a < b,
        }
    }
}

/// The five trend cases, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendCase {
    /// Both windows favorable and the short window stronger.
    Accelerating,
    /// Both windows favorable.
    Confirmed,
    /// Long window favorable, short window not.
    Pullback,
    /// Short window favorable, long window not.
    Emerging,
    /// Neither window favorable.
    Against,
}

pub fn classify(short: f64, long: f64, direction: Direction) -> TrendCase {
    classify_with(short, long, direction, false)
}

/// With `inclusive_short`, a flat short window counts as favorable and a short
/// window level with the long one counts as accelerating.
pub fn classify_with(
    short: f64,
    long: f64,
    direction: Direction,
    inclusive_short: bool,
) -> TrendCase {
    let short_ok = direction.favorable(short) || (inclusive_short && short == 0.0);
    let ahead = direction.more_extreme(short, long) || (inclusive_short && short == long);
    match (short_ok, direction.favorable(long)) {
        (true, true) if ahead => TrendCase::Accelerating,
        (true, true) => TrendCase::Confirmed,
        (false, true) => TrendCase::Pullback,
        (true, false) => TrendCase::Emerging,
        (false, false) => TrendCase::Against,
    }
}

/// Score per trend case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendScores {
    pub accelerating: f64,
    pub confirmed: f64,
    pub pullback: f64,
    pub emerging: f64,
    pub against: f64,
}

impl TrendScores {
    pub fn get(&self, case: TrendCase) -> f64 {
        match case {
            TrendCase::Accelerating => self.accelerating,
            TrendCase::Confirmed => self.confirmed,
            TrendCase::Pullback => self.pullback,
            TrendCase::Emerging => self.emerging,
            TrendCase::Against => self.against,
        }
    }

    /// Scores must lie in [0, 100] and not increase down the case order.
    pub fn validate(&self, context: &str) -> Result<(), ConfigError> {
        let ordered = [
            self.accelerating,
            self.confirmed,
            self.pullback,
            self.emerging,
            self.against,
        ];
        for score in ordered {
            if !(0.0..=100.0).contains(&score) {
                return Err(ConfigError::ScoreOutOfRange {
                    context: context.to_string(),
                    score,
                });
            }
        }
        if ordered.windows(2).any(|w| w[1] > w[0]) {
            return Err(ConfigError::ComponentShape(format!(
                "{context}: trend scores must not increase from accelerating to against"
            )));
        }
        Ok(())
    }
}

/// A pullback whose short window moved past `beyond` against the favorable
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collapse {
    pub beyond: f64,
    pub score: f64,
}

impl Collapse {
    /// Score in [0, 100], no higher than the pullback score.
    pub fn validate(&self, scores: &TrendScores, context: &str) -> Result<(), ConfigError> {
        if !self.beyond.is_finite() || !(0.0..=scores.pullback).contains(&self.score) {
            return Err(ConfigError::ScoreOutOfRange {
                context: format!("{context} collapse"),
                score: self.score,
            });
        }
        Ok(())
    }
}

/// A trend term: one metric seen through two windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub short: String,
    pub long: String,
    pub favorable: Direction,
    pub scores: TrendScores,
    pub missing: f64,
    #[serde(default)]
    pub inclusive_short: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse: Option<Collapse>,
}

impl Trend {
    pub fn case(&self, short: f64, long: f64) -> TrendCase {
        classify_with(short, long, self.favorable, self.inclusive_short)
    }

    /// Score for a pair of deltas; a missing window yields the missing score.
    pub fn score(&self, short: Option<f64>, long: Option<f64>) -> f64 {
        let (Some(s), Some(l)) = (short, long) else {
            return self.missing;
        };
        let case = self.case(s, l);
        match self.collapse {
            Some(c) if case == TrendCase::Pullback && self.favorable.more_extreme(c.beyond, s) => {
                c.score
            }
            _ => self.scores.get(case),
        }
    }
}
