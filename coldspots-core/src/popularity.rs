//! Popularity score calculation
//!
//! Global invariants enforced:
//! - Deterministic, evaluated in a fixed operation order
//! - Non-negative for non-negative inputs
//! - Always finite

use crate::error::{PipelineError, Result};
use crate::metric::{PopularityRow, RepoMetric};
use log::debug;

/// Configurable weights for the popularity formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopularityWeights {
    /// Star weight `a`
    pub stars: f64,
    /// Fork weight `b`
    pub forks: f64,
    /// Size penalty coefficient `c`
    pub penalty: f64,
}

impl Default for PopularityWeights {
    fn default() -> Self {
        PopularityWeights {
            stars: 1.0,
            forks: 0.5,
            penalty: 0.01,
        }
    }
}

/// Calculate the popularity score with default weights
pub fn popularity_score(stars: i64, forks: i64) -> Result<f64> {
    popularity_score_with_weights(stars, forks, &PopularityWeights::default())
}

/// Calculate the popularity score with custom weights
///
/// Formula:
/// score = (a * ln(stars + 1) + b * ln(forks + 1)) / (1 + c * (stars + forks))
///
/// Negative counts are rejected rather than clamped.
pub fn popularity_score_with_weights(
    stars: i64,
    forks: i64,
    weights: &PopularityWeights,
) -> Result<f64> {
    if stars < 0 || forks < 0 {
        return Err(PipelineError::InvalidInput(format!(
            "stars and forks must be non-negative (got stars={}, forks={})",
            stars, forks
        )));
    }
    Ok(score_counts(stars as u64, forks as u64, weights))
}

/// Formula body for counts that are already known to be non-negative
pub(crate) fn score_counts(stars: u64, forks: u64, weights: &PopularityWeights) -> f64 {
    let star_log = (stars as f64 + 1.0).ln();
    let fork_log = (forks as f64 + 1.0).ln();
    let numerator = weights.stars * star_log + weights.forks * fork_log;
    let denominator = 1.0 + weights.penalty * (stars as f64 + forks as f64);
    let score = numerator / denominator;
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Score every record, producing a new row with the `popularity_score` column
pub fn score_corpus(metrics: &[RepoMetric], weights: &PopularityWeights) -> Vec<PopularityRow> {
    let rows: Vec<PopularityRow> = metrics
        .iter()
        .map(|metric| PopularityRow {
            metric: metric.clone(),
            popularity_score: score_counts(metric.stars, metric.forks, weights),
        })
        .collect();
    debug!("scored popularity for {} repositories", rows.len());
    rows
}
