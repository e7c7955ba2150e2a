//! Weighted ranking of cold repositories
//!
//! Two weighting policies:
//! - Activity-penalizing: `total = alpha*complexity + beta*innovation -
//!   gamma*(activity/activity_scale)`, rounded to 2 decimals
//! - Direct subtraction: `weighted = complexity + innovation - k*popularity`
//!
//! Global invariants enforced:
//! - Sorted by score descending, ties by repo_name ascending, then id
//! - Output order does not depend on input order
//! - Scores are always finite

use crate::metric::{NormalizedRow, RankedRepo};
use crate::normalize::{coerce, round2_decimal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Weighting policy for the final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Penalizes recent activity as the measure of attention
    ActivityPenalizing {
        alpha: f64,
        beta: f64,
        gamma: f64,
        /// Activity is divided by this before weighting
        activity_scale: f64,
    },
    /// Subtracts popularity `k` times from complexity + innovation
    DirectSubtraction { k: f64 },
}

impl RankingPolicy {
    pub fn activity_penalizing() -> Self {
        RankingPolicy::ActivityPenalizing {
            alpha: 0.3,
            beta: 0.3,
            gamma: 0.4,
            activity_scale: 1000.0,
        }
    }

    pub fn direct_subtraction(k: f64) -> Self {
        RankingPolicy::DirectSubtraction { k }
    }

    /// Output column name for the final score
    pub fn score_column(&self) -> &'static str {
        match self {
            RankingPolicy::ActivityPenalizing { .. } => "total_score",
            RankingPolicy::DirectSubtraction { .. } => "weighted_score",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankingPolicy::ActivityPenalizing { .. } => "activity_penalizing",
            RankingPolicy::DirectSubtraction { .. } => "direct_subtraction",
        }
    }

    /// Combine component scores into the final score
    pub fn score(&self, components: &Components) -> f64 {
        let total = match *self {
            RankingPolicy::ActivityPenalizing {
                alpha,
                beta,
                gamma,
                activity_scale,
            } => {
                let activity = components.activity / activity_scale;
                let activity = if activity.is_finite() { activity } else { 0.0 };
                round2_decimal(
                    alpha * components.complexity + beta * components.innovation
                        - gamma * activity,
                )
            }
            RankingPolicy::DirectSubtraction { k } => {
                components.complexity + components.innovation - k * components.popularity
            }
        };
        // -0.0 would sort below an equal 0.0 and skip the name tie-break
        if total.is_finite() && total != 0.0 {
            total
        } else {
            0.0
        }
    }
}

impl Default for RankingPolicy {
    fn default() -> Self {
        RankingPolicy::direct_subtraction(1.0)
    }
}

/// Which values feed the policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    /// 0-100 normalized complexity, innovation and popularity
    #[default]
    Normalized,
    /// Raw values as joined, missing values coerced to 0
    Raw,
}

/// Policy plus basis
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankingConfig {
    pub policy: RankingPolicy,
    pub basis: ScoreBasis,
}

/// Component values fed to a policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Components {
    pub complexity: f64,
    pub innovation: f64,
    pub popularity: f64,
    /// Always raw; activity is not part of the normalized scale
    pub activity: f64,
}

impl Components {
    pub fn from_row(row: &NormalizedRow, basis: ScoreBasis) -> Self {
        let activity = coerce(row.row.activity_score);
        match basis {
            ScoreBasis::Normalized => Components {
                complexity: row.normalized.complexity,
                innovation: row.normalized.innovation,
                popularity: row.normalized.popularity,
                activity,
            },
            ScoreBasis::Raw => Components {
                complexity: coerce(row.row.complexity_score()),
                innovation: coerce(row.row.innovation_score),
                popularity: coerce(Some(row.row.popularity_score)),
                activity,
            },
        }
    }
}

/// Ordering used for every ranked sequence
pub fn compare_ranked(a: &RankedRepo, b: &RankedRepo) -> Ordering {
    // 1. Score descending
    b.total_score
        .total_cmp(&a.total_score)
        // 2. Repository name ascending
        .then_with(|| a.repo_name.cmp(&b.repo_name))
        // 3. Id ascending
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort deterministically and assign 1-based ranks
pub fn sort_ranked(mut repos: Vec<RankedRepo>) -> Vec<RankedRepo> {
    repos.sort_by(compare_ranked);
    for (i, repo) in repos.iter_mut().enumerate() {
        repo.rank = i + 1;
    }
    repos
}

/// Score and rank a normalized corpus
pub fn rank(rows: &[NormalizedRow], config: &RankingConfig) -> Vec<RankedRepo> {
    let repos = rows
        .iter()
        .map(|row| {
            let components = Components::from_row(row, config.basis);
            RankedRepo {
                rank: 0,
                id: row.row.id.clone(),
                platform: row.row.platform,
                repo_name: row.row.repo_name.clone(),
                complexity_score: coerce(row.row.complexity_score()),
                innovation_score: coerce(row.row.innovation_score),
                popularity_score: coerce(Some(row.row.popularity_score)),
                activity_score: components.activity,
                normalized: row.normalized,
                complexity_available: matches!(row.row.complexity, Some(c) if c.success),
                total_score: config.policy.score(&components),
            }
        })
        .collect();
    sort_ranked(repos)
}
