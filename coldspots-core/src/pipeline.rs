//! In-memory execution of the whole scoring pipeline
//!
//! Stages run strictly one after another over the whole corpus:
//! scope filter, popularity, cold set, merge, normalization, ranking.
//! Normalization statistics are therefore always computed over a
//! fully populated corpus.

use crate::cold::select_cold;
use crate::config::ResolvedConfig;
use crate::error::RowRejection;
use crate::merge::{complete_only, merge_scores, MergeStats, SideTables};
use crate::metric::RepoMetric;
use crate::normalize::{normalize_corpus, ScoreColumn};
use crate::popularity::score_corpus;
use crate::ranking::rank;
use crate::report::RankedCorpus;
use log::info;
use serde::Serialize;

/// Row counts and diagnostics for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineSummary {
    pub input_rows: usize,
    /// Rows removed by include/exclude patterns
    pub scoped_out: usize,
    /// Rows rejected while reading inputs
    pub rejected: Vec<RowRejection>,
    pub median_score: Option<f64>,
    pub cold_rows: usize,
    pub merge: MergeStats,
    /// Rows dropped because a score was missing or unavailable
    pub incomplete_dropped: usize,
    pub degenerate_columns: Vec<ScoreColumn>,
    pub ranked_rows: usize,
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub corpus: RankedCorpus,
    pub summary: PipelineSummary,
}

/// Run every stage over already materialized inputs
pub fn run_pipeline(
    metrics: &[RepoMetric],
    sides: &SideTables,
    config: &ResolvedConfig,
) -> PipelineOutput {
    let mut summary = PipelineSummary {
        input_rows: metrics.len(),
        policy: config.ranking.policy.name().to_string(),
        ..PipelineSummary::default()
    };

    let scoped: Vec<RepoMetric> = metrics
        .iter()
        .filter(|m| config.should_include(m.repo_name.as_str()))
        .cloned()
        .collect();
    summary.scoped_out = metrics.len() - scoped.len();

    let scored = score_corpus(&scoped, &config.popularity);
    let cold = select_cold(&scored, config.star_ceiling);
    summary.median_score = cold.median_score;
    summary.cold_rows = cold.repos.len();

    let (merged, stats) = merge_scores(&cold.repos, sides);
    summary.merge = stats;

    let merged = if config.exclude_incomplete {
        let kept = complete_only(&merged);
        summary.incomplete_dropped = merged.len() - kept.len();
        kept
    } else {
        merged
    };

    let normalized = normalize_corpus(&merged);
    summary.degenerate_columns = normalized.degenerate;

    let ranked = rank(&normalized.rows, &config.ranking);
    summary.ranked_rows = ranked.len();

    info!(
        "pipeline: {} input, {} cold, {} ranked ({})",
        summary.input_rows, summary.cold_rows, summary.ranked_rows, summary.policy
    );

    PipelineOutput {
        corpus: RankedCorpus::new(config.ranking.policy.score_column(), ranked),
        summary,
    }
}
