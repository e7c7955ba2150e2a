//! Coldspots core library - scoring, filtering and ranking of low-visibility repositories

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Every stage produces new columns; no score is overwritten in place
// - Joins never drop or duplicate rows; failed joins stay as None
// - Scores are always finite; undefined results fall back to 0
// - Corpus-wide statistics are computed before any row is rescaled
// - No randomness, clocks, threads, or async
// - Identical input yields byte-for-byte identical output

pub mod activity;
pub mod cold;
pub mod complexity;
pub mod config;
pub mod error;
pub mod io;
pub mod listing;
pub mod merge;
pub mod metric;
pub mod normalize;
pub mod pipeline;
pub mod popularity;
pub mod ranking;
pub mod report;
pub mod table;

pub use config::ResolvedConfig;
pub use error::{PipelineError, RowRejection};
pub use metric::{Platform, RankedRepo, RepoMetric, RepoName};
pub use pipeline::{run_pipeline, PipelineOutput, PipelineSummary};
pub use popularity::{popularity_score, PopularityWeights};
pub use ranking::{RankingConfig, RankingPolicy, ScoreBasis};
pub use report::{render_json, render_text, RankedCorpus, ScoreDimension};
pub use table::Encoding;
