//! Per-repository records threaded through the pipeline
//!
//! Global invariants enforced:
//! - `id` and `repo_name` never change between stages
//! - Each stage adds a column by building a new record; earlier columns are
//!   carried over untouched
//! - Optional columns model failed joins, never a default value

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hosting platform that produced a record
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Github,
    Gitee,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Gitee => "gitee",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Platform::Github),
            "gitee" => Ok(Platform::Gitee),
            other => Err(PipelineError::InvalidInput(format!(
                "unknown platform '{}' (expected github or gitee)",
                other
            ))),
        }
    }
}

/// Repository name in `owner/name` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName {
    full: String,
    split: usize,
}

impl RepoName {
    pub fn parse(text: &str) -> Result<Self> {
        let full = text.trim();
        let mut slashes = full.match_indices('/');
        let split = match (slashes.next(), slashes.next()) {
            (Some((idx, _)), None) => idx,
            _ => return Err(PipelineError::InvalidRepoName(text.to_string())),
        };
        if split == 0 || split + 1 == full.len() {
            return Err(PipelineError::InvalidRepoName(text.to_string()));
        }
        Ok(RepoName {
            full: full.to_string(),
            split,
        })
    }

    pub fn owner(&self) -> &str {
        &self.full[..self.split]
    }

    pub fn name(&self) -> &str {
        &self.full[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl TryFrom<String> for RepoName {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        RepoName::parse(&value)
    }
}

impl From<RepoName> for String {
    fn from(value: RepoName) -> Self {
        value.full
    }
}

/// Raw platform metrics as fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RepoMetric {
    pub id: String,
    pub platform: Platform,
    pub repo_name: RepoName,
    pub stars: u64,
    pub forks: u64,
}

/// Raw metrics plus the popularity column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PopularityRow {
    #[serde(flatten)]
    pub metric: RepoMetric,
    pub popularity_score: f64,
}

/// Reduced record retained by the cold-set filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ColdRepo {
    pub id: String,
    pub platform: Platform,
    pub repo_name: RepoName,
    pub popularity_score: f64,
}

/// Complexity score together with the fetch outcome that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComplexityScore {
    pub score: f64,
    /// False when the directory listing could not be fetched; `score` is then 0
    pub success: bool,
}

impl ComplexityScore {
    pub fn unavailable() -> Self {
        ComplexityScore {
            score: 0.0,
            success: false,
        }
    }
}

/// Cold repository joined with the externally computed score columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoreRow {
    pub id: String,
    pub platform: Platform,
    pub repo_name: RepoName,
    pub popularity_score: f64,
    pub complexity: Option<ComplexityScore>,
    pub innovation_score: Option<f64>,
    pub activity_score: Option<f64>,
}

impl ScoreRow {
    pub fn from_cold(cold: ColdRepo) -> Self {
        ScoreRow {
            id: cold.id,
            platform: cold.platform,
            repo_name: cold.repo_name,
            popularity_score: cold.popularity_score,
            complexity: None,
            innovation_score: None,
            activity_score: None,
        }
    }

    /// Raw complexity value, `None` when the join failed
    pub fn complexity_score(&self) -> Option<f64> {
        self.complexity.map(|c| c.score)
    }

    /// True when every score column was joined and the listing fetch succeeded
    pub fn is_complete(&self) -> bool {
        matches!(self.complexity, Some(c) if c.success)
            && self.innovation_score.is_some()
            && self.activity_score.is_some()
    }
}

/// Component scores on the shared 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NormalizedScores {
    pub complexity: f64,
    pub innovation: f64,
    pub popularity: f64,
}

/// Score row with its normalized columns added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NormalizedRow {
    #[serde(flatten)]
    pub row: ScoreRow,
    pub normalized: NormalizedScores,
}

/// Final, ranked record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankedRepo {
    /// 1-based position in the ranked sequence
    pub rank: usize,
    pub id: String,
    pub platform: Platform,
    pub repo_name: RepoName,
    /// Raw joined values, missing ones coerced to 0
    pub complexity_score: f64,
    pub innovation_score: f64,
    pub popularity_score: f64,
    pub activity_score: f64,
    /// Same corpus on the 0-100 scale
    pub normalized: NormalizedScores,
    /// False when the complexity join failed or its listing fetch failed
    pub complexity_available: bool,
    pub total_score: f64,
}
