//! Read-only views over a ranked corpus
//!
//! Global invariants enforced:
//! - No scoring happens here; every view slices or reorders existing rows
//! - Pages are cut from the already sorted sequence, never re-sorted
//! - Deterministic output ordering

use crate::error::PipelineError;
use crate::metric::RankedRepo;
use serde::Serialize;
use std::str::FromStr;

/// Single score dimension a slice can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDimension {
    Total,
    Complexity,
    Innovation,
    Popularity,
    Activity,
}

impl ScoreDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreDimension::Total => "total",
            ScoreDimension::Complexity => "complexity",
            ScoreDimension::Innovation => "innovation",
            ScoreDimension::Popularity => "popularity",
            ScoreDimension::Activity => "activity",
        }
    }

    /// Raw value of this dimension; min-max scaling keeps the same order
    pub fn value(&self, repo: &RankedRepo) -> f64 {
        match self {
            ScoreDimension::Total => repo.total_score,
            ScoreDimension::Complexity => repo.complexity_score,
            ScoreDimension::Innovation => repo.innovation_score,
            ScoreDimension::Popularity => repo.popularity_score,
            ScoreDimension::Activity => repo.activity_score,
        }
    }
}

impl FromStr for ScoreDimension {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "total" | "total_score" | "weighted_score" => Ok(ScoreDimension::Total),
            "complexity" | "complexity_score" => Ok(ScoreDimension::Complexity),
            "innovation" | "innovation_score" => Ok(ScoreDimension::Innovation),
            "popularity" | "popularity_score" => Ok(ScoreDimension::Popularity),
            "activity" | "activity_score" => Ok(ScoreDimension::Activity),
            other => Err(PipelineError::InvalidInput(format!(
                "unknown score dimension '{}' (expected total, complexity, innovation, popularity or activity)",
                other
            ))),
        }
    }
}

/// Fully scored and sorted corpus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCorpus {
    /// `total_score` or `weighted_score`, depending on the policy
    pub score_column: String,
    pub repos: Vec<RankedRepo>,
}

impl RankedCorpus {
    pub fn new(score_column: impl Into<String>, repos: Vec<RankedRepo>) -> Self {
        RankedCorpus {
            score_column: score_column.into(),
            repos,
        }
    }

    /// The full ranked sequence
    pub fn ranked(&self) -> &[RankedRepo] {
        &self.repos
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// First `n` rows of the ranking
    pub fn top(&self, n: usize) -> &[RankedRepo] {
        &self.repos[..n.min(self.repos.len())]
    }

    /// Top `k` rows by one dimension, descending, ties by repo_name
    pub fn top_k_by(&self, dimension: ScoreDimension, k: usize) -> Vec<&RankedRepo> {
        if dimension == ScoreDimension::Total {
            return self.top(k).iter().collect();
        }
        let mut rows: Vec<&RankedRepo> = self.repos.iter().collect();
        rows.sort_by(|a, b| {
            dimension
                .value(b)
                .total_cmp(&dimension.value(a))
                .then_with(|| a.repo_name.cmp(&b.repo_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        rows.truncate(k);
        rows
    }

    /// Look up one repository; `None` is the not-found result
    pub fn find(&self, repo_name: &str) -> Option<&RankedRepo> {
        self.repos
            .iter()
            .find(|r| r.repo_name.as_str().eq_ignore_ascii_case(repo_name))
    }

    /// Split the first `top` rows into pages of `page_size`
    ///
    /// A zero page size yields no pages.
    pub fn pages(&self, top: usize, page_size: usize) -> Vec<&[RankedRepo]> {
        if page_size == 0 {
            return Vec::new();
        }
        self.top(top).chunks(page_size).collect()
    }

    /// One 1-based page, `None` when out of range
    pub fn page(&self, top: usize, page_size: usize, number: usize) -> Option<&[RankedRepo]> {
        number
            .checked_sub(1)
            .and_then(|i| self.pages(top, page_size).get(i).copied())
    }
}

/// Render rows as a fixed-width table of 0-100 component scores
pub fn render_text(repos: &[&RankedRepo], score_column: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<6} {:<10} {:<7} {:<32} {:<10} {:<10} {:<10} {:<10}\n",
        "RANK",
        truncate_or_pad(&score_column.to_ascii_uppercase(), 10),
        "PLAT",
        "REPO",
        "CPLX",
        "INNOV",
        "POP",
        "ACTIVITY"
    ));

    for repo in repos {
        let marker = if repo.complexity_available { "" } else { "*" };
        let cplx = format!("{:.2}{}", repo.normalized.complexity, marker);
        output.push_str(&format!(
            "{:<6} {:<10.2} {:<7} {:<32} {:<10} {:<10.2} {:<10.2} {:<10.2}\n",
            repo.rank,
            repo.total_score,
            repo.platform.as_str(),
            truncate_or_pad(repo.repo_name.as_str(), 32),
            cplx,
            repo.normalized.innovation,
            repo.normalized.popularity,
            repo.activity_score,
        ));
    }

    if repos.iter().any(|r| !r.complexity_available) {
        output.push_str("* complexity unavailable (listing fetch failed or not joined)\n");
    }
    output
}

/// Render rows as JSON output
pub fn render_json(repos: &[&RankedRepo]) -> String {
    serde_json::to_string_pretty(repos).unwrap_or_else(|_| "[]".to_string())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{NormalizedScores, Platform, RepoName};
    use crate::ranking::sort_ranked;

    fn repo(name: &str, total: f64, complexity: f64, activity: f64) -> RankedRepo {
        RankedRepo {
            rank: 0,
            id: name.to_string(),
            platform: Platform::Github,
            repo_name: RepoName::parse(&format!("o/{}", name)).unwrap(),
            complexity_score: complexity,
            innovation_score: 10.0,
            popularity_score: 5.0,
            activity_score: activity,
            normalized: NormalizedScores {
                complexity: complexity / 2.0,
                innovation: 100.0,
                popularity: 50.0,
            },
            complexity_available: true,
            total_score: total,
        }
    }

    fn corpus() -> RankedCorpus {
        let repos = sort_ranked(vec![
            repo("a", 30.0, 5.0, 1.0),
            repo("b", 20.0, 90.0, 7.0),
            repo("c", 10.0, 90.0, 3.0),
            repo("d", 40.0, 1.0, 0.0),
            repo("e", 25.0, 50.0, 2.0),
        ]);
        RankedCorpus::new("weighted_score", repos)
    }

    #[test]
    fn test_top_k_by_dimension_with_name_ties() {
        let corpus = corpus();
        let names: Vec<&str> = corpus
            .top_k_by(ScoreDimension::Complexity, 3)
            .iter()
            .map(|r| r.repo_name.name())
            .collect();
        assert_eq!(names, vec!["b", "c", "e"]);

        let total: Vec<&str> = corpus
            .top_k_by(ScoreDimension::Total, 2)
            .iter()
            .map(|r| r.repo_name.name())
            .collect();
        assert_eq!(total, vec!["d", "a"]);
    }

    #[test]
    fn test_top_k_larger_than_corpus() {
        assert_eq!(corpus().top_k_by(ScoreDimension::Activity, 50).len(), 5);
    }

    #[test]
    fn test_find_and_not_found() {
        let corpus = corpus();
        assert_eq!(corpus.find("o/c").map(|r| r.rank), Some(5));
        assert!(corpus.find("o/zzz").is_none());
    }

    #[test]
    fn test_pages_are_slices_of_ranking() {
        let corpus = corpus();
        let pages = corpus.pages(4, 3);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 3);
        assert_eq!(pages[1].len(), 1);
        assert_eq!(pages[1][0].rank, 4);
        assert_eq!(corpus.page(4, 3, 2).map(|p| p.len()), Some(1));
        assert!(corpus.page(4, 3, 3).is_none());
        assert!(corpus.page(4, 3, 0).is_none());
        assert!(corpus.pages(4, 0).is_empty());
    }

    #[test]
    fn test_dimension_parse() {
        assert_eq!(
            "Complexity_Score".parse::<ScoreDimension>().unwrap(),
            ScoreDimension::Complexity
        );
        assert_eq!(
            "weighted_score".parse::<ScoreDimension>().unwrap(),
            ScoreDimension::Total
        );
        assert!("stars".parse::<ScoreDimension>().is_err());
    }

    #[test]
    fn test_render_text_marks_unavailable_complexity() {
        let mut r = repo("x", 1.0, 0.0, 0.0);
        r.complexity_available = false;
        let text = render_text(&[&r], "total_score");
        assert!(text.starts_with("RANK"));
        assert!(text.contains("0.00*"));
        assert!(text.contains("100.00"), "normalized innovation is shown");
        assert!(text.contains("complexity unavailable"));
    }

    #[test]
    fn test_render_json_is_array() {
        let corpus = corpus();
        let rows: Vec<&RankedRepo> = corpus.ranked().iter().collect();
        let value: serde_json::Value = serde_json::from_str(&render_json(&rows)).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(5));
        assert_eq!(value[0]["repo_name"], "o/d");
        assert_eq!(value[0]["complexity_score"], 1.0);
        assert_eq!(value[0]["normalized"]["complexity"], 0.5);
    }
}
