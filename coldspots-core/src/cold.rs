//! Cold-set selection
//!
//! A repository is cold when its popularity score is strictly below the
//! corpus median AND its star count does not exceed the star ceiling. The
//! star guard catches repositories whose log-dampened score saturates.

use crate::metric::{ColdRepo, PopularityRow};
use log::{debug, info};

/// Default star ceiling for cold repositories
pub const DEFAULT_STAR_CEILING: u64 = 150;

/// Result of partitioning a scored corpus
#[derive(Debug, Clone, PartialEq)]
pub struct ColdSet {
    /// Median popularity score, `None` for an empty corpus
    pub median_score: Option<f64>,
    /// Selected repositories, in input order
    pub repos: Vec<ColdRepo>,
}

/// Standard statistical median; averages the two middle values for even sizes
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Check the cold predicate for a single row against a known median
pub fn is_cold(row: &PopularityRow, median_score: f64, star_ceiling: u64) -> bool {
    row.popularity_score < median_score && row.metric.stars <= star_ceiling
}

/// Select the cold subset of a fully scored corpus
///
/// The input is not modified; the output keeps only
/// `{id, platform, repo_name, popularity_score}`.
pub fn select_cold(rows: &[PopularityRow], star_ceiling: u64) -> ColdSet {
    let scores: Vec<f64> = rows.iter().map(|r| r.popularity_score).collect();
    let Some(median_score) = median(&scores) else {
        debug!("empty corpus, no repositories pass the cold filter");
        return ColdSet {
            median_score: None,
            repos: Vec::new(),
        };
    };

    let repos: Vec<ColdRepo> = rows
        .iter()
        .filter(|row| is_cold(row, median_score, star_ceiling))
        .map(|row| ColdRepo {
            id: row.metric.id.clone(),
            platform: row.metric.platform,
            repo_name: row.metric.repo_name.clone(),
            popularity_score: row.popularity_score,
        })
        .collect();

    info!(
        "cold filter: {} of {} repositories below median {:.4} with <= {} stars",
        repos.len(),
        rows.len(),
        median_score,
        star_ceiling
    );

    ColdSet {
        median_score: Some(median_score),
        repos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Platform, RepoMetric, RepoName};

    fn row(id: &str, stars: u64, score: f64) -> PopularityRow {
        PopularityRow {
            metric: RepoMetric {
                id: id.to_string(),
                platform: Platform::Github,
                repo_name: RepoName::parse(&format!("owner/{}", id)).unwrap(),
                stars,
                forks: 0,
            },
            popularity_score: score,
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[7.0]), Some(7.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_both_conditions_required() {
        let rows = vec![
            row("low", 10, 1.0),
            row("low-but-starry", 500, 1.5),
            row("mid", 20, 2.0),
            row("high", 30, 3.0),
            row("higher", 40, 4.0),
        ];
        let cold = select_cold(&rows, DEFAULT_STAR_CEILING);
        assert_eq!(cold.median_score, Some(2.0));
        let ids: Vec<&str> = cold.repos.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["low"]);
    }

    #[test]
    fn test_star_ceiling_is_inclusive() {
        let rows = vec![row("a", 150, 1.0), row("b", 151, 1.0), row("c", 0, 9.0)];
        let cold = select_cold(&rows, 150);
        let ids: Vec<&str> = cold.repos.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_single_row_corpus_selects_nothing() {
        let cold = select_cold(&[row("only", 1, 0.5)], 150);
        assert_eq!(cold.median_score, Some(0.5));
        assert!(cold.repos.is_empty(), "score is never strictly below itself");
    }

    #[test]
    fn test_empty_corpus_is_not_an_error() {
        let cold = select_cold(&[], 150);
        assert_eq!(cold.median_score, None);
        assert!(cold.repos.is_empty());
    }
}
