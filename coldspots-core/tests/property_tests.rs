//! Property tests for the scoring stages

use coldspots_core::cold::{median, select_cold, DEFAULT_STAR_CEILING};
use coldspots_core::complexity::complexity_score;
use coldspots_core::listing::ExtensionHistogram;
use coldspots_core::metric::{
    ComplexityScore, NormalizedRow, NormalizedScores, Platform, PopularityRow, RepoMetric,
    RepoName, ScoreRow,
};
use coldspots_core::normalize::normalize_column;
use coldspots_core::popularity::popularity_score;
use coldspots_core::ranking::{rank, RankingConfig, RankingPolicy, ScoreBasis};
use proptest::prelude::*;

fn popularity_row(i: usize, stars: u64, score: f64) -> PopularityRow {
    PopularityRow {
        metric: RepoMetric {
            id: i.to_string(),
            platform: Platform::Github,
            repo_name: RepoName::parse(&format!("owner/repo-{}", i)).unwrap(),
            stars,
            forks: 0,
        },
        popularity_score: score,
    }
}

fn normalized_row(i: usize, name: &str, c: f64, inn: f64, p: f64, a: f64) -> NormalizedRow {
    NormalizedRow {
        row: ScoreRow {
            id: i.to_string(),
            platform: Platform::Gitee,
            repo_name: RepoName::parse(&format!("o/{}", name)).unwrap(),
            popularity_score: p,
            complexity: Some(ComplexityScore {
                score: c,
                success: true,
            }),
            innovation_score: Some(inn),
            activity_score: Some(a),
        },
        normalized: NormalizedScores {
            complexity: c,
            innovation: inn,
            popularity: p,
        },
    }
}

fn reference_median(values: &[f64]) -> f64 {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

fn policy_strategy() -> impl Strategy<Value = RankingPolicy> {
    prop_oneof![
        Just(RankingPolicy::direct_subtraction(1.0)),
        Just(RankingPolicy::direct_subtraction(10.0)),
        Just(RankingPolicy::activity_penalizing()),
    ]
}

proptest! {
    #[test]
    fn prop_popularity_non_negative(stars in 0i64..1_000_000, forks in 0i64..1_000_000) {
        let score = popularity_score(stars, forks).unwrap();
        prop_assert!(score >= 0.0);
        prop_assert!(score.is_finite());
    }

    #[test]
    fn prop_popularity_non_decreasing_in_stars(stars in 0i64..25, forks in 0i64..25) {
        // Regime where the size penalty stays small relative to the log terms
        let lower = popularity_score(stars, forks).unwrap();
        let higher = popularity_score(stars + 1, forks).unwrap();
        prop_assert!(higher >= lower, "{} stars: {} > {}", stars, lower, higher);
    }

    #[test]
    fn prop_negative_counts_rejected(stars in -1000i64..0, forks in 0i64..1000) {
        prop_assert!(popularity_score(stars, forks).is_err());
        prop_assert!(popularity_score(forks, stars).is_err());
    }

    #[test]
    fn prop_median_matches_reference(values in prop::collection::vec(-1000.0f64..1000.0, 1..60)) {
        prop_assert_eq!(median(&values), Some(reference_median(&values)));
    }

    #[test]
    fn prop_cold_set_partition(
        rows in prop::collection::vec((0u64..400, 0.0f64..10.0), 0..50)
    ) {
        let corpus: Vec<PopularityRow> = rows
            .iter()
            .enumerate()
            .map(|(i, (stars, score))| popularity_row(i, *stars, *score))
            .collect();
        let cold = select_cold(&corpus, DEFAULT_STAR_CEILING);

        match cold.median_score {
            None => prop_assert!(cold.repos.is_empty() && corpus.is_empty()),
            Some(m) => {
                let selected: Vec<&str> = cold.repos.iter().map(|r| r.id.as_str()).collect();
                for row in &corpus {
                    let qualifies =
                        row.popularity_score < m && row.metric.stars <= DEFAULT_STAR_CEILING;
                    prop_assert_eq!(qualifies, selected.contains(&row.metric.id.as_str()));
                }
            }
        }
    }

    #[test]
    fn prop_complexity_order_independent(
        pairs in prop::collection::vec(
            (
                prop::sample::select(vec![".py", ".java", ".xml", ".yaml", ".png", ".md", ".c", ".rs"]),
                0u64..100,
            ),
            0..20
        )
    ) {
        let forward: ExtensionHistogram =
            pairs.iter().map(|(e, c)| (e.to_string(), *c)).collect();
        let backward: ExtensionHistogram =
            pairs.iter().rev().map(|(e, c)| (e.to_string(), *c)).collect();
        prop_assert_eq!(complexity_score(&forward), complexity_score(&backward));
    }

    #[test]
    fn prop_normalized_spans_full_range(values in prop::collection::vec(0.0f64..1e6, 1..40)) {
        let normalized = normalize_column(&values.iter().copied().map(Some).collect::<Vec<_>>());
        let lo = normalized.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let all_equal = values.iter().all(|v| *v == values[0]);
        if all_equal {
            prop_assert!(normalized.iter().all(|v| *v == 0.0));
        } else {
            prop_assert_eq!(lo, 0.0);
            prop_assert_eq!(hi, 100.0);
        }
        prop_assert!(normalized.iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn prop_rank_sorted_and_order_independent(
        scores in prop::collection::vec(
            (0.0f64..100.0, 0.0f64..100.0, 0.0f64..100.0, 0.0f64..5000.0),
            0..40
        ),
        policy in policy_strategy(),
    ) {
        let rows: Vec<NormalizedRow> = scores
            .iter()
            .enumerate()
            // Names repeat so ties on score fall back to repo_name and then id
            .map(|(i, (c, inn, p, a))| normalized_row(i, &format!("r{}", i % 7), *c, *inn, *p, *a))
            .collect();
        let config = RankingConfig { policy, basis: ScoreBasis::Normalized };

        let ranked = rank(&rows, &config);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].total_score >= pair[1].total_score);
        }

        let mut reversed = rows.clone();
        reversed.reverse();
        prop_assert_eq!(rank(&reversed, &config), ranked);
    }
}
