//! Invariant Tests
//!
//! These tests explicitly validate invariants that must always hold.
//! Run in CI to prevent regressions.

use coldspots_core::complexity::score_listings;
use coldspots_core::listing::load_listings;
use coldspots_core::merge::{self, SideTables};
use coldspots_core::metric::{ColdRepo, Platform, RepoName};
use coldspots_core::table::{Encoding, Table};
use coldspots_core::{io, run_pipeline, ResolvedConfig};
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn run_to_file(dir: &TempDir, name: &str) -> Vec<u8> {
    let config = ResolvedConfig::defaults().expect("default config");
    let metrics = io::read_metrics(&fixture_path("metrics.csv"), Encoding::Utf8)
        .expect("fixture metrics should load");
    let listings = load_listings(&fixture_path("listings.json")).expect("fixture listings");
    let sides = SideTables {
        complexity: Some(merge::complexity_from_rows(&score_listings(&listings))),
        ..SideTables::default()
    };
    let output = run_pipeline(&metrics.rows, &sides, &config);
    let path = dir.path().join(name);
    io::write_ranked(
        output.corpus.ranked(),
        &output.corpus.score_column,
        &path,
        Encoding::Utf8,
    )
    .expect("ranked output should be written");
    std::fs::read(&path).expect("failed to read ranked output")
}

#[test]
fn test_identical_input_identical_bytes() {
    let dir = TempDir::new().expect("failed to create temp directory");
    let first = run_to_file(&dir, "first.csv");
    let second = run_to_file(&dir, "second.csv");
    assert_eq!(first, second, "two runs over the same input must match byte for byte");
}

#[test]
fn test_no_temp_file_left_behind() {
    let dir = TempDir::new().expect("failed to create temp directory");
    run_to_file(&dir, "ranked.csv");
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read temp dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["ranked.csv".to_string()]);
}

#[test]
fn test_raw_scores_survive_normalization() {
    let config = ResolvedConfig::defaults().expect("default config");
    let metrics = io::read_metrics(&fixture_path("metrics.csv"), Encoding::Utf8)
        .expect("fixture metrics should load");
    let scored = coldspots_core::popularity::score_corpus(&metrics.rows, &config.popularity);
    let cold = coldspots_core::cold::select_cold(&scored, config.star_ceiling);
    let (merged, _) = merge::merge_scores(&cold.repos, &SideTables::default());
    let normalized = coldspots_core::normalize::normalize_corpus(&merged);

    // Normalization adds columns; the raw popularity of every row is untouched
    for (row, original) in normalized.rows.iter().zip(&cold.repos) {
        assert_eq!(row.row.popularity_score, original.popularity_score);
        assert_eq!(row.row.id, original.id);
    }
}

#[test]
fn test_join_never_duplicates_or_drops_rows() {
    let table = Table::parse(
        std::path::Path::new("innovation.csv"),
        "id,innovation_score\n1,0.5\n1,0.9\n1,0.1\n9,0.3\n",
    )
    .expect("inline table should parse");
    let sides = SideTables {
        innovation: Some(merge::innovation_table(&table).expect("innovation table")),
        ..SideTables::default()
    };
    let cold: Vec<ColdRepo> = ["1", "2", "3"]
        .iter()
        .map(|id| ColdRepo {
            id: id.to_string(),
            platform: Platform::Github,
            repo_name: RepoName::parse(&format!("o/r{}", id)).expect("valid name"),
            popularity_score: 1.0,
        })
        .collect();

    let (rows, stats) = merge::merge_scores(&cold, &sides);
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(rows[0].innovation_score, Some(0.5), "first duplicate wins");
    assert_eq!(rows[1].innovation_score, None);
    assert_eq!(stats.unmatched_innovation, 2);
    assert_eq!(sides.innovation.as_ref().map(|t| t.duplicates), Some(2));
}

#[test]
fn test_scores_always_finite() {
    let config = ResolvedConfig::defaults().expect("default config");
    let metrics = io::read_metrics(&fixture_path("metrics.csv"), Encoding::Utf8)
        .expect("fixture metrics should load");
    let output = run_pipeline(&metrics.rows, &SideTables::default(), &config);
    for repo in output.corpus.ranked() {
        assert!(repo.total_score.is_finite());
        assert!(repo.complexity_score.is_finite());
        assert!(repo.innovation_score.is_finite());
        assert!(repo.popularity_score.is_finite());
    }
}
