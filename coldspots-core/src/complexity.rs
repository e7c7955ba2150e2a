//! Complexity score from file-extension histograms
//!
//! Each extension falls into exactly one tier; the score is the sum of
//! `count * tier weight`. Unknown extensions are never weighted zero.

use crate::listing::{ExtensionHistogram, RepoListing};
use crate::metric::{ComplexityScore, Platform, RepoName};
use log::{debug, info, warn};

/// Extension tier classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionTier {
    Source,
    Config,
    Other,
}

const SOURCE_EXTENSIONS: &[&str] = &[".py", ".java", ".cpp", ".c"];
const CONFIG_EXTENSIONS: &[&str] = &[".properties", ".yaml", ".xml"];

impl ExtensionTier {
    pub fn classify(ext: &str) -> Self {
        if SOURCE_EXTENSIONS.contains(&ext) {
            ExtensionTier::Source
        } else if CONFIG_EXTENSIONS.contains(&ext) {
            ExtensionTier::Config
        } else {
            ExtensionTier::Other
        }
    }

    pub fn weight(&self) -> u64 {
        match self {
            ExtensionTier::Source => 3,
            ExtensionTier::Config => 1,
            ExtensionTier::Other => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionTier::Source => "source",
            ExtensionTier::Config => "config",
            ExtensionTier::Other => "other",
        }
    }
}

/// Weighted sum over a histogram
pub fn complexity_score(histogram: &ExtensionHistogram) -> u64 {
    histogram
        .iter()
        .map(|(ext, count)| count * ExtensionTier::classify(ext).weight())
        .sum()
}

/// Score one repository listing
///
/// A listing whose root fetch failed scores 0 with `success = false`. A
/// fetched listing with no visible files scores 0 with `success = true`.
pub fn score_listing(listing: &RepoListing) -> ComplexityScore {
    if !listing.fetched {
        warn!(
            "listing for {} was not fetched, complexity unavailable",
            listing.repo_name
        );
        return ComplexityScore::unavailable();
    }
    let histogram = ExtensionHistogram::from_listing(listing);
    let score = complexity_score(&histogram);
    debug!(
        "complexity for {}: {} over {} extensions",
        listing.repo_name,
        score,
        histogram.iter().count()
    );
    ComplexityScore {
        score: score as f64,
        success: true,
    }
}

/// Complexity stage output for one repository
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityRow {
    pub id: Option<String>,
    pub platform: Platform,
    pub repo_name: RepoName,
    pub complexity: ComplexityScore,
}

/// Score every listing, keeping input order
pub fn score_listings(listings: &[RepoListing]) -> Vec<ComplexityRow> {
    let rows: Vec<ComplexityRow> = listings
        .iter()
        .map(|listing| ComplexityRow {
            id: listing.id.clone(),
            platform: listing.platform,
            repo_name: listing.repo_name.clone(),
            complexity: score_listing(listing),
        })
        .collect();
    let failed = rows.iter().filter(|r| !r.complexity.success).count();
    info!(
        "scored complexity for {} listings ({} unavailable)",
        rows.len(),
        failed
    );
    rows
}
