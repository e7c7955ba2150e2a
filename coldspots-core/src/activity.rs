//! Recent activity aggregation
//!
//! Activity series are keyed by period. Monthly keys (`YYYY-MM`) sort
//! chronologically as strings, so the most recent periods are the last keys.

use crate::error::{PipelineError, Result};
use crate::metric::RepoName;
use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Number of trailing periods summed by default
pub const DEFAULT_ACTIVITY_WINDOW: usize = 4;

/// True for `YYYY-MM` period keys
fn is_monthly_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() == 7
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..].iter().all(u8::is_ascii_digit)
}

/// Sum the values of the last `window` monthly periods
///
/// Yearly, quarterly and raw keys are ignored. Non-finite values count as 0.
pub fn recent_activity(series: &BTreeMap<String, f64>, window: usize) -> f64 {
    let monthly: Vec<f64> = series
        .iter()
        .filter(|(key, _)| is_monthly_key(key))
        .map(|(_, value)| if value.is_finite() { *value } else { 0.0 })
        .collect();
    let start = monthly.len().saturating_sub(window);
    monthly[start..].iter().sum()
}

/// Extract a numeric series from an activity JSON object
///
/// Non-numeric values are skipped.
pub fn series_from_json(value: &Value) -> BTreeMap<String, f64> {
    let mut series = BTreeMap::new();
    if let Value::Object(map) = value {
        for (key, v) in map {
            if let Some(n) = v.as_f64() {
                series.insert(key.clone(), n);
            }
        }
    }
    series
}

/// Score every series of an activity document
///
/// The document is a JSON object mapping `owner/name` to a series object.
/// Entries with a malformed repository name are skipped with a warning.
pub fn score_document(document: &Value, window: usize) -> Result<Vec<(RepoName, f64)>> {
    let Value::Object(map) = document else {
        return Err(PipelineError::InvalidInput(
            "activity document must be a JSON object keyed by repo_name".to_string(),
        ));
    };
    let mut rows = Vec::with_capacity(map.len());
    for (name, series) in map {
        match RepoName::parse(name) {
            Ok(repo_name) => {
                let activity = recent_activity(&series_from_json(series), window);
                rows.push((repo_name, activity));
            }
            Err(e) => warn!("skipping activity series: {}", e),
        }
    }
    info!(
        "scored activity for {} repositories (window {})",
        rows.len(),
        window
    );
    Ok(rows)
}

/// Load and score an activity document from disk
pub fn load_activity(path: &Path, window: usize) -> Result<Vec<(RepoName, f64)>> {
    if !path.exists() {
        return Err(PipelineError::MissingSource(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)?;
    if document.as_object().is_some_and(|m| m.is_empty()) {
        return Err(PipelineError::EmptySource(path.to_path_buf()));
    }
    score_document(&document, window)
}
