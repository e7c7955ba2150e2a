//! Repository directory listings and extension histograms
//!
//! Listings come from the platform contents API and cover two levels only:
//! the root directory, and the immediate children of each direct
//! subdirectory. Nothing deeper is ever visited, so repositories that keep
//! their sources further down are undercounted. Historical complexity scores
//! depend on this, so the traversal must stay shallow.

use crate::error::{PipelineError, Result};
use crate::metric::{Platform, RepoName};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One entry returned by a contents listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListingEntry {
    File {
        name: String,
    },
    Dir {
        name: String,
        /// Contents of the subdirectory; `None` when its fetch failed
        #[serde(default)]
        entries: Option<Vec<ListingEntry>>,
    },
}

/// Contents listing fetched for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RepoListing {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub platform: Platform,
    pub repo_name: RepoName,
    /// False when the root listing could not be fetched
    pub fetched: bool,
    #[serde(default)]
    pub entries: Vec<ListingEntry>,
}

/// Mapping from lower-cased extension (with leading dot) to file count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionHistogram(BTreeMap<String, u64>);

impl ExtensionHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one file name; names without an extension are ignored
    pub fn record(&mut self, file_name: &str) {
        if let Some(ext) = extension_of(file_name) {
            *self.0.entry(ext).or_insert(0) += 1;
        }
    }

    /// Build the histogram from a listing, visiting at most two levels
    pub fn from_entries(entries: &[ListingEntry]) -> Self {
        let mut histogram = ExtensionHistogram::new();
        for entry in entries {
            match entry {
                ListingEntry::File { name } => histogram.record(name),
                ListingEntry::Dir {
                    name,
                    entries: Some(children),
                } => {
                    for child in children {
                        // Grandchild directories are not descended into
                        if let ListingEntry::File { name } = child {
                            histogram.record(name);
                        }
                    }
                    debug!("listed subdirectory {} ({} entries)", name, children.len());
                }
                ListingEntry::Dir {
                    name,
                    entries: None,
                } => {
                    warn!("subdirectory {} could not be listed, skipping", name);
                }
            }
        }
        histogram
    }

    /// Histogram of a fetched listing
    pub fn from_listing(listing: &RepoListing) -> Self {
        Self::from_entries(&listing.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, ext: &str) -> u64 {
        self.0.get(ext).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u64)> for ExtensionHistogram {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut map = BTreeMap::new();
        for (ext, count) in iter {
            *map.entry(ext.to_lowercase()).or_insert(0) += count;
        }
        ExtensionHistogram(map)
    }
}

/// Extension of a file name, lower-cased and including the leading dot
///
/// Leading dots are part of the stem (`.gitignore` has no extension); only
/// the last dot counts (`archive.tar.gz` is `.gz`). A trailing dot is an
/// extension of its own (`notes.` is `.`) and lands in the default tier.
pub fn extension_of(file_name: &str) -> Option<String> {
    let stem_start = file_name.len() - file_name.trim_start_matches('.').len();
    let rest = &file_name[stem_start..];
    let dot = rest.rfind('.')?;
    Some(rest[dot..].to_lowercase())
}

/// Load listings from a JSON array document
pub fn load_listings(path: &Path) -> Result<Vec<RepoListing>> {
    if !path.exists() {
        return Err(PipelineError::MissingSource(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let listings: Vec<RepoListing> = serde_json::from_str(&content)?;
    if listings.is_empty() {
        return Err(PipelineError::EmptySource(path.to_path_buf()));
    }
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ListingEntry {
        ListingEntry::File {
            name: name.to_string(),
        }
    }

    fn dir(name: &str, entries: Option<Vec<ListingEntry>>) -> ListingEntry {
        ListingEntry::Dir {
            name: name.to_string(),
            entries,
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("main.PY"), Some(".py".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some(".gz".to_string()));
        assert_eq!(extension_of(".gitignore"), None);
        assert_eq!(extension_of("..hidden.yaml"), Some(".yaml".to_string()));
        assert_eq!(extension_of("Makefile"), None);
        assert_eq!(extension_of("trailing."), Some(".".to_string()));
        assert_eq!(extension_of("..."), None);
    }

    #[test]
    fn test_traversal_stops_at_second_level() {
        let entries = vec![
            file("setup.py"),
            file("README.md"),
            dir(
                "src",
                Some(vec![
                    file("app.py"),
                    file("config.yaml"),
                    dir("deep", Some(vec![file("never_counted.py")])),
                ]),
            ),
            dir("broken", None),
        ];
        let histogram = ExtensionHistogram::from_entries(&entries);
        assert_eq!(histogram.get(".py"), 2);
        assert_eq!(histogram.get(".md"), 1);
        assert_eq!(histogram.get(".yaml"), 1);
        assert_eq!(histogram.iter().count(), 3);
    }

    #[test]
    fn test_listing_json_shape() {
        let json = r#"[{
            "repo_name": "octo/widget",
            "platform": "gitee",
            "fetched": true,
            "entries": [
                {"type": "file", "name": "Main.java"},
                {"type": "dir", "name": "conf", "entries": [{"type": "file", "name": "app.properties"}]},
                {"type": "dir", "name": "lost", "entries": null}
            ]
        }]"#;
        let listings: Vec<RepoListing> = serde_json::from_str(json).unwrap();
        assert_eq!(listings[0].platform, Platform::Gitee);
        assert!(listings[0].id.is_none());
        let histogram = ExtensionHistogram::from_entries(&listings[0].entries);
        assert_eq!(histogram.get(".java"), 1);
        assert_eq!(histogram.get(".properties"), 1);
    }

    #[test]
    fn test_load_listings_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            load_listings(&missing),
            Err(PipelineError::MissingSource(_))
        ));
        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(matches!(
            load_listings(&empty),
            Err(PipelineError::EmptySource(_))
        ));
    }
}
