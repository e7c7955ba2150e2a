//! Left joins of the cold set against externally computed score tables
//!
//! Global invariants enforced:
//! - Every left row appears exactly once in the output, in input order
//! - A missing match leaves the column empty (`None`), never a default
//! - Duplicate keys in a side table never duplicate left rows

use crate::complexity::ComplexityRow;
use crate::error::Result;
use crate::metric::{ColdRepo, ComplexityScore, RepoName, ScoreRow};
use crate::table::Table;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;

/// Column used to match side-table rows to repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKey {
    Id,
    RepoName,
}

impl JoinKey {
    pub fn column(&self) -> &'static str {
        match self {
            JoinKey::Id => "id",
            JoinKey::RepoName => "repo_name",
        }
    }

    /// `id` when the table has one, `repo_name` otherwise
    pub fn detect(table: &Table) -> Self {
        if table.has_column("id") {
            JoinKey::Id
        } else {
            JoinKey::RepoName
        }
    }

    fn key_of<'a>(&self, repo: &'a ColdRepo) -> &'a str {
        match self {
            JoinKey::Id => &repo.id,
            JoinKey::RepoName => repo.repo_name.as_str(),
        }
    }
}

/// Keyed values from one side table
#[derive(Debug, Clone, PartialEq)]
pub struct SideTable<V> {
    pub key: JoinKey,
    values: HashMap<String, V>,
    /// Rows ignored because their key was already present
    pub duplicates: usize,
}

impl<V: Clone> SideTable<V> {
    pub fn new(key: JoinKey) -> Self {
        SideTable {
            key,
            values: HashMap::new(),
            duplicates: 0,
        }
    }

    /// Insert a value; the first row for a key wins
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        if self.values.contains_key(&key) {
            self.duplicates += 1;
            warn!(
                "duplicate {} '{}' in side table, keeping first row",
                self.key.column(),
                key
            );
            return false;
        }
        self.values.insert(key, value);
        true
    }

    pub fn lookup(&self, repo: &ColdRepo) -> Option<V> {
        self.values.get(self.key.key_of(repo)).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build from a CSV table, parsing each row with `parse`
    ///
    /// Rows without a key are skipped with a warning.
    pub fn from_table<F>(table: &Table, value_columns: &[&str], parse: F) -> Result<Self>
    where
        F: Fn(&crate::table::TableRow<'_>) -> V,
    {
        let key = JoinKey::detect(table);
        let mut required = vec![key.column()];
        required.extend_from_slice(value_columns);
        table.require(&required)?;

        let mut side = SideTable::new(key);
        for row in table.rows() {
            match row.get(key.column()) {
                Some(k) => {
                    side.insert(k, parse(&row));
                }
                None => warn!(
                    "{} row {}: empty {}, skipping",
                    table.path().display(),
                    row.number,
                    key.column()
                ),
            }
        }
        Ok(side)
    }
}

/// Complexity table: `complexity_score` plus an optional `success` flag
///
/// Tables written before the flag existed count as successful.
pub fn complexity_table(table: &Table) -> Result<SideTable<ComplexityScore>> {
    SideTable::from_table(table, &["complexity_score"], |row| {
        match row.number("complexity_score") {
            Some(score) if score >= 0.0 => ComplexityScore {
                score,
                success: row.flag("success").unwrap_or(true),
            },
            _ => ComplexityScore::unavailable(),
        }
    })
}

/// Innovation table; also accepts the legacy `inovation_score` header
pub fn innovation_table(table: &Table) -> Result<SideTable<Option<f64>>> {
    let column = if !table.has_column("innovation_score") && table.has_column("inovation_score")
    {
        "inovation_score"
    } else {
        "innovation_score"
    };
    SideTable::from_table(table, &[column], |row| row.number(column))
}

/// Activity table: `activity_score`
pub fn activity_table(table: &Table) -> Result<SideTable<Option<f64>>> {
    SideTable::from_table(table, &["activity_score"], |row| {
        row.number("activity_score")
    })
}

/// Complexity side table built from scored listings
///
/// Keyed by `id` only when every listing carries one.
pub fn complexity_from_rows(rows: &[ComplexityRow]) -> SideTable<ComplexityScore> {
    let key = if rows.iter().all(|r| r.id.is_some()) {
        JoinKey::Id
    } else {
        JoinKey::RepoName
    };
    let mut side = SideTable::new(key);
    for row in rows {
        let k = match (&row.id, key) {
            (Some(id), JoinKey::Id) => id.clone(),
            _ => row.repo_name.to_string(),
        };
        side.insert(k, row.complexity);
    }
    side
}

/// Activity side table built from scored series
pub fn activity_from_rows(rows: &[(RepoName, f64)]) -> SideTable<Option<f64>> {
    let mut side = SideTable::new(JoinKey::RepoName);
    for (name, activity) in rows {
        side.insert(name.to_string(), Some(*activity));
    }
    side
}

/// Side tables available for a merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideTables {
    pub complexity: Option<SideTable<ComplexityScore>>,
    pub innovation: Option<SideTable<Option<f64>>>,
    pub activity: Option<SideTable<Option<f64>>>,
}

/// Join counts for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MergeStats {
    pub rows: usize,
    pub unmatched_complexity: usize,
    pub unmatched_innovation: usize,
    pub unmatched_activity: usize,
    /// Matched complexity rows whose listing fetch had failed
    pub failed_listings: usize,
}

/// Left-join the cold set against every available side table
pub fn merge_scores(cold: &[ColdRepo], sides: &SideTables) -> (Vec<ScoreRow>, MergeStats) {
    let mut stats = MergeStats {
        rows: cold.len(),
        ..MergeStats::default()
    };
    let rows: Vec<ScoreRow> = cold
        .iter()
        .map(|repo| {
            let complexity = sides.complexity.as_ref().and_then(|t| t.lookup(repo));
            let innovation = sides.innovation.as_ref().and_then(|t| t.lookup(repo));
            let activity = sides.activity.as_ref().and_then(|t| t.lookup(repo));

            match complexity {
                None => stats.unmatched_complexity += 1,
                Some(c) if !c.success => stats.failed_listings += 1,
                Some(_) => {}
            }
            if innovation.is_none() {
                stats.unmatched_innovation += 1;
            }
            if activity.is_none() {
                stats.unmatched_activity += 1;
            }

            let mut row = ScoreRow::from_cold(repo.clone());
            row.complexity = complexity;
            row.innovation_score = innovation.flatten();
            row.activity_score = activity.flatten();
            row
        })
        .collect();

    info!(
        "merged {} rows (unmatched: complexity {}, innovation {}, activity {}; failed listings {})",
        stats.rows,
        stats.unmatched_complexity,
        stats.unmatched_innovation,
        stats.unmatched_activity,
        stats.failed_listings
    );
    (rows, stats)
}

/// Keep only rows with every score present and a successful listing
pub fn complete_only(rows: &[ScoreRow]) -> Vec<ScoreRow> {
    rows.iter().filter(|r| r.is_complete()).cloned().collect()
}
