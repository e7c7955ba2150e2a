//! Stage-level CSV readers and writers
//!
//! Each pipeline stage is a batch job that reads one table and writes
//! another. This module owns the column contract of every table. Rows that
//! cannot be read are rejected with a reason instead of aborting the batch.

use crate::complexity::ComplexityRow;
use crate::error::{PipelineError, Result, RowRejection};
use crate::metric::{
    ColdRepo, ComplexityScore, NormalizedRow, NormalizedScores, Platform, PopularityRow,
    RankedRepo, RepoMetric, RepoName, ScoreRow,
};
use crate::table::{opt_cell, Encoding, Table, TableRow, TableWriter};
use log::warn;
use std::path::Path;

pub const COL_ID: &str = "id";
pub const COL_PLATFORM: &str = "platform";
pub const COL_REPO_NAME: &str = "repo_name";
pub const COL_STARS: &str = "stargazers_count";
pub const COL_FORKS: &str = "forks_count";
pub const COL_POPULARITY: &str = "popularity_score";
pub const COL_COMPLEXITY: &str = "complexity_score";
pub const COL_SUCCESS: &str = "success";
pub const COL_COMPLEXITY_SUCCESS: &str = "complexity_success";
pub const COL_INNOVATION: &str = "innovation_score";
pub const COL_ACTIVITY: &str = "activity_score";
pub const COL_RANK: &str = "rank";
pub const COL_COMPLEXITY_AVAILABLE: &str = "complexity_available";
pub const COL_NORM_COMPLEXITY: &str = "normalized_complexity";
pub const COL_NORM_INNOVATION: &str = "normalized_innovation";
pub const COL_NORM_POPULARITY: &str = "normalized_popularity";

/// Rows read from a table plus the rows that had to be rejected
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub rejections: Vec<RowRejection>,
}

impl<T> Loaded<T> {
    fn collect(
        table: &Table,
        parse: impl Fn(&TableRow<'_>) -> std::result::Result<T, String>,
    ) -> Self {
        let mut rows = Vec::with_capacity(table.len());
        let mut rejections = Vec::new();
        for row in table.rows() {
            match parse(&row) {
                Ok(value) => rows.push(value),
                Err(reason) => {
                    let id = row.get(COL_ID).unwrap_or("").to_string();
                    warn!(
                        "{} row {} (id '{}') rejected: {}",
                        table.path().display(),
                        row.number,
                        id,
                        reason
                    );
                    rejections.push(RowRejection::new(row.number, id, reason));
                }
            }
        }
        Loaded { rows, rejections }
    }
}

fn identity(row: &TableRow<'_>) -> std::result::Result<(String, Platform, RepoName), String> {
    let id = row
        .get(COL_ID)
        .ok_or_else(|| format!("empty {}", COL_ID))?
        .to_string();
    let platform = match row.get(COL_PLATFORM) {
        Some(text) => text.parse::<Platform>().map_err(|e| e.to_string())?,
        None => Platform::default(),
    };
    let name = row
        .get(COL_REPO_NAME)
        .ok_or_else(|| format!("empty {}", COL_REPO_NAME))?;
    let repo_name = RepoName::parse(name).map_err(|e| e.to_string())?;
    Ok((id, platform, repo_name))
}

/// Parse a non-negative count written as an integer or an integral float
fn count(row: &TableRow<'_>, column: &str) -> std::result::Result<u64, String> {
    let text = row.get(column).ok_or_else(|| format!("empty {}", column))?;
    let value = match text.parse::<i64>() {
        Ok(v) => v,
        Err(_) => match text.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(format!("{} '{}' is not an integer", column, text)),
        },
    };
    u64::try_from(value).map_err(|_| format!("{} must be non-negative (got {})", column, value))
}

fn score(row: &TableRow<'_>, column: &str) -> std::result::Result<f64, String> {
    row.number(column)
        .ok_or_else(|| format!("{} is missing or not a finite number", column))
}

/// Read raw platform metrics (popularity stage input)
pub fn read_metrics(path: &Path, encoding: Encoding) -> Result<Loaded<RepoMetric>> {
    let table = Table::read(path, encoding)?;
    table.require(&[COL_ID, COL_REPO_NAME, COL_STARS, COL_FORKS])?;
    Ok(Loaded::collect(&table, |row| {
        let (id, platform, repo_name) = identity(row)?;
        Ok(RepoMetric {
            id,
            platform,
            repo_name,
            stars: count(row, COL_STARS)?,
            forks: count(row, COL_FORKS)?,
        })
    }))
}

/// Write popularity stage output
pub fn write_popularity(rows: &[PopularityRow], path: &Path, encoding: Encoding) -> Result<()> {
    let mut writer = TableWriter::new([
        COL_ID,
        COL_PLATFORM,
        COL_REPO_NAME,
        COL_STARS,
        COL_FORKS,
        COL_POPULARITY,
    ]);
    for row in rows {
        writer.push(vec![
            row.metric.id.clone(),
            row.metric.platform.to_string(),
            row.metric.repo_name.to_string(),
            row.metric.stars.to_string(),
            row.metric.forks.to_string(),
            row.popularity_score.to_string(),
        ]);
    }
    writer.write(path, encoding)
}

/// Read popularity stage output (cold filter input)
///
/// `forks_count` is optional here; the filter only needs stars.
pub fn read_popularity(path: &Path, encoding: Encoding) -> Result<Loaded<PopularityRow>> {
    let table = Table::read(path, encoding)?;
    table.require(&[COL_ID, COL_REPO_NAME, COL_POPULARITY, COL_STARS])?;
    Ok(Loaded::collect(&table, |row| {
        let (id, platform, repo_name) = identity(row)?;
        let forks = if row.get(COL_FORKS).is_some() {
            count(row, COL_FORKS)?
        } else {
            0
        };
        Ok(PopularityRow {
            metric: RepoMetric {
                id,
                platform,
                repo_name,
                stars: count(row, COL_STARS)?,
                forks,
            },
            popularity_score: score(row, COL_POPULARITY)?,
        })
    }))
}

/// Write the cold set
pub fn write_cold(repos: &[ColdRepo], path: &Path, encoding: Encoding) -> Result<()> {
    let mut writer = TableWriter::new([COL_ID, COL_PLATFORM, COL_REPO_NAME, COL_POPULARITY]);
    for repo in repos {
        writer.push(vec![
            repo.id.clone(),
            repo.platform.to_string(),
            repo.repo_name.to_string(),
            repo.popularity_score.to_string(),
        ]);
    }
    writer.write(path, encoding)
}

/// Read the cold set (merge stage input)
pub fn read_cold(path: &Path, encoding: Encoding) -> Result<Loaded<ColdRepo>> {
    let table = Table::read(path, encoding)?;
    table.require(&[COL_ID, COL_REPO_NAME, COL_POPULARITY])?;
    Ok(Loaded::collect(&table, |row| {
        let (id, platform, repo_name) = identity(row)?;
        Ok(ColdRepo {
            id,
            platform,
            repo_name,
            popularity_score: score(row, COL_POPULARITY)?,
        })
    }))
}

/// Write complexity scores
///
/// The `id` column is only written when every row has one, so that the
/// merge stage never joins on a partially empty key.
pub fn write_complexity(rows: &[ComplexityRow], path: &Path, encoding: Encoding) -> Result<()> {
    let with_id = rows.iter().all(|r| r.id.is_some());
    let mut headers = Vec::new();
    if with_id {
        headers.push(COL_ID);
    }
    headers.extend([COL_PLATFORM, COL_REPO_NAME, COL_COMPLEXITY, COL_SUCCESS]);
    let mut writer = TableWriter::new(headers);
    for row in rows {
        let mut cells = Vec::new();
        if with_id {
            cells.push(row.id.clone().unwrap_or_default());
        }
        cells.extend([
            row.platform.to_string(),
            row.repo_name.to_string(),
            row.complexity.score.to_string(),
            row.complexity.success.to_string(),
        ]);
        writer.push(cells);
    }
    writer.write(path, encoding)
}

/// Write activity scores keyed by repository name
pub fn write_activity(rows: &[(RepoName, f64)], path: &Path, encoding: Encoding) -> Result<()> {
    let mut writer = TableWriter::new([COL_REPO_NAME, COL_ACTIVITY]);
    for (name, activity) in rows {
        writer.push(vec![name.to_string(), activity.to_string()]);
    }
    writer.write(path, encoding)
}

fn score_row_cells(
    row: &ScoreRow,
    complexity: Option<f64>,
    innovation: Option<f64>,
    popularity: f64,
) -> Vec<String> {
    vec![
        row.id.clone(),
        row.platform.to_string(),
        row.repo_name.to_string(),
        popularity.to_string(),
        opt_cell(complexity),
        row.complexity
            .map(|c| c.success.to_string())
            .unwrap_or_default(),
        opt_cell(innovation),
        opt_cell(row.activity_score),
    ]
}

const SCORE_HEADERS: [&str; 8] = [
    COL_ID,
    COL_PLATFORM,
    COL_REPO_NAME,
    COL_POPULARITY,
    COL_COMPLEXITY,
    COL_COMPLEXITY_SUCCESS,
    COL_INNOVATION,
    COL_ACTIVITY,
];

/// Write merged raw scores; failed joins are written as empty cells
pub fn write_scores(rows: &[ScoreRow], path: &Path, encoding: Encoding) -> Result<()> {
    let mut writer = TableWriter::new(SCORE_HEADERS);
    for row in rows {
        writer.push(score_row_cells(
            row,
            row.complexity_score(),
            row.innovation_score,
            row.popularity_score,
        ));
    }
    writer.write(path, encoding)
}

/// Write normalized scores into the same columns as the raw table
pub fn write_normalized(rows: &[NormalizedRow], path: &Path, encoding: Encoding) -> Result<()> {
    let mut writer = TableWriter::new(SCORE_HEADERS);
    for row in rows {
        writer.push(score_row_cells(
            &row.row,
            Some(row.normalized.complexity),
            Some(row.normalized.innovation),
            row.normalized.popularity,
        ));
    }
    writer.write(path, encoding)
}

/// Read a merged or normalized score table
///
/// Empty complexity/innovation/activity cells stay `None`. A non-numeric
/// popularity cell is read as 0, matching normalization coercion.
pub fn read_scores(path: &Path, encoding: Encoding) -> Result<Loaded<ScoreRow>> {
    let table = Table::read(path, encoding)?;
    table.require(&[COL_ID, COL_REPO_NAME, COL_POPULARITY])?;
    let legacy_innovation =
        !table.has_column(COL_INNOVATION) && table.has_column("inovation_score");
    let innovation_column = if legacy_innovation {
        "inovation_score"
    } else {
        COL_INNOVATION
    };
    Ok(Loaded::collect(&table, |row| {
        let (id, platform, repo_name) = identity(row)?;
        let complexity = row.number(COL_COMPLEXITY).map(|score| ComplexityScore {
            score: score.max(0.0),
            success: row
                .flag(COL_COMPLEXITY_SUCCESS)
                .or_else(|| row.flag(COL_SUCCESS))
                .unwrap_or(true),
        });
        Ok(ScoreRow {
            id,
            platform,
            repo_name,
            popularity_score: row.number(COL_POPULARITY).unwrap_or(0.0),
            complexity,
            innovation_score: row.number(innovation_column),
            activity_score: row.number(COL_ACTIVITY),
        })
    }))
}

/// Write the ranked table; the score column is named after the policy
///
/// Raw `*_score` columns are followed by their `normalized_*` counterparts.
pub fn write_ranked(
    repos: &[RankedRepo],
    score_column: &str,
    path: &Path,
    encoding: Encoding,
) -> Result<()> {
    let mut writer = TableWriter::new([
        COL_RANK,
        COL_ID,
        COL_PLATFORM,
        COL_REPO_NAME,
        COL_COMPLEXITY,
        COL_INNOVATION,
        COL_POPULARITY,
        COL_ACTIVITY,
        COL_NORM_COMPLEXITY,
        COL_NORM_INNOVATION,
        COL_NORM_POPULARITY,
        COL_COMPLEXITY_AVAILABLE,
        score_column,
    ]);
    for repo in repos {
        writer.push(vec![
            repo.rank.to_string(),
            repo.id.clone(),
            repo.platform.to_string(),
            repo.repo_name.to_string(),
            repo.complexity_score.to_string(),
            repo.innovation_score.to_string(),
            repo.popularity_score.to_string(),
            repo.activity_score.to_string(),
            repo.normalized.complexity.to_string(),
            repo.normalized.innovation.to_string(),
            repo.normalized.popularity.to_string(),
            repo.complexity_available.to_string(),
            repo.total_score.to_string(),
        ]);
    }
    writer.write(path, encoding)
}

/// Read a ranked table written by [`write_ranked`]
///
/// Returns the rows and the name of the score column found.
pub fn read_ranked(path: &Path, encoding: Encoding) -> Result<(Loaded<RankedRepo>, String)> {
    let table = Table::read(path, encoding)?;
    let score_column = ["total_score", "weighted_score"]
        .into_iter()
        .find(|c| table.has_column(c))
        .ok_or_else(|| PipelineError::MissingColumn {
            path: path.to_path_buf(),
            column: "total_score".to_string(),
        })?;
    table.require(&[COL_ID, COL_REPO_NAME])?;
    let loaded = Loaded::collect(&table, |row| {
        let (id, platform, repo_name) = identity(row)?;
        Ok(RankedRepo {
            rank: row
                .get(COL_RANK)
                .and_then(|r| r.parse().ok())
                .unwrap_or(0),
            id,
            platform,
            repo_name,
            complexity_score: row.number(COL_COMPLEXITY).unwrap_or(0.0),
            innovation_score: row.number(COL_INNOVATION).unwrap_or(0.0),
            popularity_score: row.number(COL_POPULARITY).unwrap_or(0.0),
            activity_score: row.number(COL_ACTIVITY).unwrap_or(0.0),
            normalized: NormalizedScores {
                complexity: row.number(COL_NORM_COMPLEXITY).unwrap_or(0.0),
                innovation: row.number(COL_NORM_INNOVATION).unwrap_or(0.0),
                popularity: row.number(COL_NORM_POPULARITY).unwrap_or(0.0),
            },
            complexity_available: row.flag(COL_COMPLEXITY_AVAILABLE).unwrap_or(true),
            total_score: score(row, score_column)?,
        })
    });
    Ok((loaded, score_column.to_string()))
}
