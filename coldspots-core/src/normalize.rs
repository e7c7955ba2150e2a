//! Corpus-wide min-max normalization onto a 0-100 scale
//!
//! Global invariants enforced:
//! - Column statistics are computed once over the whole corpus before any
//!   row is rescaled
//! - Missing or non-numeric values are coerced to 0, never dropped
//! - A degenerate column (max == min) normalizes to 0 everywhere
//! - Output values are finite and rounded to 2 decimal places

use crate::metric::{NormalizedRow, NormalizedScores, ScoreRow};
use log::{debug, info};
use serde::Serialize;

/// Score columns that share the 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreColumn {
    Complexity,
    Innovation,
    Popularity,
}

impl ScoreColumn {
    pub const ALL: [ScoreColumn; 3] = [
        ScoreColumn::Complexity,
        ScoreColumn::Innovation,
        ScoreColumn::Popularity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreColumn::Complexity => "complexity_score",
            ScoreColumn::Innovation => "innovation_score",
            ScoreColumn::Popularity => "popularity_score",
        }
    }

    /// Raw value of this column for one row, before coercion
    pub fn raw(&self, row: &ScoreRow) -> Option<f64> {
        match self {
            ScoreColumn::Complexity => row.complexity_score(),
            ScoreColumn::Innovation => row.innovation_score,
            ScoreColumn::Popularity => Some(row.popularity_score),
        }
    }
}

/// Global statistics of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    /// Statistics over coerced values; `None` for an empty column
    pub fn of(values: &[f64]) -> Option<Self> {
        let first = *values.first()?;
        let (min, max) = values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(ColumnStats { min, max })
    }

    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// Rescale one value with these statistics
    ///
    /// Formula: (value - min) / (max - min) * 100, rounded to 2 decimals.
    pub fn rescale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        let scaled = (value - self.min) / (self.max - self.min) * 100.0;
        if scaled.is_finite() {
            round2(scaled)
        } else {
            0.0
        }
    }
}

/// Coerce a missing or non-finite value to 0
pub fn coerce(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Round to 2 decimal places, ties to even on the scaled value
///
/// Same result as a dataframe `.round(2)`: `0.125` becomes `0.12`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Round to 2 decimal places against the exact binary value of `value`
///
/// Same result as a decimal `round(x, 2)`: `0.015` is stored slightly below
/// the tie and becomes `0.01`, where [`round2`] sees an exact tie and gives
/// `0.02`.
pub fn round2_decimal(value: f64) -> f64 {
    let scaled = value * 100.0;
    // Exact residual of the product
    let residual = value.mul_add(100.0, -scaled);
    let rounded = if (scaled - scaled.trunc()).abs() == 0.5 && residual != 0.0 {
        if residual > 0.0 {
            scaled.ceil()
        } else {
            scaled.floor()
        }
    } else {
        scaled.round_ties_even()
    };
    rounded / 100.0
}

/// Normalize a whole column
pub fn normalize_column(values: &[Option<f64>]) -> Vec<f64> {
    let coerced: Vec<f64> = values.iter().map(|v| coerce(*v)).collect();
    match ColumnStats::of(&coerced) {
        Some(stats) => coerced.iter().map(|v| stats.rescale(*v)).collect(),
        None => Vec::new(),
    }
}

/// Normalized corpus plus the columns that turned out degenerate
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCorpus {
    pub rows: Vec<NormalizedRow>,
    pub degenerate: Vec<ScoreColumn>,
}

/// Normalize complexity, innovation and popularity across the corpus
pub fn normalize_corpus(rows: &[ScoreRow]) -> NormalizedCorpus {
    let mut degenerate = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(ScoreColumn::ALL.len());

    for column in ScoreColumn::ALL {
        let raw: Vec<Option<f64>> = rows.iter().map(|r| column.raw(r)).collect();
        let missing = raw.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            debug!(
                "{}: {} missing value(s) coerced to 0",
                column.as_str(),
                missing
            );
        }
        let coerced: Vec<f64> = raw.iter().map(|v| coerce(*v)).collect();
        if let Some(stats) = ColumnStats::of(&coerced) {
            if stats.is_degenerate() {
                info!(
                    "{}: all values equal ({}), normalized to 0",
                    column.as_str(),
                    stats.min
                );
                degenerate.push(column);
            }
        }
        columns.push(normalize_column(&raw));
    }

    let rows = rows
        .iter()
        .enumerate()
        .map(|(i, row)| NormalizedRow {
            row: row.clone(),
            normalized: NormalizedScores {
                complexity: columns[0][i],
                innovation: columns[1][i],
                popularity: columns[2][i],
            },
        })
        .collect();

    NormalizedCorpus { rows, degenerate }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{ColdRepo, ComplexityScore, Platform, RepoName};

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_full_range_unchanged() {
        assert_eq!(
            normalize_column(&some(&[0.0, 50.0, 100.0])),
            vec![0.0, 50.0, 100.0]
        );
    }

    #[test]
    fn test_degenerate_column_is_zero() {
        assert_eq!(
            normalize_column(&some(&[7.0, 7.0, 7.0])),
            vec![0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_missing_values_coerced_not_dropped() {
        // Dropping None would make min 10 instead of 0
        let normalized = normalize_column(&[Some(10.0), None, Some(20.0)]);
        assert_eq!(normalized, vec![50.0, 0.0, 100.0]);
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        let normalized = normalize_column(&some(&[0.0, 1.0, 3.0]));
        assert_eq!(normalized, vec![0.0, 33.33, 100.0]);
    }

    #[test]
    fn test_rounding_ties_go_to_even() {
        // 1 / 800 * 100 is exactly 0.125
        let normalized = normalize_column(&some(&[0.0, 1.0, 800.0]));
        assert_eq!(normalized, vec![0.0, 0.12, 100.0]);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
    }

    #[test]
    fn test_decimal_rounding_uses_stored_value() {
        assert_eq!(round2_decimal(0.125), 0.12);
        assert_eq!(round2_decimal(0.015), 0.01);
        assert_eq!(round2_decimal(0.025), 0.03);
        assert_eq!(round2_decimal(2.675), 2.67);
        assert_eq!(round2(0.015), 0.02);
        assert_eq!(round2_decimal(0.5996), 0.6);
    }

    #[test]
    fn test_empty_column() {
        assert!(normalize_column(&[]).is_empty());
    }

    #[test]
    fn test_normalize_corpus_reports_degenerate_columns() {
        let rows: Vec<ScoreRow> = (0..3)
            .map(|i| {
                let mut row = ScoreRow::from_cold(ColdRepo {
                    id: i.to_string(),
                    platform: Platform::Github,
                    repo_name: RepoName::parse(&format!("o/r{}", i)).unwrap(),
                    popularity_score: 1.5,
                });
                row.complexity = Some(ComplexityScore {
                    score: (i * 10) as f64,
                    success: true,
                });
                row.innovation_score = Some(i as f64);
                row
            })
            .collect();
        let corpus = normalize_corpus(&rows);
        assert_eq!(corpus.degenerate, vec![ScoreColumn::Popularity]);
        assert_eq!(corpus.rows[2].normalized.complexity, 100.0);
        assert_eq!(corpus.rows[1].normalized.innovation, 50.0);
        assert_eq!(corpus.rows[1].normalized.popularity, 0.0);
        assert_eq!(corpus.rows[1].row, rows[1], "raw columns are carried over");
    }
}
