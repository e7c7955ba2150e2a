//! CSV table reading and writing
//!
//! Global invariants enforced:
//! - A stage never writes a partial output file (temp file + rename)
//! - Missing files, empty files and missing columns are reported before any
//!   row is processed
//! - Column lookups are by header name, never by position

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Text encoding of a CSV file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value
    Latin1,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Latin1 => "latin1",
        }
    }

    fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<String> {
        match self {
            Encoding::Utf8 => {
                let text = String::from_utf8(bytes).map_err(|e| PipelineError::Encoding {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(text
                    .strip_prefix('\u{feff}')
                    .map(str::to_string)
                    .unwrap_or(text))
            }
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }

    fn encode(&self, path: &Path, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| PipelineError::Encoding {
                        path: path.to_path_buf(),
                        message: format!("character '{}' is not representable in latin1", c),
                    })
                })
                .collect(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(PipelineError::InvalidInput(format!(
                "unknown encoding '{}' (expected utf8 or latin1)",
                other
            ))),
        }
    }
}

/// Parsed CSV file with a header row
#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    headers: Vec<String>,
    index: HashMap<String, usize>,
    records: Vec<csv::StringRecord>,
}

impl Table {
    /// Read a CSV file, rejecting missing files and header-only files
    pub fn read(path: &Path, encoding: Encoding) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingSource(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let text = encoding.decode(path, bytes)?;
        Self::parse(path, &text)
    }

    /// Parse CSV text; `path` is only used for error reporting
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?);
        }
        if records.is_empty() {
            return Err(PipelineError::EmptySource(path.to_path_buf()));
        }
        let mut index = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            // First occurrence wins for duplicated headers
            index.entry(header.clone()).or_insert(i);
        }
        Ok(Table {
            path: path.to_path_buf(),
            headers,
            index,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fail with `MissingColumn` for the first absent column
    pub fn require(&self, columns: &[&str]) -> Result<()> {
        for column in columns {
            if !self.has_column(column) {
                return Err(PipelineError::MissingColumn {
                    path: self.path.clone(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.records
            .iter()
            .enumerate()
            .map(move |(i, record)| TableRow {
                number: i + 1,
                record,
                index: &self.index,
            })
    }
}

/// One data row, addressed by column name
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    /// 1-based data row number
    pub number: usize,
    record: &'a csv::StringRecord,
    index: &'a HashMap<String, usize>,
}

impl<'a> TableRow<'a> {
    /// Trimmed cell value; `None` for absent columns, short rows and empty cells
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = *self.index.get(column)?;
        let value = self.record.get(idx)?.trim();
        (!value.is_empty()).then_some(value)
    }

    /// Parse a finite float, `None` when absent or not numeric
    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Parse a boolean flag written as true/false, 1/0 or yes/no
    pub fn flag(&self, column: &str) -> Option<bool> {
        match self.get(column)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }
}

/// In-memory CSV output, written in one atomic step
#[derive(Debug, Clone)]
pub struct TableWriter {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableWriter {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        TableWriter {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as CSV text
    pub fn to_csv_string(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PipelineError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| PipelineError::InvalidInput(e.to_string()))
    }

    /// Encode and write atomically
    pub fn write(&self, path: &Path, encoding: Encoding) -> Result<()> {
        let text = self.to_csv_string()?;
        let bytes = encoding.encode(path, &text)?;
        atomic_write(path, &bytes)
    }
}

/// Write a file atomically using the temp file + rename pattern
///
/// The temp file is `<file name>.tmp` next to the target and is removed
/// again when any step fails.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    use std::fs;

    let mut temp_name = path
        .file_name()
        .ok_or_else(|| {
            PipelineError::InvalidInput(format!("not a file path: {}", path.display()))
        })?
        .to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let written = write_synced(&temp_path, contents).and_then(|()| fs::rename(&temp_path, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Format an optional float cell; `None` becomes an empty cell
pub fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_temp_file_is_per_target() {
        let dir = tempfile::tempdir().unwrap();
        let sibling = dir.path().join("ranked.tmp");
        std::fs::write(&sibling, "keep").unwrap();

        atomic_write(&dir.path().join("ranked.csv"), b"a,b\n").unwrap();
        atomic_write(&dir.path().join("ranked.json"), b"[]").unwrap();

        assert_eq!(std::fs::read_to_string(&sibling).unwrap(), "keep");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("ranked.csv")).unwrap(),
            "a,b\n"
        );
        assert!(!dir.path().join("ranked.csv.tmp").exists());
        assert!(!dir.path().join("ranked.json.tmp").exists());
    }

    #[test]
    fn test_atomic_write_failure_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail
        let target = dir.path().join("out.csv");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("inside"), "x").unwrap();

        assert!(atomic_write(&target, b"data").is_err());
        assert!(!dir.path().join("out.csv.tmp").exists());
        assert!(target.is_dir());
    }

    #[test]
    fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = Table::read(&dir.path().join("absent.csv"), Encoding::Utf8);
        assert!(matches!(result, Err(PipelineError::MissingSource(_))));
    }

    #[test]
    fn test_header_only_is_empty_source() {
        let result = Table::parse(Path::new("x.csv"), "id,repo_name\n");
        assert!(matches!(result, Err(PipelineError::EmptySource(_))));
    }

    #[test]
    fn test_require_reports_column_name() {
        let table = Table::parse(Path::new("x.csv"), "id,repo_name\n1,a/b\n").unwrap();
        match table.require(&["id", "stargazers_count"]) {
            Err(PipelineError::MissingColumn { column, .. }) => {
                assert_eq!(column, "stargazers_count")
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_row_accessors() {
        let table = Table::parse(
            Path::new("x.csv"),
            " id , score ,ok\n1, 2.5 ,true\n2,abc,\n3,NaN,0\n",
        )
        .unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[0].get("id"), Some("1"));
        assert_eq!(rows[0].number("score"), Some(2.5));
        assert_eq!(rows[0].flag("ok"), Some(true));
        assert_eq!(rows[1].number("score"), None);
        assert_eq!(rows[1].flag("ok"), None);
        assert_eq!(rows[2].number("score"), None, "NaN is not a usable number");
        assert_eq!(rows[2].flag("ok"), Some(false));
        assert_eq!(rows[2].number, 3);
    }

    #[test]
    fn test_latin1_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        let mut writer = TableWriter::new(["id", "repo_name"]);
        writer.push(vec!["1".to_string(), "café/crème".to_string()]);
        writer.write(&path, Encoding::Latin1).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.contains(&0xE9), "é must be a single latin1 byte");

        let table = Table::read(&path, Encoding::Latin1).unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(row.get("repo_name"), Some("café/crème"));
        assert!(Table::read(&path, Encoding::Utf8).is_err());
    }

    #[test]
    fn test_latin1_rejects_unrepresentable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = TableWriter::new(["name"]);
        writer.push(vec!["冷门".to_string()]);
        assert!(matches!(
            writer.write(&path, Encoding::Latin1),
            Err(PipelineError::Encoding { .. })
        ));
        assert!(!path.exists(), "no partial output on failure");
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        std::fs::write(&path, "\u{feff}id,repo_name\n1,a/b\n").unwrap();
        let table = Table::read(&path, Encoding::Utf8).unwrap();
        assert!(table.has_column("id"));
    }
}
