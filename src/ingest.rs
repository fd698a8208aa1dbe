use std::sync::LazyLock;

use camino::Utf8Path;
use csv::ReaderBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::InventorySource;
use crate::error::CuratorError;

static STUDY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(.+?)_Full Inventory").unwrap());

#[derive(Debug, Clone)]
pub struct RawInventoryTable {
    pub source_name: String,
    pub study_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawInventoryTable {
    pub fn new(
        source_name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        let source_name = source_name.into();
        let study_name = study_name_from_file(&source_name);
        Self {
            source_name,
            study_name,
            headers: headers.iter().map(|header| normalize_header(header)).collect(),
            rows,
        }
    }

    pub fn with_study_name(mut self, study_name: impl Into<String>) -> Self {
        self.study_name = study_name.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceError {
    pub source: String,
    pub message: String,
}

impl SourceError {
    pub fn new(source: impl Into<String>, error: &CuratorError) -> Self {
        Self {
            source: source.into(),
            message: error.to_string(),
        }
    }
}

pub fn load_inventory_source(source: &InventorySource) -> Result<RawInventoryTable, CuratorError> {
    let table = read_raw_table(&source.path)?;
    Ok(match &source.study_name {
        Some(name) => table.with_study_name(name.clone()),
        None => table,
    })
}

pub fn read_raw_table(path: &Utf8Path) -> Result<RawInventoryTable, CuratorError> {
    let source_error = |message: String| CuratorError::SourceRead {
        path: path.to_string(),
        message,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path.as_std_path())
        .map_err(|err| source_error(err.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|err| source_error(err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| source_error(err.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let source_name = path.file_name().unwrap_or(path.as_str()).to_string();
    Ok(RawInventoryTable::new(source_name, headers, rows))
}

pub fn study_name_from_file(file_name: &str) -> String {
    let stem = Utf8Path::new(file_name).file_stem().unwrap_or(file_name);
    STUDY_NAME
        .captures(stem)
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyCount {
    pub study_code: String,
    pub total_samples: u64,
}

pub fn read_study_counts(path: &Utf8Path) -> Result<Vec<StudyCount>, CuratorError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_std_path())
        .map_err(|err| CuratorError::SourceRead {
            path: path.to_string(),
            message: err.to_string(),
        })?;
    reader
        .deserialize::<StudyCount>()
        .map(|row| row.map_err(|err| CuratorError::Csv(format!("{path}: {err}"))))
        .collect()
}
