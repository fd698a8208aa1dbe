use std::collections::BTreeMap;

use camino::Utf8Path;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::domain::{StudyCode, canonical_category, clean_cell};
use crate::error::CuratorError;

pub const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAssayRow {
    #[serde(default)]
    pub biobank_study_code: Option<String>,
    #[serde(default, rename = "Study")]
    pub study: Option<String>,
    #[serde(default, rename = "Assay")]
    pub assay: Option<String>,
    #[serde(default, rename = "Keys")]
    pub keys: Option<String>,
    #[serde(default, rename = "Samples")]
    pub samples: Option<String>,
    #[serde(default, rename = "Subject ID ranges")]
    pub subject_ranges: Option<String>,
    #[serde(default, rename = "Timepoint(s)")]
    pub timepoints: Option<String>,
    #[serde(default, rename = "Comment")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayRecord {
    pub study_code: Option<String>,
    pub study_name: Option<String>,
    pub assay_type: String,
    pub sample_count: u64,
    pub subject_range: String,
    pub timepoints: String,
    pub data_key: String,
    pub comment: String,
}

impl AssayRecord {
    pub fn from_raw(raw: RawAssayRow, study_codes: &BTreeMap<String, String>) -> Self {
        let study_name = raw.study.as_deref().and_then(clean_cell);
        let study_code = StudyCode::assigned(raw.biobank_study_code.as_deref())
            .or_else(|| {
                study_name
                    .as_ref()
                    .and_then(|name| study_codes.get(name))
                    .and_then(|code| StudyCode::assigned(Some(code)))
            })
            .map(|code| code.as_str().to_string());

        Self {
            study_code,
            study_name,
            assay_type: raw
                .assay
                .as_deref()
                .and_then(canonical_category)
                .unwrap_or_else(|| NOT_SPECIFIED.to_lowercase()),
            sample_count: parse_sample_count(raw.samples.as_deref()),
            subject_range: or_not_specified(raw.subject_ranges),
            timepoints: or_not_specified(raw.timepoints),
            data_key: or_not_specified(raw.keys),
            comment: raw
                .comment
                .as_deref()
                .and_then(clean_cell)
                .unwrap_or_default(),
        }
    }

    pub fn study(&self) -> Option<StudyCode> {
        StudyCode::assigned(self.study_code.as_deref())
    }
}

pub fn load_assays(
    path: &Utf8Path,
    study_codes: &BTreeMap<String, String>,
) -> Result<Vec<AssayRecord>, CuratorError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path.as_std_path())
        .map_err(|err| CuratorError::SourceRead {
            path: path.to_string(),
            message: err.to_string(),
        })?;

    let mut records = Vec::new();
    for row in reader.deserialize::<RawAssayRow>() {
        let row = row.map_err(|err| CuratorError::AssaysParse {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        records.push(AssayRecord::from_raw(row, study_codes));
    }
    Ok(records)
}

fn parse_sample_count(raw: Option<&str>) -> u64 {
    raw.and_then(clean_cell)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
        .map(|value| value as u64)
        .unwrap_or(0)
}

fn or_not_specified(raw: Option<String>) -> String {
    raw.as_deref()
        .and_then(clean_cell)
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_assay_study_codes;

    #[test]
    fn study_name_resolves_missing_code() {
        let raw = RawAssayRow {
            study: Some("EXHALE".to_string()),
            assay: Some("  Bulk   RNA-seq ".to_string()),
            samples: Some("96.0".to_string()),
            ..RawAssayRow::default()
        };
        let record = AssayRecord::from_raw(raw, &default_assay_study_codes());
        assert_eq!(record.study_code.as_deref(), Some("DU24-01"));
        assert_eq!(record.assay_type, "bulk rna-seq");
        assert_eq!(record.sample_count, 96);
        assert_eq!(record.data_key, NOT_SPECIFIED);
    }

    #[test]
    fn explicit_code_wins_over_name() {
        let raw = RawAssayRow {
            biobank_study_code: Some("DU08-04".to_string()),
            study: Some("EXHALE".to_string()),
            samples: Some("n/a".to_string()),
            ..RawAssayRow::default()
        };
        let record = AssayRecord::from_raw(raw, &default_assay_study_codes());
        assert_eq!(record.study_code.as_deref(), Some("DU08-04"));
        assert_eq!(record.sample_count, 0);
    }
}
