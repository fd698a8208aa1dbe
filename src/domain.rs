use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CuratorError;

const UNASSIGNED_MARKERS: &[&str] = &["", "na", "n/a", "unknown", "nan", "none", "null"];

const MISSING_PMID_MARKERS: &[&str] = &["", "na", "n/a", "unknown", "nan", "none", "null"];

pub fn is_unassigned(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    UNASSIGNED_MARKERS.contains(&lowered.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudyCode(String);

impl StudyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn assigned(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| value.parse().ok())
    }
}

impl fmt::Display for StudyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudyCode {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if is_unassigned(trimmed) {
            return Err(CuratorError::InvalidStudyCode(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pmid(String);

impl Pmid {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse_known(raw: Option<&str>) -> Option<Self> {
        let trimmed = raw?.trim();
        let lowered = trimmed.to_lowercase();
        if MISSING_PMID_MARKERS.contains(&lowered.as_str()) {
            return None;
        }
        Some(Self(trimmed.trim_end_matches(".0").to_string()))
    }
}

impl fmt::Display for Pmid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn canonical_category(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMarkers {
    #[serde(default = "default_available_marker")]
    pub available: String,
    #[serde(default = "default_transferred_marker")]
    pub transferred: String,
}

impl Default for StatusMarkers {
    fn default() -> Self {
        Self {
            available: default_available_marker(),
            transferred: default_transferred_marker(),
        }
    }
}

impl StatusMarkers {
    // Two independent substring tests. They are not exclusive by construction;
    // the validator reports rows where both hold.
    pub fn flags(&self, status: Option<&str>) -> StorageFlags {
        let Some(status) = status else {
            return StorageFlags::default();
        };
        StorageFlags {
            is_available: status.contains(&self.available),
            is_transferred: status.contains(&self.transferred),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageFlags {
    pub is_available: bool,
    pub is_transferred: bool,
}

fn default_available_marker() -> String {
    "In Circulation".to_string()
}

fn default_transferred_marker() -> String {
    "3rd Party Transfer".to_string()
}

pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_study_code_valid() {
        let code: StudyCode = " DU08-04 ".parse().unwrap();
        assert_eq!(code.as_str(), "DU08-04");
    }

    #[test]
    fn parse_study_code_rejects_placeholders() {
        for raw in ["", "NA", "N/A", "Unknown", "nan"] {
            let err = raw.parse::<StudyCode>().unwrap_err();
            assert_matches!(err, CuratorError::InvalidStudyCode(_));
        }
        assert_eq!(StudyCode::assigned(None), None);
    }

    #[test]
    fn pmid_placeholders_are_unknown() {
        assert_eq!(Pmid::parse_known(Some("N/A")), None);
        assert_eq!(Pmid::parse_known(Some("unknown")), None);
        assert_eq!(
            Pmid::parse_known(Some("31234567")).unwrap().as_str(),
            "31234567"
        );
    }

    #[test]
    fn canonical_category_collapses_and_lowercases() {
        assert_eq!(
            canonical_category("  Nasal   Wash "),
            Some("nasal wash".to_string())
        );
        assert_eq!(canonical_category("   "), None);
    }

    #[test]
    fn status_markers_are_independent() {
        let markers = StatusMarkers::default();
        let both = markers.flags(Some("In Circulation / 3rd Party Transfer"));
        assert!(both.is_available && both.is_transferred);
        assert_eq!(markers.flags(None), StorageFlags::default());
    }
}
