use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::inventory::{InventoryTable, SampleRecord};
use crate::validate::{MAX_PLAUSIBLE_DAY, MIN_PLAUSIBLE_DAY};

pub const DAY_TOO_EARLY: &str = "Day < -30 (too far before inoculation)";
pub const DAY_TOO_LATE: &str = "Day > 365 (too far after inoculation)";
pub const MISSING_STORAGE: &str = "Missing storage location";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnparsedTimepoint {
    pub timepoint_raw: String,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusualTimepointSample {
    pub sample_barcode_id: String,
    pub study_code: Option<String>,
    pub timepoint_raw: Option<String>,
    pub timepoint_normalized: Option<String>,
    pub timepoint_day: i64,
    pub error_type: String,
    pub participant_id: Option<String>,
    pub sample_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingStorageSample {
    pub sample_barcode_id: String,
    pub study_code: Option<String>,
    pub timepoint_normalized: Option<String>,
    pub sample_type: Option<String>,
    pub error_type: String,
    pub note: String,
    pub storage_status: Option<String>,
    pub is_available: bool,
    pub is_transferred: bool,
    pub participant_id: Option<String>,
}

impl From<&SampleRecord> for MissingStorageSample {
    fn from(row: &SampleRecord) -> Self {
        let note = if row.is_transferred {
            "Transferred (location not needed)"
        } else {
            "Available but location missing"
        };
        Self {
            sample_barcode_id: row.sample_barcode_id.clone(),
            study_code: row.study_code.clone(),
            timepoint_normalized: row.timepoint_normalized.clone(),
            sample_type: row.sample_type.clone(),
            error_type: MISSING_STORAGE.to_string(),
            note: note.to_string(),
            storage_status: row.storage_status.clone(),
            is_available: row.is_available,
            is_transferred: row.is_transferred,
            participant_id: row.participant_id.clone(),
        }
    }
}

pub fn unparsed_timepoint_counts(inventory: &InventoryTable) -> Vec<UnparsedTimepoint> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for raw in inventory
        .rows()
        .iter()
        .filter(|row| row.timepoint_day.is_none())
        .filter_map(|row| row.timepoint_raw.as_deref())
    {
        *counts.entry(raw).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(raw, samples)| UnparsedTimepoint {
            timepoint_raw: raw.to_string(),
            samples,
        })
        .collect()
}

// Samples whose study day falls outside the plausible window. Screening
// visits carry a sentinel day and are never listed.
pub fn unusual_timepoint_samples(inventory: &InventoryTable) -> Vec<UnusualTimepointSample> {
    inventory
        .rows()
        .iter()
        .filter_map(|row| {
            let day = row.study_day()?;
            let error_type = if day < MIN_PLAUSIBLE_DAY {
                DAY_TOO_EARLY
            } else if day > MAX_PLAUSIBLE_DAY {
                DAY_TOO_LATE
            } else {
                return None;
            };
            Some(UnusualTimepointSample {
                sample_barcode_id: row.sample_barcode_id.clone(),
                study_code: row.study_code.clone(),
                timepoint_raw: row.timepoint_raw.clone(),
                timepoint_normalized: row.timepoint_normalized.clone(),
                timepoint_day: day,
                error_type: error_type.to_string(),
                participant_id: row.participant_id.clone(),
                sample_type: row.sample_type.clone(),
            })
        })
        .collect()
}

pub fn missing_storage_samples(inventory: &InventoryTable) -> Vec<MissingStorageSample> {
    inventory
        .rows()
        .iter()
        .filter(|row| row.storage_location_path.is_none())
        .map(MissingStorageSample::from)
        .collect()
}
