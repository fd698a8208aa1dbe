use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::inventory::{InventoryTable, SampleRecord};
use crate::publications::Publication;

const TOP_SAMPLE_TYPES: usize = 10;

// Catalogue fields only. Freezer locations, notes and LabVantage ids stay internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSample {
    pub sample_barcode_id: String,
    pub participant_id: Option<String>,
    pub study_code: Option<String>,
    pub timepoint_normalized: Option<String>,
    pub timepoint_day: Option<i64>,
    pub timepoint_hour: Option<f64>,
    pub sample_type: Option<String>,
    pub storage_status: Option<String>,
    pub is_available: bool,
    pub is_transferred: bool,
}

impl From<&SampleRecord> for DashboardSample {
    fn from(row: &SampleRecord) -> Self {
        Self {
            sample_barcode_id: row.sample_barcode_id.clone(),
            participant_id: row.participant_id.clone(),
            study_code: row.study_code.clone(),
            timepoint_normalized: row.timepoint_normalized.clone(),
            timepoint_day: row.timepoint_day,
            timepoint_hour: row.timepoint_hour,
            sample_type: row.sample_type.clone(),
            storage_status: row.storage_status.clone(),
            is_available: row.is_available,
            is_transferred: row.is_transferred,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStatistics {
    pub total_samples: usize,
    pub total_studies: usize,
    pub total_participants: usize,
    pub total_sample_types: usize,
    pub available_samples: usize,
    pub transferred_samples: usize,
    pub samples_by_study: BTreeMap<String, usize>,
    pub samples_by_type: Vec<(String, usize)>,
    pub participants_by_study: BTreeMap<String, usize>,
    pub date_generated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPublication {
    pub title: String,
    pub first_author: String,
    pub journal: String,
    pub year: String,
    pub pmid: String,
    pub study_code: String,
    pub study_name: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
}

impl From<&Publication> for DashboardPublication {
    fn from(publication: &Publication) -> Self {
        Self {
            title: publication
                .title
                .clone()
                .unwrap_or_else(|| "No title".to_string()),
            first_author: publication.first_author_label(),
            journal: publication
                .journal
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            year: publication.year_label(),
            pmid: publication.pmid_label(),
            study_code: publication
                .primary_study_code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            study_name: publication.study_name.clone(),
            abstract_text: publication
                .abstract_text
                .clone()
                .filter(|text| !text.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardExport {
    pub samples: Vec<DashboardSample>,
    pub statistics: SampleStatistics,
    pub publications: Vec<DashboardPublication>,
}

pub fn build_dashboard(
    inventory: &InventoryTable,
    publications: &[Publication],
    generated_at: &str,
) -> DashboardExport {
    DashboardExport {
        samples: inventory.rows().iter().map(DashboardSample::from).collect(),
        statistics: sample_statistics(inventory, generated_at),
        publications: publications.iter().map(DashboardPublication::from).collect(),
    }
}

pub fn sample_statistics(inventory: &InventoryTable, generated_at: &str) -> SampleStatistics {
    let rows = inventory.rows();

    let mut samples_by_study = BTreeMap::new();
    for (code, study_rows) in inventory.by_study() {
        samples_by_study.insert(code.to_string(), study_rows.len());
    }
    let participants_by_study = inventory
        .by_study()
        .into_iter()
        .map(|(code, study_rows)| {
            let participants = study_rows
                .iter()
                .filter_map(|row| row.participant_id.as_deref())
                .collect::<HashSet<_>>()
                .len();
            (code.to_string(), participants)
        })
        .collect();

    let mut type_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for sample_type in rows.iter().filter_map(|row| row.sample_type.as_deref()) {
        *type_counts.entry(sample_type).or_default() += 1;
    }
    let mut samples_by_type = type_counts
        .iter()
        .map(|(name, count)| (name.to_string(), *count))
        .collect::<Vec<_>>();
    samples_by_type.sort_by(|a, b| b.1.cmp(&a.1));
    samples_by_type.truncate(TOP_SAMPLE_TYPES);

    SampleStatistics {
        total_samples: rows.len(),
        total_studies: samples_by_study.len(),
        total_participants: inventory.distinct_participants(),
        total_sample_types: type_counts.len(),
        available_samples: rows.iter().filter(|row| row.is_available).count(),
        transferred_samples: rows.iter().filter(|row| row.is_transferred).count(),
        samples_by_study,
        samples_by_type,
        participants_by_study,
        date_generated: generated_at.to_string(),
    }
}
