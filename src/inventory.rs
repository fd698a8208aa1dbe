use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{StatusMarkers, clean_cell};
use crate::error::CuratorError;
use crate::ingest::{RawInventoryTable, SourceError};
use crate::timepoint::{SCREENING_DAY, TimepointNormalizer};

pub const HARMONIZATION_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_barcode_id: String,
    pub participant_id: Option<String>,
    pub study_code: Option<String>,
    pub study_name: String,
    pub labvantage_sample_id: Option<String>,
    pub study_family_id: Option<String>,
    pub storage_status: Option<String>,
    pub timepoint_raw: Option<String>,
    pub storage_unit_id: Option<String>,
    pub storage_location_path: Option<String>,
    pub sample_type: Option<String>,
    pub notes: Option<String>,
    pub additive: Option<String>,
    pub quantity: Option<f64>,
    pub quantity_units: Option<String>,
    pub timepoint_day: Option<i64>,
    pub timepoint_hour: Option<f64>,
    pub timepoint_normalized: Option<String>,
    pub is_pre_challenge: Option<bool>,
    pub is_inoculation: Option<bool>,
    pub is_post_challenge: Option<bool>,
    pub is_screening: Option<bool>,
    pub is_available: bool,
    pub is_transferred: bool,
    pub source_file: String,
    pub source_row: usize,
    pub harmonization_date: String,
    pub harmonization_version: String,
}

impl SampleRecord {
    pub fn study_day(&self) -> Option<i64> {
        self.timepoint_day.filter(|day| *day != SCREENING_DAY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalColumn {
    ParticipantId,
    LabvantageSampleId,
    SampleBarcodeId,
    StudyFamilyId,
    StudyCode,
    StorageStatus,
    TimepointRaw,
    StorageUnitId,
    StorageLocationPath,
    SampleType,
    Notes,
    Additive,
    Quantity,
    QuantityUnits,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 14] = [
        CanonicalColumn::ParticipantId,
        CanonicalColumn::LabvantageSampleId,
        CanonicalColumn::SampleBarcodeId,
        CanonicalColumn::StudyFamilyId,
        CanonicalColumn::StudyCode,
        CanonicalColumn::StorageStatus,
        CanonicalColumn::TimepointRaw,
        CanonicalColumn::StorageUnitId,
        CanonicalColumn::StorageLocationPath,
        CanonicalColumn::SampleType,
        CanonicalColumn::Notes,
        CanonicalColumn::Additive,
        CanonicalColumn::Quantity,
        CanonicalColumn::QuantityUnits,
    ];

    pub const REQUIRED: [CanonicalColumn; 6] = [
        CanonicalColumn::SampleBarcodeId,
        CanonicalColumn::ParticipantId,
        CanonicalColumn::StudyCode,
        CanonicalColumn::StorageStatus,
        CanonicalColumn::TimepointRaw,
        CanonicalColumn::SampleType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::ParticipantId => "participant_id",
            CanonicalColumn::LabvantageSampleId => "labvantage_sample_id",
            CanonicalColumn::SampleBarcodeId => "sample_barcode_id",
            CanonicalColumn::StudyFamilyId => "study_family_id",
            CanonicalColumn::StudyCode => "study_code",
            CanonicalColumn::StorageStatus => "storage_status",
            CanonicalColumn::TimepointRaw => "timepoint_raw",
            CanonicalColumn::StorageUnitId => "storage_unit_id",
            CanonicalColumn::StorageLocationPath => "storage_location_path",
            CanonicalColumn::SampleType => "sample_type",
            CanonicalColumn::Notes => "notes",
            CanonicalColumn::Additive => "additive",
            CanonicalColumn::Quantity => "quantity",
            CanonicalColumn::QuantityUnits => "quantity_units",
        }
    }

    pub fn export_header(&self) -> &'static str {
        match self {
            CanonicalColumn::ParticipantId => "External Participant ID",
            CanonicalColumn::LabvantageSampleId => "LV Sample ID",
            CanonicalColumn::SampleBarcodeId => "Alternate Sample ID",
            CanonicalColumn::StudyFamilyId => "Study ID on Sample Family Table",
            CanonicalColumn::StudyCode => "Study Code",
            CanonicalColumn::StorageStatus => "Storage Status",
            CanonicalColumn::TimepointRaw => "Visit / Time Point Name on Sample Family Table",
            CanonicalColumn::StorageUnitId => "Current Storage Unit ID",
            CanonicalColumn::StorageLocationPath => "Label Path",
            CanonicalColumn::SampleType => "Sample Type",
            CanonicalColumn::Notes => "Note Text",
            CanonicalColumn::Additive => "Additive Type for Sample",
            CanonicalColumn::Quantity => "Current Qty",
            CanonicalColumn::QuantityUnits => "Current Units",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == name || column.export_header() == name)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMap {
    entries: HashMap<String, CanonicalColumn>,
}

impl ColumnMap {
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let mut entries = HashMap::new();
        for column in CanonicalColumn::ALL {
            entries.insert(column.export_header().to_string(), column);
            entries.insert(column.as_str().to_string(), column);
        }
        for (header, target) in aliases {
            match CanonicalColumn::from_name(target) {
                Some(column) => {
                    entries.insert(header.clone(), column);
                }
                None => tracing::warn!(header, target, "ignoring alias to unknown column"),
            }
        }
        Self { entries }
    }

    pub fn resolve(&self, header: &str) -> Option<CanonicalColumn> {
        self.entries.get(header).copied()
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

#[derive(Debug, Clone)]
pub struct HarmonizeOptions {
    pub columns: ColumnMap,
    pub status_markers: StatusMarkers,
    pub generated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryTable {
    rows: Vec<SampleRecord>,
}

impl InventoryTable {
    pub fn new(rows: Vec<SampleRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[SampleRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<SampleRecord> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn study_codes(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .filter_map(|row| row.study_code.clone())
            .collect()
    }

    pub fn study_codes_in_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|row| row.study_code.as_deref())
            .filter(|code| seen.insert(*code))
            .map(str::to_string)
            .collect()
    }

    pub fn by_study(&self) -> HashMap<&str, Vec<&SampleRecord>> {
        let mut index: HashMap<&str, Vec<&SampleRecord>> = HashMap::new();
        for row in &self.rows {
            if let Some(code) = row.study_code.as_deref() {
                index.entry(code).or_default().push(row);
            }
        }
        index
    }

    pub fn distinct_barcodes(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.sample_barcode_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn distinct_participants(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|row| row.participant_id.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn unparsed_timepoints(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|row| row.timepoint_day.is_none())
            .filter_map(|row| row.timepoint_raw.as_deref())
            .filter(|raw| seen.insert(*raw))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HarmonizeOutcome {
    pub inventory: InventoryTable,
    pub sources_processed: usize,
    pub source_errors: Vec<SourceError>,
    pub skipped_rows: usize,
}

pub fn harmonize(tables: &[RawInventoryTable], options: &HarmonizeOptions) -> HarmonizeOutcome {
    let mut outcome = HarmonizeOutcome::default();
    let mut rows = Vec::new();

    for table in tables {
        match harmonize_table(table, options, rows.len()) {
            Ok(harmonized) => {
                tracing::debug!(
                    source = %table.source_name,
                    rows = harmonized.rows.len(),
                    skipped = harmonized.skipped,
                    "harmonized source"
                );
                outcome.sources_processed += 1;
                outcome.skipped_rows += harmonized.skipped;
                rows.extend(harmonized.rows);
            }
            Err(err) => {
                tracing::warn!(source = %table.source_name, error = %err, "skipping source");
                outcome
                    .source_errors
                    .push(SourceError::new(table.source_name.clone(), &err));
            }
        }
    }

    outcome.inventory = InventoryTable::new(rows);
    outcome
}

#[derive(Debug, Clone)]
pub struct HarmonizedTable {
    pub rows: Vec<SampleRecord>,
    pub skipped: usize,
}

pub fn harmonize_table(
    table: &RawInventoryTable,
    options: &HarmonizeOptions,
    first_row: usize,
) -> Result<HarmonizedTable, CuratorError> {
    let mut positions: HashMap<CanonicalColumn, usize> = HashMap::new();
    for (index, header) in table.headers.iter().enumerate() {
        if let Some(column) = options.columns.resolve(header) {
            positions.entry(column).or_insert(index);
        }
    }

    let missing = CanonicalColumn::REQUIRED
        .iter()
        .filter(|column| !positions.contains_key(column))
        .map(|column| column.export_header().to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(CuratorError::MissingColumns {
            source_name: table.source_name.clone(),
            missing,
        });
    }

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut skipped = 0;
    for raw in &table.rows {
        let cell = |column: CanonicalColumn| -> Option<String> {
            positions
                .get(&column)
                .and_then(|index| raw.get(*index))
                .and_then(|value| clean_cell(value))
        };

        if raw.iter().all(|value| value.trim().is_empty()) {
            skipped += 1;
            continue;
        }
        let Some(barcode) = cell(CanonicalColumn::SampleBarcodeId) else {
            skipped += 1;
            continue;
        };

        let storage_status = cell(CanonicalColumn::StorageStatus);
        let flags = options.status_markers.flags(storage_status.as_deref());
        let timepoint_raw = cell(CanonicalColumn::TimepointRaw);
        let timepoint = TimepointNormalizer::normalize(timepoint_raw.as_deref());

        rows.push(SampleRecord {
            sample_barcode_id: barcode,
            participant_id: cell(CanonicalColumn::ParticipantId),
            study_code: cell(CanonicalColumn::StudyCode),
            study_name: table.study_name.clone(),
            labvantage_sample_id: cell(CanonicalColumn::LabvantageSampleId),
            study_family_id: cell(CanonicalColumn::StudyFamilyId),
            storage_status,
            timepoint_raw,
            storage_unit_id: cell(CanonicalColumn::StorageUnitId),
            storage_location_path: cell(CanonicalColumn::StorageLocationPath),
            sample_type: cell(CanonicalColumn::SampleType)
                .and_then(|value| crate::domain::canonical_category(&value)),
            notes: cell(CanonicalColumn::Notes),
            additive: cell(CanonicalColumn::Additive),
            quantity: cell(CanonicalColumn::Quantity).and_then(|value| value.parse().ok()),
            quantity_units: cell(CanonicalColumn::QuantityUnits),
            timepoint_day: timepoint.day,
            timepoint_hour: timepoint.hour,
            timepoint_normalized: timepoint.normalized_label,
            is_pre_challenge: timepoint.is_pre_challenge,
            is_inoculation: timepoint.is_inoculation,
            is_post_challenge: timepoint.is_post_challenge,
            is_screening: timepoint.is_screening,
            is_available: flags.is_available,
            is_transferred: flags.is_transferred,
            source_file: table.source_name.clone(),
            source_row: first_row + rows.len(),
            harmonization_date: options.generated_at.clone(),
            harmonization_version: HARMONIZATION_VERSION.to_string(),
        });
    }

    Ok(HarmonizedTable { rows, skipped })
}

pub const DUPLICATE_NOTE: &str = "System export duplicate - same sample exported multiple times";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub sample_barcode_id: String,
    pub participant_id: Option<String>,
    pub study_code: Option<String>,
    pub timepoint_normalized: Option<String>,
    pub sample_type: Option<String>,
    pub storage_status: Option<String>,
    pub is_available: bool,
    pub is_transferred: bool,
    pub source_file: String,
    pub source_row: usize,
    pub duplicate_count: usize,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub clean: InventoryTable,
    pub duplicates: Vec<DuplicateRecord>,
    pub duplicate_barcodes: usize,
    pub removed: usize,
}

/// Keeps the first row of every barcode in input order and drops the rest.
///
/// Rows are stably ordered by `source_row` before grouping, so "first" means
/// first in the harmonized concatenation regardless of how the table was
/// assembled. No merging of duplicate rows is attempted.
pub fn deduplicate(inventory: &InventoryTable) -> DedupOutcome {
    let mut ordered: Vec<&SampleRecord> = inventory.rows().iter().collect();
    ordered.sort_by_key(|row| row.source_row);

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&SampleRecord>> = HashMap::new();
    for row in ordered {
        let barcode = row.sample_barcode_id.as_str();
        let group = groups.entry(barcode).or_default();
        if group.is_empty() {
            order.push(barcode);
        }
        group.push(row);
    }

    let mut clean = Vec::with_capacity(order.len());
    let mut duplicates = Vec::new();
    let mut duplicate_barcodes = 0;
    for barcode in order {
        let group = &groups[barcode];
        clean.push(group[0].clone());
        if group.len() > 1 {
            duplicate_barcodes += 1;
            duplicates.extend(group.iter().map(|row| DuplicateRecord {
                sample_barcode_id: row.sample_barcode_id.clone(),
                participant_id: row.participant_id.clone(),
                study_code: row.study_code.clone(),
                timepoint_normalized: row.timepoint_normalized.clone(),
                sample_type: row.sample_type.clone(),
                storage_status: row.storage_status.clone(),
                is_available: row.is_available,
                is_transferred: row.is_transferred,
                source_file: row.source_file.clone(),
                source_row: row.source_row,
                duplicate_count: group.len(),
                note: DUPLICATE_NOTE.to_string(),
            }));
        }
    }

    let removed = inventory.len() - clean.len();
    DedupOutcome {
        clean: InventoryTable::new(clean),
        duplicates,
        duplicate_barcodes,
        removed,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub study_code: String,
    pub samples: usize,
    pub participants: usize,
    pub sample_types: usize,
    pub available: usize,
    pub transferred: usize,
    pub min_day: Option<i64>,
    pub max_day: Option<i64>,
}

pub fn study_summaries(inventory: &InventoryTable) -> Vec<StudySummary> {
    let mut by_study: BTreeMap<&str, Vec<&SampleRecord>> = BTreeMap::new();
    for row in inventory.rows() {
        if let Some(code) = row.study_code.as_deref() {
            by_study.entry(code).or_default().push(row);
        }
    }

    by_study
        .into_iter()
        .map(|(code, rows)| StudySummary {
            study_code: code.to_string(),
            samples: rows.len(),
            participants: rows
                .iter()
                .filter_map(|row| row.participant_id.as_deref())
                .collect::<HashSet<_>>()
                .len(),
            sample_types: rows
                .iter()
                .filter_map(|row| row.sample_type.as_deref())
                .collect::<HashSet<_>>()
                .len(),
            available: rows.iter().filter(|row| row.is_available).count(),
            transferred: rows.iter().filter(|row| row.is_transferred).count(),
            min_day: rows.iter().filter_map(|row| row.study_day()).min(),
            max_day: rows.iter().filter_map(|row| row.study_day()).max(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub generated_at: String,
    pub total_samples: usize,
    pub missing_timepoint_day: usize,
    pub missing_storage_location: usize,
    pub missing_sample_type: usize,
    pub missing_quantity: usize,
    pub unparseable_timepoints: Vec<String>,
}

pub fn data_quality_report(inventory: &InventoryTable, generated_at: &str) -> DataQualityReport {
    let rows = inventory.rows();
    DataQualityReport {
        generated_at: generated_at.to_string(),
        total_samples: rows.len(),
        missing_timepoint_day: rows.iter().filter(|row| row.timepoint_day.is_none()).count(),
        missing_storage_location: rows
            .iter()
            .filter(|row| row.storage_location_path.is_none())
            .count(),
        missing_sample_type: rows.iter().filter(|row| row.sample_type.is_none()).count(),
        missing_quantity: rows.iter().filter(|row| row.quantity.is_none()).count(),
        unparseable_timepoints: inventory.unparsed_timepoints(),
    }
}
