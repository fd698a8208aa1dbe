use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::assays::AssayRecord;
use crate::config::DEFAULT_MISSING_FIELD_THRESHOLD;
use crate::ingest::StudyCount;
use crate::inventory::{InventoryTable, SampleRecord};
use crate::linkage::LinkageSet;
use crate::publications::Publication;

pub const MIN_PLAUSIBLE_DAY: i64 = -30;
pub const MAX_PLAUSIBLE_DAY: i64 = 365;
pub const MIN_TIMEPOINTS_PER_STUDY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    ReferentialIntegrity,
    Uniqueness,
    Completeness,
    Orphans,
    LogicalConsistency,
    CrossSource,
    TimepointConsistency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    PublicationStudyReference,
    AssayStudyReference,
    DuplicateBarcode,
    MissingParticipantId,
    StudyWithoutPublications,
    AssaysWithoutInventory,
    PublicationWithoutStudy,
    IllogicalStorageStatus,
    SampleCountMismatch,
    MissingFieldThreshold,
    TimepointDayRange,
    TimepointCoverage,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::PublicationStudyReference => "publication_study_reference",
            CheckKind::AssayStudyReference => "assay_study_reference",
            CheckKind::DuplicateBarcode => "duplicate_barcode",
            CheckKind::MissingParticipantId => "missing_participant_id",
            CheckKind::StudyWithoutPublications => "study_without_publications",
            CheckKind::AssaysWithoutInventory => "assays_without_inventory",
            CheckKind::PublicationWithoutStudy => "publication_without_study",
            CheckKind::IllogicalStorageStatus => "illogical_storage_status",
            CheckKind::SampleCountMismatch => "sample_count_mismatch",
            CheckKind::MissingFieldThreshold => "missing_field_threshold",
            CheckKind::TimepointDayRange => "timepoint_day_range",
            CheckKind::TimepointCoverage => "timepoint_coverage",
        }
    }

    pub fn category(&self) -> CheckCategory {
        match self {
            CheckKind::PublicationStudyReference | CheckKind::AssayStudyReference => {
                CheckCategory::ReferentialIntegrity
            }
            CheckKind::DuplicateBarcode => CheckCategory::Uniqueness,
            CheckKind::MissingParticipantId | CheckKind::MissingFieldThreshold => {
                CheckCategory::Completeness
            }
            CheckKind::StudyWithoutPublications
            | CheckKind::AssaysWithoutInventory
            | CheckKind::PublicationWithoutStudy => CheckCategory::Orphans,
            CheckKind::IllogicalStorageStatus => CheckCategory::LogicalConsistency,
            CheckKind::SampleCountMismatch => CheckCategory::CrossSource,
            CheckKind::TimepointDayRange | CheckKind::TimepointCoverage => {
                CheckCategory::TimepointConsistency
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: CheckCategory,
    pub check: CheckKind,
    pub entity: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(severity: Severity, check: CheckKind, entity: impl Into<String>, message: String) -> Self {
        Self {
            severity,
            category: check.category(),
            check,
            entity: entity.into(),
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pass => "PASS",
            ValidationStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub participant_id: f64,
    pub sample_type: f64,
    pub timepoint_normalized: f64,
    pub storage_location: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMetrics {
    pub total_samples: usize,
    pub studies: usize,
    pub participants: usize,
    pub sample_types: usize,
    pub completeness: Completeness,
    pub available: usize,
    pub transferred: usize,
    pub available_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationMetrics {
    pub total: usize,
    pub with_pmid: usize,
    pub with_study_code: usize,
    pub coverage_by_study: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayMetrics {
    pub total_records: usize,
    pub unique_assay_types: usize,
    pub total_samples_assayed: u64,
    pub studies_with_assays: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkageMetrics {
    pub pub_study_links: usize,
    pub studies_linked: usize,
    pub sample_pub_mappings: usize,
    pub multi_use_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub inventory: InventoryMetrics,
    pub publications: PublicationMetrics,
    pub assays: AssayMetrics,
    pub linkages: LinkageMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: String,
    pub status: ValidationStatus,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
    pub quality_metrics: QualityMetrics,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Pass
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
    }
}

pub struct ValidationInput<'a> {
    pub inventory: &'a InventoryTable,
    pub publications: &'a [Publication],
    pub assays: &'a [AssayRecord],
    pub linkage: &'a LinkageSet,
    pub study_counts: Option<&'a [StudyCount]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdField {
    ParticipantId,
    SampleType,
    TimepointNormalized,
    StorageLocationPath,
    StorageStatus,
    Quantity,
}

impl ThresholdField {
    pub const DEFAULT: [ThresholdField; 3] = [
        ThresholdField::SampleType,
        ThresholdField::TimepointNormalized,
        ThresholdField::StorageLocationPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdField::ParticipantId => "participant_id",
            ThresholdField::SampleType => "sample_type",
            ThresholdField::TimepointNormalized => "timepoint_normalized",
            ThresholdField::StorageLocationPath => "storage_location_path",
            ThresholdField::StorageStatus => "storage_status",
            ThresholdField::Quantity => "quantity",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ThresholdField::ParticipantId => "participant id",
            ThresholdField::SampleType => "sample type",
            ThresholdField::TimepointNormalized => "normalized timepoint",
            ThresholdField::StorageLocationPath => "storage location",
            ThresholdField::StorageStatus => "storage status",
            ThresholdField::Quantity => "quantity",
        }
    }

    pub fn is_missing(&self, row: &SampleRecord) -> bool {
        match self {
            ThresholdField::ParticipantId => row.participant_id.is_none(),
            ThresholdField::SampleType => row.sample_type.is_none(),
            ThresholdField::TimepointNormalized => row.timepoint_normalized.is_none(),
            ThresholdField::StorageLocationPath => row.storage_location_path.is_none(),
            ThresholdField::StorageStatus => row.storage_status.is_none(),
            ThresholdField::Quantity => row.quantity.is_none(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub missing_field_threshold: f64,
    pub missing_fields: Vec<ThresholdField>,
    pub generated_at: String,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            missing_field_threshold: DEFAULT_MISSING_FIELD_THRESHOLD,
            missing_fields: ThresholdField::DEFAULT.to_vec(),
            generated_at: String::new(),
        }
    }
}

pub fn validate(input: &ValidationInput<'_>, options: &ValidationOptions) -> ValidationReport {
    let mut issues = Vec::new();
    let inventory_studies = input.inventory.study_codes();

    check_references(input, &inventory_studies, &mut issues);
    check_uniqueness(input.inventory, &mut issues);
    check_completeness(input.inventory, &mut issues);
    check_orphans(input, &inventory_studies, &mut issues);
    check_storage_status(input.inventory, &mut issues);
    check_counts(input, &mut issues);
    check_missing_fields(input.inventory, options, &mut issues);
    check_timepoints(input.inventory, &mut issues);

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut info = Vec::new();
    for issue in issues {
        match issue.severity {
            Severity::Error => errors.push(issue),
            Severity::Warning => warnings.push(issue),
            Severity::Info => info.push(issue),
        }
    }

    let status = if errors.is_empty() {
        ValidationStatus::Pass
    } else {
        ValidationStatus::Fail
    };
    tracing::info!(
        status = status.as_str(),
        errors = errors.len(),
        warnings = warnings.len(),
        "validation complete"
    );

    ValidationReport {
        generated_at: options.generated_at.clone(),
        status,
        total_errors: errors.len(),
        total_warnings: warnings.len(),
        errors,
        warnings,
        info,
        quality_metrics: quality_metrics(input),
    }
}

fn assay_studies(assays: &[AssayRecord]) -> BTreeSet<String> {
    assays
        .iter()
        .filter_map(|assay| assay.study())
        .map(|code| code.as_str().to_string())
        .collect()
}

fn publication_studies(publications: &[Publication]) -> BTreeSet<String> {
    publications
        .iter()
        .filter_map(Publication::primary_study_code)
        .map(|code| code.as_str().to_string())
        .collect()
}

fn check_references(
    input: &ValidationInput<'_>,
    inventory_studies: &BTreeSet<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    for code in publication_studies(input.publications).difference(inventory_studies) {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            CheckKind::PublicationStudyReference,
            code.as_str(),
            format!("publications reference study code {code} which is not in the inventory"),
        ));
    }
    for code in assay_studies(input.assays).difference(inventory_studies) {
        issues.push(ValidationIssue::new(
            Severity::Error,
            CheckKind::AssayStudyReference,
            code.as_str(),
            format!("assays reference study code {code} which is not in the inventory"),
        ));
    }
}

fn check_uniqueness(inventory: &InventoryTable, issues: &mut Vec<ValidationIssue>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in inventory.rows() {
        *counts.entry(row.sample_barcode_id.as_str()).or_default() += 1;
    }
    for (barcode, count) in counts.into_iter().filter(|(_, count)| *count > 1) {
        issues.push(ValidationIssue::new(
            Severity::Error,
            CheckKind::DuplicateBarcode,
            barcode,
            format!("barcode {barcode} appears {count} times after deduplication"),
        ));
    }
}

fn check_completeness(inventory: &InventoryTable, issues: &mut Vec<ValidationIssue>) {
    for row in inventory.rows().iter().filter(|row| row.participant_id.is_none()) {
        issues.push(ValidationIssue::new(
            Severity::Error,
            CheckKind::MissingParticipantId,
            row.sample_barcode_id.as_str(),
            format!("sample {} has no participant id", row.sample_barcode_id),
        ));
    }
}

fn check_orphans(
    input: &ValidationInput<'_>,
    inventory_studies: &BTreeSet<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    let cited = publication_studies(input.publications);
    for code in inventory_studies.difference(&cited) {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            CheckKind::StudyWithoutPublications,
            code.as_str(),
            format!("study {code} has samples but no associated publications"),
        ));
    }
    for code in assay_studies(input.assays).difference(inventory_studies) {
        issues.push(ValidationIssue::new(
            Severity::Error,
            CheckKind::AssaysWithoutInventory,
            code.as_str(),
            format!("study {code} has assay records but no inventory rows"),
        ));
    }
    for publication in input
        .publications
        .iter()
        .filter(|publication| publication.primary_study_code().is_none())
    {
        let title = crate::domain::truncate_chars(publication.title_or_unknown(), 80);
        issues.push(ValidationIssue::new(
            Severity::Warning,
            CheckKind::PublicationWithoutStudy,
            title.clone(),
            format!("publication \"{title}\" is not assigned to any study"),
        ));
    }
}

fn check_storage_status(inventory: &InventoryTable, issues: &mut Vec<ValidationIssue>) {
    for row in inventory
        .rows()
        .iter()
        .filter(|row| row.is_available && row.is_transferred)
    {
        issues.push(ValidationIssue::new(
            Severity::Error,
            CheckKind::IllogicalStorageStatus,
            row.sample_barcode_id.as_str(),
            format!(
                "sample {} is marked both available and transferred (status: {})",
                row.sample_barcode_id,
                row.storage_status.as_deref().unwrap_or("")
            ),
        ));
    }
}

fn check_counts(input: &ValidationInput<'_>, issues: &mut Vec<ValidationIssue>) {
    let recorded: Vec<(String, u64)> = match input.study_counts {
        Some(counts) => counts
            .iter()
            .map(|count| (count.study_code.clone(), count.total_samples))
            .collect(),
        None => input
            .linkage
            .cross_reference
            .iter()
            .map(|row| (row.study_code.clone(), row.total_samples as u64))
            .collect(),
    };

    let actual: HashMap<&str, usize> = input
        .inventory
        .by_study()
        .into_iter()
        .map(|(code, rows)| (code, rows.len()))
        .collect();

    for (code, expected) in recorded {
        let found = actual.get(code.as_str()).copied().unwrap_or(0) as u64;
        if found != expected {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                CheckKind::SampleCountMismatch,
                code.as_str(),
                format!(
                    "{code}: cross-reference shows {expected} samples, inventory has {found} (difference {})",
                    found.abs_diff(expected)
                ),
            ));
        }
    }
}

fn check_missing_fields(
    inventory: &InventoryTable,
    options: &ValidationOptions,
    issues: &mut Vec<ValidationIssue>,
) {
    if inventory.is_empty() {
        return;
    }
    let total = inventory.len() as f64;
    for field in &options.missing_fields {
        let missing = inventory
            .rows()
            .iter()
            .filter(|row| field.is_missing(row))
            .count();
        let fraction = missing as f64 / total;
        if fraction > options.missing_field_threshold {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                CheckKind::MissingFieldThreshold,
                field.as_str(),
                format!(
                    "{missing} samples ({:.1}%) missing {}",
                    fraction * 100.0,
                    field.description()
                ),
            ));
        }
    }
}

fn check_timepoints(inventory: &InventoryTable, issues: &mut Vec<ValidationIssue>) {
    for row in inventory.rows() {
        let Some(day) = row.study_day() else {
            continue;
        };
        if !(MIN_PLAUSIBLE_DAY..=MAX_PLAUSIBLE_DAY).contains(&day) {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                CheckKind::TimepointDayRange,
                row.sample_barcode_id.as_str(),
                format!(
                    "sample {} has unusual timepoint day {day} (outside {MIN_PLAUSIBLE_DAY}..={MAX_PLAUSIBLE_DAY})",
                    row.sample_barcode_id
                ),
            ));
        }
    }

    let by_study = inventory.by_study();
    for code in inventory.study_codes_in_order() {
        let distinct = by_study
            .get(code.as_str())
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.timepoint_normalized.as_deref())
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0);
        if distinct < MIN_TIMEPOINTS_PER_STUDY {
            issues.push(ValidationIssue::new(
                Severity::Info,
                CheckKind::TimepointCoverage,
                code.as_str(),
                format!("{code}: only {distinct} distinct timepoints"),
            ));
        }
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn quality_metrics(input: &ValidationInput<'_>) -> QualityMetrics {
    let rows = input.inventory.rows();
    let total = rows.len();
    let present =
        |has_field: fn(&SampleRecord) -> bool| rows.iter().filter(|row| has_field(row)).count();
    let available = present(|row| row.is_available);

    let inventory = InventoryMetrics {
        total_samples: total,
        studies: input.inventory.study_codes().len(),
        participants: input.inventory.distinct_participants(),
        sample_types: rows
            .iter()
            .filter_map(|row| row.sample_type.as_deref())
            .collect::<HashSet<_>>()
            .len(),
        completeness: Completeness {
            participant_id: percent(present(|row| row.participant_id.is_some()), total),
            sample_type: percent(present(|row| row.sample_type.is_some()), total),
            timepoint_normalized: percent(
                present(|row| row.timepoint_normalized.is_some()),
                total,
            ),
            storage_location: percent(present(|row| row.storage_location_path.is_some()), total),
        },
        available,
        transferred: present(|row| row.is_transferred),
        available_pct: percent(available, total),
    };

    let mut coverage_by_study = BTreeMap::new();
    for link in &input.linkage.publication_study {
        *coverage_by_study.entry(link.study_code.clone()).or_default() += 1;
    }
    let publications = PublicationMetrics {
        total: input.publications.len(),
        with_pmid: input
            .publications
            .iter()
            .filter(|publication| publication.pmid().is_some())
            .count(),
        with_study_code: input
            .publications
            .iter()
            .filter(|publication| publication.primary_study_code().is_some())
            .count(),
        coverage_by_study,
    };

    let assays = AssayMetrics {
        total_records: input.assays.len(),
        unique_assay_types: input
            .assays
            .iter()
            .map(|assay| assay.assay_type.as_str())
            .collect::<HashSet<_>>()
            .len(),
        total_samples_assayed: input.assays.iter().map(|assay| assay.sample_count).sum(),
        studies_with_assays: assay_studies(input.assays).len(),
    };

    let linkages = LinkageMetrics {
        pub_study_links: input.linkage.publication_study.len(),
        studies_linked: input
            .linkage
            .publication_study
            .iter()
            .map(|link| link.study_code.as_str())
            .collect::<HashSet<_>>()
            .len(),
        sample_pub_mappings: input.linkage.sample_publication.len(),
        multi_use_samples: input.linkage.multi_use.len(),
    };

    QualityMetrics {
        inventory,
        publications,
        assays,
        linkages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(barcode: &str, study: &str) -> SampleRecord {
        SampleRecord {
            sample_barcode_id: barcode.to_string(),
            participant_id: Some("P1".to_string()),
            study_code: Some(study.to_string()),
            sample_type: Some("serum".to_string()),
            timepoint_normalized: Some("Day 1".to_string()),
            timepoint_day: Some(1),
            storage_location_path: Some("Freezer 1".to_string()),
            ..SampleRecord::default()
        }
    }

    fn run(inventory: &InventoryTable) -> ValidationReport {
        let linkage = LinkageSet::default();
        let input = ValidationInput {
            inventory,
            publications: &[],
            assays: &[],
            linkage: &linkage,
            study_counts: None,
        };
        validate(&input, &ValidationOptions::default())
    }

    #[test]
    fn duplicate_barcode_after_dedup_is_error() {
        let inventory = InventoryTable::new(vec![sample("B1", "A"), sample("B1", "A")]);
        let report = run(&inventory);
        let duplicates = report
            .errors
            .iter()
            .filter(|issue| issue.check == CheckKind::DuplicateBarcode)
            .count();
        assert_eq!(duplicates, 1);
        assert_eq!(report.status, ValidationStatus::Fail);
    }

    #[test]
    fn out_of_range_day_is_warning_and_screening_is_ignored() {
        let mut late = sample("B1", "A");
        late.timepoint_day = Some(400);
        let mut screening = sample("B2", "A");
        screening.timepoint_day = Some(crate::timepoint::SCREENING_DAY);
        let report = run(&InventoryTable::new(vec![late, screening]));
        let flagged = report
            .warnings
            .iter()
            .filter(|issue| issue.check == CheckKind::TimepointDayRange)
            .map(|issue| issue.entity.as_str())
            .collect::<Vec<_>>();
        assert_eq!(flagged, vec!["B1"]);
        assert!(report.passed());
    }

    #[test]
    fn sparse_study_timepoints_are_info_only() {
        let report = run(&InventoryTable::new(vec![sample("B1", "A")]));
        assert_eq!(report.info.len(), 1);
        assert_eq!(report.info[0].check, CheckKind::TimepointCoverage);
        assert!(report.passed());
    }
}
