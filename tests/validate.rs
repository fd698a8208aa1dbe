use assert_matches::assert_matches;
use biobank_curator::assays::AssayRecord;
use biobank_curator::ingest::StudyCount;
use biobank_curator::inventory::{InventoryTable, SampleRecord};
use biobank_curator::linkage::build_linkage;
use biobank_curator::publications::Publication;
use biobank_curator::validate::{
    CheckCategory, CheckKind, Severity, ThresholdField, ValidationInput, ValidationIssue,
    ValidationOptions, ValidationReport, ValidationStatus, validate,
};

fn sample(barcode: &str, study: &str, day: i64) -> SampleRecord {
    SampleRecord {
        sample_barcode_id: barcode.to_string(),
        participant_id: Some(format!("P-{barcode}")),
        study_code: Some(study.to_string()),
        sample_type: Some("serum".to_string()),
        storage_status: Some("In Circulation".to_string()),
        storage_location_path: Some("Freezer 1".to_string()),
        timepoint_day: Some(day),
        timepoint_normalized: Some(format!("Day {day}")),
        is_available: true,
        ..SampleRecord::default()
    }
}

fn clean_inventory() -> InventoryTable {
    InventoryTable::new(vec![
        sample("B1", "A", -1),
        sample("B2", "A", 0),
        sample("B3", "A", 3),
    ])
}

fn publication(title: &str, study: &str) -> Publication {
    Publication {
        title: Some(title.to_string()),
        pmid: Some("123".to_string()),
        biobank_study_code: Some(study.to_string()),
        ..Publication::default()
    }
}

fn assay(study: &str) -> AssayRecord {
    AssayRecord {
        study_code: Some(study.to_string()),
        study_name: None,
        assay_type: "cytof".to_string(),
        sample_count: 10,
        subject_range: "1-10".to_string(),
        timepoints: "Day 0".to_string(),
        data_key: "K".to_string(),
        comment: String::new(),
    }
}

fn run(
    inventory: &InventoryTable,
    publications: &[Publication],
    assays: &[AssayRecord],
    study_counts: Option<&[StudyCount]>,
) -> ValidationReport {
    let linkage = build_linkage(inventory, publications, assays);
    let input = ValidationInput {
        inventory,
        publications,
        assays,
        linkage: &linkage,
        study_counts,
    };
    validate(&input, &ValidationOptions::default())
}

fn issues_of(report: &ValidationReport, check: CheckKind) -> Vec<&ValidationIssue> {
    report.issues().filter(|issue| issue.check == check).collect()
}

#[test]
fn consistent_inputs_pass() {
    let report = run(
        &clean_inventory(),
        &[publication("Flu", "A")],
        &[assay("A")],
        None,
    );
    assert_eq!(report.status, ValidationStatus::Pass);
    assert_eq!(report.total_errors, 0);
    assert_eq!(report.total_warnings, 0);
    assert!(report.info.is_empty());
    assert_eq!(report.quality_metrics.inventory.total_samples, 3);
    assert_eq!(report.quality_metrics.linkages.pub_study_links, 1);
}

#[test]
fn assays_for_unknown_study_fail_once_per_study() {
    let report = run(
        &clean_inventory(),
        &[publication("Flu", "A")],
        &[assay("A"), assay("Q"), assay("Q")],
        None,
    );
    assert!(!report.passed());

    let orphans = issues_of(&report, CheckKind::AssaysWithoutInventory);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].severity, Severity::Error);
    assert_eq!(orphans[0].entity, "Q");
    assert_eq!(orphans[0].category, CheckCategory::Orphans);

    let references = issues_of(&report, CheckKind::AssayStudyReference);
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].entity, "Q");
}

#[test]
fn publication_for_unknown_study_is_a_warning() {
    let report = run(
        &clean_inventory(),
        &[publication("Flu", "A"), publication("Elsewhere", "Z")],
        &[assay("A")],
        None,
    );
    assert!(report.passed());

    let references = issues_of(&report, CheckKind::PublicationStudyReference);
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].severity, Severity::Warning);
    assert_eq!(references[0].entity, "Z");
}

#[test]
fn available_and_transferred_is_an_error() {
    let mut rows = clean_inventory().into_rows();
    rows[1].storage_status = Some("In Circulation; 3rd Party Transfer".to_string());
    rows[1].is_transferred = true;
    let report = run(
        &InventoryTable::new(rows),
        &[publication("Flu", "A")],
        &[],
        None,
    );

    assert_eq!(report.status, ValidationStatus::Fail);
    let illogical = issues_of(&report, CheckKind::IllogicalStorageStatus);
    assert_eq!(illogical.len(), 1);
    assert_eq!(illogical[0].entity, "B2");
    assert_eq!(report.total_errors, 1);
}

#[test]
fn duplicates_and_missing_participants_are_errors() {
    let mut rows = clean_inventory().into_rows();
    rows.push(sample("B1", "A", 7));
    rows[2].participant_id = None;
    let report = run(&InventoryTable::new(rows), &[publication("Flu", "A")], &[], None);

    let duplicates = issues_of(&report, CheckKind::DuplicateBarcode);
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].entity, "B1");
    let missing = issues_of(&report, CheckKind::MissingParticipantId);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].entity, "B3");
}

#[test]
fn orphan_studies_and_publications_warn() {
    let mut rows = clean_inventory().into_rows();
    rows.push(sample("C1", "C", 1));
    let unassigned = Publication {
        title: Some("Methods note".to_string()),
        biobank_study_code: Some("N/A".to_string()),
        ..Publication::default()
    };
    let report = run(
        &InventoryTable::new(rows),
        &[publication("Flu", "A"), unassigned],
        &[],
        None,
    );

    let studies = issues_of(&report, CheckKind::StudyWithoutPublications);
    assert_eq!(studies.len(), 1);
    assert_eq!(studies[0].entity, "C");
    let publications = issues_of(&report, CheckKind::PublicationWithoutStudy);
    assert_eq!(publications.len(), 1);
    assert_eq!(publications[0].entity, "Methods note");
    assert!(report.passed());
}

#[test]
fn external_counts_are_compared_per_study() {
    let counts = vec![
        StudyCount {
            study_code: "A".to_string(),
            total_samples: 5,
        },
        StudyCount {
            study_code: "B".to_string(),
            total_samples: 0,
        },
    ];
    let report = run(
        &clean_inventory(),
        &[publication("Flu", "A")],
        &[],
        Some(counts.as_slice()),
    );

    let mismatches = issues_of(&report, CheckKind::SampleCountMismatch);
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].entity, "A");
    assert!(mismatches[0].message.contains("difference 2"));
}

#[test]
fn sparse_fields_and_odd_days_warn() {
    let mut rows = clean_inventory().into_rows();
    rows[0].storage_location_path = None;
    rows[2].timepoint_day = Some(400);
    let report = run(&InventoryTable::new(rows), &[publication("Flu", "A")], &[], None);

    let sparse = issues_of(&report, CheckKind::MissingFieldThreshold);
    assert_eq!(sparse.len(), 1);
    assert_eq!(sparse[0].entity, "storage_location_path");
    let days = issues_of(&report, CheckKind::TimepointDayRange);
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].entity, "B3");
    assert!(report.passed());
}

#[test]
fn few_timepoints_is_informational() {
    let inventory = InventoryTable::new(vec![sample("B1", "A", 1), sample("B2", "A", 1)]);
    let report = run(&inventory, &[publication("Flu", "A")], &[], None);

    assert_matches!(
        report.info.as_slice(),
        [issue] if issue.check == CheckKind::TimepointCoverage && issue.severity == Severity::Info
    );
    assert!(report.passed());
}

#[test]
fn missing_field_checks_follow_options() {
    let mut rows = clean_inventory().into_rows();
    rows[0].storage_location_path = None;
    let inventory = InventoryTable::new(rows);
    let publications = [publication("Flu", "A")];
    let linkage = build_linkage(&inventory, &publications, &[]);
    let input = ValidationInput {
        inventory: &inventory,
        publications: &publications,
        assays: &[],
        linkage: &linkage,
        study_counts: None,
    };

    let quantity_only = ValidationOptions {
        missing_fields: vec![ThresholdField::Quantity],
        ..ValidationOptions::default()
    };
    let report = validate(&input, &quantity_only);
    let sparse = issues_of(&report, CheckKind::MissingFieldThreshold);
    assert_eq!(sparse.len(), 1);
    assert_eq!(sparse[0].entity, "quantity");
    assert!(sparse[0].message.contains("3 samples (100.0%) missing quantity"));

    let none = ValidationOptions {
        missing_fields: Vec::new(),
        ..ValidationOptions::default()
    };
    let report = validate(&input, &none);
    assert!(issues_of(&report, CheckKind::MissingFieldThreshold).is_empty());
}
