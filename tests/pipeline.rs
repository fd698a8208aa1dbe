use std::fs;
use std::path::Path;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use biobank_curator::app::{App, FixedClock, ProgressEvent, ProgressSink};
use biobank_curator::config::{Config, ConfigLoader, InventoryEntry, ResolvedConfig};
use biobank_curator::error::CuratorError;
use biobank_curator::inventory::CanonicalColumn;
use biobank_curator::validate::{CheckKind, Severity};

const GENERATED_AT: &str = "2024-03-01T12:00:00";
const TIMEPOINTS: [&str; 3] = ["Baseline -24 hours (Day -1)", "Day 0", "72 hours (Day 3)"];

struct NullSink;

impl ProgressSink for NullSink {
    fn event(&self, _event: ProgressEvent) {}
}

fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// Writes a LIMS export with `rows` samples for `study`. Barcodes are
/// `{study}-{index}`; `duplicate` repeats the first barcode on the last row.
fn write_inventory(dir: &Path, study: &str, rows: usize, duplicate: bool) -> String {
    let path = dir.join(format!("LV_{study}_Study {study}_Full Inventory.csv"));
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record(CanonicalColumn::ALL.iter().map(|column| column.export_header()))
        .unwrap();
    for index in 0..rows {
        let barcode_index = if duplicate && index == rows - 1 { 0 } else { index };
        let record = CanonicalColumn::ALL
            .iter()
            .map(|column| match column {
                CanonicalColumn::ParticipantId => format!("{study}-P{}", index % 20),
                CanonicalColumn::SampleBarcodeId => format!("{study}-{barcode_index:04}"),
                CanonicalColumn::StudyCode => study.to_string(),
                CanonicalColumn::StorageStatus => "In Circulation".to_string(),
                CanonicalColumn::TimepointRaw => TIMEPOINTS[index % TIMEPOINTS.len()].to_string(),
                CanonicalColumn::StorageLocationPath => format!("Freezer {study} > Box {}", index / 81),
                CanonicalColumn::SampleType => "Serum".to_string(),
                CanonicalColumn::Quantity => "0.5".to_string(),
                CanonicalColumn::QuantityUnits => "mL".to_string(),
                _ => String::new(),
            })
            .collect::<Vec<_>>();
        writer.write_record(&record).unwrap();
    }
    writer.flush().unwrap();
    path.to_string_lossy().into_owned()
}

fn write_assays(dir: &Path, studies: &[&str]) -> String {
    let path = dir.join("assay_tracking.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record([
            "biobank_study_code",
            "Study",
            "Assay",
            "Keys",
            "Samples",
            "Subject ID ranges",
            "Timepoint(s)",
            "Comment",
        ])
        .unwrap();
    for study in studies {
        writer
            .write_record([*study, "", "Bulk RNA-seq", "K-1", "48", "1-20", "Day 0", ""])
            .unwrap();
    }
    writer.flush().unwrap();
    path.to_string_lossy().into_owned()
}

fn write_publications(dir: &Path, studies: &[&str]) -> String {
    let path = dir.join("publications.json");
    let publications = studies
        .iter()
        .enumerate()
        .map(|(index, study)| {
            json!({
                "pmid": 30000000 + index,
                "title": format!("Host response in study {study}"),
                "first_author": "Woods CW",
                "journal": "J Infect Dis",
                "year": 2020,
                "biobank_study_code": study,
            })
        })
        .collect::<Vec<_>>();
    fs::write(&path, json!({ "publications": publications }).to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

fn config(dir: &Path, publication_studies: &[&str]) -> ResolvedConfig {
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();
    let inventory = vec![
        write_inventory(&raw, "A", 200, true),
        write_inventory(&raw, "B", 150, false),
        write_inventory(&raw, "C", 50, false),
    ];
    let config = Config {
        inventory: inventory.into_iter().map(InventoryEntry::Shorthand).collect(),
        publications: Some(write_publications(&raw, publication_studies)),
        assays: Some(write_assays(&raw, &["A", "B", "C"])),
        output_dir: Some(dir.join("processed").to_string_lossy().into_owned()),
        ..Config::default()
    };
    ConfigLoader::resolve_config(config).unwrap()
}

#[test]
fn full_pipeline_links_and_passes() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(
        config(dir.path(), &["A"]),
        FixedClock(GENERATED_AT.to_string()),
    );

    let result = app.run_all(&NullSink).unwrap();

    assert_eq!(result.harmonize.rows, 400);
    assert_eq!(result.harmonize.sources_processed, 3);
    assert!(result.harmonize.source_errors.is_empty());
    assert!(result.harmonize.unparsed_timepoints.is_empty());

    assert_eq!(result.deduplicate.input_rows, 400);
    assert_eq!(result.deduplicate.output_rows, 399);
    assert_eq!(result.deduplicate.duplicate_barcodes, 1);

    assert_eq!(result.link.publication_study_links, 1);
    assert_eq!(result.link.publication_assay_links, 1);
    assert_eq!(result.link.sample_publication_links, 199);
    assert_eq!(result.link.multi_use_samples, 0);
    assert_eq!(result.link.provenance_chains, 3);

    let report = &result.validate.report;
    assert!(result.validate.passed());
    assert_eq!(report.total_errors, 0);
    assert!(
        report
            .warnings
            .iter()
            .all(|issue| issue.check == CheckKind::StudyWithoutPublications)
    );
    assert_eq!(report.total_warnings, 2);

    assert_eq!(result.export.samples, 399);
    assert_eq!(result.export.publications, 1);

    let outputs = [
        &result.harmonize.outputs,
        &result.deduplicate.outputs,
        &result.link.outputs,
        &result.validate.outputs,
        &result.export.outputs,
    ];
    for path in outputs.into_iter().flatten() {
        assert!(Path::new(path).exists(), "missing output {path}");
    }
}

#[test]
fn publication_for_unknown_study_warns_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(
        config(dir.path(), &["A", "Z"]),
        FixedClock(GENERATED_AT.to_string()),
    );

    let result = app.run_all(&NullSink).unwrap();
    let report = &result.validate.report;
    assert!(report.passed());
    assert!(report.warnings.iter().any(|issue| {
        issue.check == CheckKind::PublicationStudyReference
            && issue.severity == Severity::Warning
            && issue.entity == "Z"
    }));
    assert_eq!(result.link.publication_study_links, 1);
    assert_eq!(result.link.publication_assay_links, 2);
    assert!(app.layout().validation_summary().as_std_path().exists());
}

#[test]
fn harmonize_output_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(
        config(dir.path(), &["A"]),
        FixedClock(GENERATED_AT.to_string()),
    );

    app.harmonize(&NullSink).unwrap();
    let first = fs::read(app.layout().harmonized_csv().as_std_path()).unwrap();
    app.harmonize(&NullSink).unwrap();
    let second = fs::read(app.layout().harmonized_csv().as_std_path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn unreadable_source_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), &["A"]);
    config.inventory.push(biobank_curator::config::InventorySource {
        path: utf8(&dir.path().join("raw/LV_Q_Gone_Full Inventory.csv")),
        study_name: None,
    });
    let app = App::new(config, FixedClock(GENERATED_AT.to_string()));

    let result = app.harmonize(&NullSink).unwrap();
    assert_eq!(result.rows, 400);
    assert_eq!(result.source_errors.len(), 1);
    assert!(result.source_errors[0].source.ends_with("LV_Q_Gone_Full Inventory.csv"));
}

#[test]
fn link_before_dedup_reports_missing_stage_input() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(
        config(dir.path(), &["A"]),
        FixedClock(GENERATED_AT.to_string()),
    );

    app.harmonize(&NullSink).unwrap();
    let err = app.link(&NullSink).unwrap_err();
    assert_matches!(err, CuratorError::MissingStageInput(_));
}

#[test]
fn shared_title_links_every_cited_study() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["A"]);
    let publications = json!([
        { "pmid": 111, "title": "Shared paper", "year": 2018, "biobank_study_code": "A" },
        { "pmid": 111, "title": "Shared paper", "year": 2018, "biobank_study_code": "B",
          "abstract": "Host transcriptomics across two challenge cohorts." }
    ]);
    fs::write(
        config.publications.as_ref().unwrap().as_std_path(),
        publications.to_string(),
    )
    .unwrap();
    let app = App::new(config, FixedClock(GENERATED_AT.to_string()));

    let result = app.run_all(&NullSink).unwrap();
    assert_eq!(result.link.publications, 2);
    assert_eq!(result.link.publication_study_links, 2);
    assert_eq!(result.link.publication_assay_links, 2);
    assert_eq!(result.link.sample_publication_links, 199 + 150);

    let without_publications = result
        .validate
        .report
        .warnings
        .iter()
        .filter(|issue| issue.check == CheckKind::StudyWithoutPublications)
        .map(|issue| issue.entity.as_str())
        .collect::<Vec<_>>();
    assert_eq!(without_publications, vec!["C"]);

    assert_eq!(result.export.publications, 1);
    assert_eq!(result.export.merged_publication_titles, 1);
}

#[test]
fn dedup_writes_correction_lists() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), &["A"]);
    let path = dir.path().join("raw/LV_D_Study D_Full Inventory.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record(CanonicalColumn::ALL.iter().map(|column| column.export_header()))
        .unwrap();
    let rows = [
        ("D-1", "Day 400", "Freezer D"),
        ("D-2", "Screening", "Freezer D"),
        ("D-3", "Day 0", ""),
    ];
    for (barcode, timepoint, location) in rows {
        let record = CanonicalColumn::ALL
            .iter()
            .map(|column| match column {
                CanonicalColumn::ParticipantId => "D-P1",
                CanonicalColumn::SampleBarcodeId => barcode,
                CanonicalColumn::StudyCode => "D",
                CanonicalColumn::StorageStatus => "In Circulation",
                CanonicalColumn::TimepointRaw => timepoint,
                CanonicalColumn::StorageLocationPath => location,
                CanonicalColumn::SampleType => "Serum",
                _ => "",
            })
            .collect::<Vec<_>>();
        writer.write_record(&record).unwrap();
    }
    writer.flush().unwrap();
    config.inventory.push(biobank_curator::config::InventorySource {
        path: utf8(&path),
        study_name: None,
    });
    let app = App::new(config, FixedClock(GENERATED_AT.to_string()));

    app.harmonize(&NullSink).unwrap();
    let result = app.deduplicate(&NullSink).unwrap();
    assert_eq!(result.unusual_timepoint_samples, 1);
    assert_eq!(result.missing_storage_samples, 1);

    let unusual = fs::read_to_string(app.layout().unusual_timepoints().as_std_path()).unwrap();
    let mut lines = unusual.lines();
    assert!(lines.next().unwrap().starts_with("sample_barcode_id,study_code,"));
    assert!(lines.next().unwrap().contains("D-1,D,Day 400"));
    assert_eq!(lines.next(), None);

    let missing = fs::read_to_string(app.layout().missing_storage().as_std_path()).unwrap();
    assert!(missing.contains("D-3,D,"));
    assert!(missing.contains("Missing storage location,Available but location missing"));
    assert!(app.layout().unparsed_timepoints().as_std_path().exists());
}
