use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::assays::{AssayRecord, load_assays};
use crate::config::ResolvedConfig;
use crate::corrections::{
    missing_storage_samples, unparsed_timepoint_counts, unusual_timepoint_samples,
};
use crate::dashboard::build_dashboard;
use crate::error::CuratorError;
use crate::ingest::{SourceError, StudyCount, load_inventory_source, read_study_counts};
use crate::inventory::{
    ColumnMap, HarmonizeOptions, InventoryTable, data_quality_report, deduplicate, harmonize,
    study_summaries,
};
use crate::linkage::{CompleteLinkage, LinkageSet, ProvenanceDocument, build_linkage};
use crate::publications::{Publication, consolidate, load_publications};
use crate::report::{duplicate_explanation, validation_summary};
use crate::store::{OutputLayout, Store};
use crate::validate::{ValidationInput, ValidationOptions, ValidationReport, validate};

#[derive(Debug, Clone, Serialize)]
pub struct HarmonizeResult {
    pub sources_processed: usize,
    pub source_errors: Vec<SourceError>,
    pub rows: usize,
    pub skipped_rows: usize,
    pub studies: usize,
    pub unparsed_timepoints: Vec<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupResult {
    pub input_rows: usize,
    pub output_rows: usize,
    pub duplicate_barcodes: usize,
    pub removed_rows: usize,
    pub unusual_timepoint_samples: usize,
    pub missing_storage_samples: usize,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkResult {
    pub publications: usize,
    pub assays: usize,
    pub publication_study_links: usize,
    pub publication_assay_links: usize,
    pub sample_publication_links: usize,
    pub multi_use_samples: usize,
    pub provenance_chains: usize,
    pub unlinked_publications: Vec<String>,
    pub warnings: Vec<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateResult {
    pub report: ValidationReport,
    pub outputs: Vec<String>,
}

impl ValidateResult {
    pub fn passed(&self) -> bool {
        self.report.passed()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub samples: usize,
    pub publications: usize,
    pub merged_publication_titles: usize,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub harmonize: HarmonizeResult,
    pub deduplicate: DedupResult,
    pub link: LinkResult,
    pub validate: ValidateResult,
    pub export: ExportResult,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub trait Clock {
    fn now(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        chrono::Local::now()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl Clock for FixedClock {
    fn now(&self) -> String {
        self.0.clone()
    }
}

struct LinkInputs {
    inventory: InventoryTable,
    publications: Vec<Publication>,
    assays: Vec<AssayRecord>,
}

#[derive(Clone)]
pub struct App<C: Clock> {
    config: ResolvedConfig,
    layout: OutputLayout,
    clock: C,
}

impl App<SystemClock> {
    pub fn from_config(config: ResolvedConfig) -> Self {
        Self::new(config, SystemClock)
    }
}

impl<C: Clock> App<C> {
    pub fn new(config: ResolvedConfig, clock: C) -> Self {
        let layout = OutputLayout::new(config.output_dir.clone());
        Self {
            config,
            layout,
            clock,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn harmonize(&self, sink: &dyn ProgressSink) -> Result<HarmonizeResult, CuratorError> {
        let started = Instant::now();
        let generated_at = self.clock.now();

        let mut tables = Vec::new();
        let mut source_errors = Vec::new();
        for source in &self.config.inventory {
            sink.event(ProgressEvent {
                message: format!("phase=Harmonize; reading {}", source.path),
                elapsed: None,
            });
            match load_inventory_source(source) {
                Ok(table) => tables.push(table),
                Err(err) => {
                    tracing::warn!(source = %source.path, error = %err, "skipping unreadable source");
                    source_errors.push(SourceError::new(source.path.as_str(), &err));
                }
            }
        }

        let options = HarmonizeOptions {
            columns: ColumnMap::new(&self.config.column_aliases),
            status_markers: self.config.status_markers.clone(),
            generated_at: generated_at.clone(),
        };
        let outcome = harmonize(&tables, &options);
        source_errors.extend(outcome.source_errors);
        let inventory = outcome.inventory;

        let unparsed = inventory.unparsed_timepoints();
        if !unparsed.is_empty() {
            tracing::warn!(count = unparsed.len(), "timepoints matched no known pattern");
        }

        let layout = &self.layout;
        Store::write_csv(&layout.harmonized_csv(), inventory.rows())?;
        Store::write_inventory_parquet(&layout.harmonized_parquet(), &inventory)?;
        Store::write_csv(&layout.study_summary(), &study_summaries(&inventory))?;
        Store::write_json(
            &layout.quality_report(),
            &data_quality_report(&inventory, &generated_at),
        )?;
        Store::write_csv(
            &layout.unparsed_timepoints(),
            &unparsed_timepoint_counts(&inventory),
        )?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Harmonize; {} rows from {} sources",
                inventory.len(),
                outcome.sources_processed
            ),
            elapsed: Some(started.elapsed()),
        });
        tracing::info!(
            rows = inventory.len(),
            sources = outcome.sources_processed,
            failed = source_errors.len(),
            "harmonization complete"
        );

        Ok(HarmonizeResult {
            sources_processed: outcome.sources_processed,
            source_errors,
            rows: inventory.len(),
            skipped_rows: outcome.skipped_rows,
            studies: inventory.study_codes().len(),
            unparsed_timepoints: unparsed,
            outputs: paths([
                layout.harmonized_csv(),
                layout.harmonized_parquet(),
                layout.study_summary(),
                layout.quality_report(),
                layout.unparsed_timepoints(),
            ]),
        })
    }

    pub fn deduplicate(&self, sink: &dyn ProgressSink) -> Result<DedupResult, CuratorError> {
        let started = Instant::now();
        let generated_at = self.clock.now();
        let layout = &self.layout;

        let inventory = Store::read_inventory(&layout.harmonized_csv())?;
        let outcome = deduplicate(&inventory);
        if outcome.duplicate_barcodes > 0 {
            tracing::warn!(
                barcodes = outcome.duplicate_barcodes,
                removed = outcome.removed,
                "duplicate barcodes removed, first occurrence kept"
            );
        }

        Store::write_csv(&layout.deduplicated_csv(), outcome.clean.rows())?;
        Store::write_inventory_parquet(&layout.deduplicated_parquet(), &outcome.clean)?;
        Store::write_csv(&layout.duplicate_report(), &outcome.duplicates)?;
        Store::write_text(
            &layout.duplicate_explanation(),
            &duplicate_explanation(&outcome, &generated_at),
        )?;

        let unusual = unusual_timepoint_samples(&outcome.clean);
        let missing_storage = missing_storage_samples(&outcome.clean);
        if !unusual.is_empty() || !missing_storage.is_empty() {
            tracing::warn!(
                unusual_timepoints = unusual.len(),
                missing_storage = missing_storage.len(),
                "samples need manual correction"
            );
        }
        Store::write_csv(&layout.unusual_timepoints(), &unusual)?;
        Store::write_csv(&layout.missing_storage(), &missing_storage)?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Deduplicate; {} -> {} rows",
                inventory.len(),
                outcome.clean.len()
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(DedupResult {
            input_rows: inventory.len(),
            output_rows: outcome.clean.len(),
            duplicate_barcodes: outcome.duplicate_barcodes,
            removed_rows: outcome.removed,
            unusual_timepoint_samples: unusual.len(),
            missing_storage_samples: missing_storage.len(),
            outputs: paths([
                layout.deduplicated_csv(),
                layout.deduplicated_parquet(),
                layout.duplicate_report(),
                layout.duplicate_explanation(),
                layout.unusual_timepoints(),
                layout.missing_storage(),
            ]),
        })
    }

    pub fn link(&self, sink: &dyn ProgressSink) -> Result<LinkResult, CuratorError> {
        let started = Instant::now();
        let generated_at = self.clock.now();
        let layout = &self.layout;

        let inputs = self.load_link_inputs()?;
        let linkage = build_linkage(&inputs.inventory, &inputs.publications, &inputs.assays);

        Store::write_csv(&layout.publication_study(), &linkage.publication_study)?;
        Store::write_csv(&layout.publication_assay(), &linkage.publication_assay)?;
        Store::write_csv(&layout.sample_publication(), &linkage.sample_publication)?;
        Store::write_csv(&layout.multi_use(), &linkage.multi_use)?;
        Store::write_json(
            &layout.provenance(),
            &ProvenanceDocument::new(&linkage.provenance, &generated_at),
        )?;
        Store::write_csv(&layout.cross_reference(), &linkage.cross_reference)?;
        Store::write_json(
            &layout.complete_linkage(),
            &CompleteLinkage::new(
                &linkage,
                &inputs.inventory,
                inputs.publications.len(),
                inputs.assays.len(),
                &generated_at,
            ),
        )?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Link; {} sample-publication pairs, {} multi-use samples",
                linkage.sample_publication.len(),
                linkage.multi_use.len()
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(LinkResult {
            publications: inputs.publications.len(),
            assays: inputs.assays.len(),
            publication_study_links: linkage.publication_study.len(),
            publication_assay_links: linkage.publication_assay.len(),
            sample_publication_links: linkage.sample_publication.len(),
            multi_use_samples: linkage.multi_use.len(),
            provenance_chains: linkage.provenance.len(),
            unlinked_publications: linkage.unlinked_publications,
            warnings: linkage.warnings,
            outputs: paths([
                layout.publication_study(),
                layout.publication_assay(),
                layout.sample_publication(),
                layout.multi_use(),
                layout.provenance(),
                layout.cross_reference(),
                layout.complete_linkage(),
            ]),
        })
    }

    pub fn validate(&self, sink: &dyn ProgressSink) -> Result<ValidateResult, CuratorError> {
        let started = Instant::now();
        let generated_at = self.clock.now();
        let layout = &self.layout;

        let inputs = self.load_link_inputs()?;
        let linkage: LinkageSet =
            build_linkage(&inputs.inventory, &inputs.publications, &inputs.assays);
        let study_counts: Option<Vec<StudyCount>> = match &self.config.cross_reference {
            Some(path) => Some(read_study_counts(path)?),
            None => None,
        };

        let input = ValidationInput {
            inventory: &inputs.inventory,
            publications: &inputs.publications,
            assays: &inputs.assays,
            linkage: &linkage,
            study_counts: study_counts.as_deref(),
        };
        let options = ValidationOptions {
            missing_field_threshold: self.config.missing_field_threshold,
            missing_fields: self.config.missing_field_checks.clone(),
            generated_at,
        };
        let report = validate(&input, &options);

        Store::write_json(&layout.validation_report(), &report)?;
        Store::write_json(&layout.quality_metrics(), &report.quality_metrics)?;
        Store::write_text(&layout.validation_summary(), &validation_summary(&report))?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Validate; status={} errors={} warnings={}",
                report.status.as_str(),
                report.total_errors,
                report.total_warnings
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(ValidateResult {
            report,
            outputs: paths([
                layout.validation_report(),
                layout.quality_metrics(),
                layout.validation_summary(),
            ]),
        })
    }

    pub fn export(&self, sink: &dyn ProgressSink) -> Result<ExportResult, CuratorError> {
        let started = Instant::now();
        let generated_at = self.clock.now();
        let layout = &self.layout;

        let inventory = Store::read_inventory(&layout.deduplicated_csv())?;
        let consolidation = consolidate(self.load_publications()?);
        if consolidation.merged_titles > 0 {
            tracing::info!(
                merged = consolidation.merged_titles,
                "merged publications sharing a title"
            );
        }
        let export = build_dashboard(&inventory, &consolidation.publications, &generated_at);

        Store::write_json(&layout.dashboard_samples(), &export.samples)?;
        Store::write_json(&layout.dashboard_statistics(), &export.statistics)?;
        Store::write_json(&layout.dashboard_publications(), &export.publications)?;

        sink.event(ProgressEvent {
            message: format!("phase=Export; {} samples", export.samples.len()),
            elapsed: Some(started.elapsed()),
        });

        Ok(ExportResult {
            samples: export.samples.len(),
            publications: export.publications.len(),
            merged_publication_titles: consolidation.merged_titles,
            outputs: paths([
                layout.dashboard_samples(),
                layout.dashboard_statistics(),
                layout.dashboard_publications(),
            ]),
        })
    }

    pub fn run_all(&self, sink: &dyn ProgressSink) -> Result<RunResult, CuratorError> {
        Ok(RunResult {
            harmonize: self.harmonize(sink)?,
            deduplicate: self.deduplicate(sink)?,
            link: self.link(sink)?,
            validate: self.validate(sink)?,
            export: self.export(sink)?,
        })
    }

    fn load_link_inputs(&self) -> Result<LinkInputs, CuratorError> {
        let inventory = Store::read_inventory(&self.layout.deduplicated_csv())?;
        let publications = self.load_publications()?;
        let assays = match &self.config.assays {
            Some(path) => load_assays(path, &self.config.assay_study_codes)?,
            None => {
                tracing::warn!("no assay tracking file configured");
                Vec::new()
            }
        };
        Ok(LinkInputs {
            inventory,
            publications,
            assays,
        })
    }

    // Every citation entry as listed. Entries sharing a title are linked
    // under their own study codes; only the dashboard export merges them.
    fn load_publications(&self) -> Result<Vec<Publication>, CuratorError> {
        let Some(path) = &self.config.publications else {
            tracing::warn!("no publications file configured");
            return Ok(Vec::new());
        };
        load_publications(path)
    }
}

fn paths<const N: usize>(items: [Utf8PathBuf; N]) -> Vec<String> {
    items.into_iter().map(|path| path.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::{Config, ConfigLoader};

    struct NullSink;

    impl ProgressSink for NullSink {
        fn event(&self, _event: ProgressEvent) {}
    }

    #[test]
    fn deduplicate_before_harmonize_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigLoader::resolve_config(Config::default()).unwrap();
        config.output_dir = Utf8PathBuf::from_path_buf(dir.path().join("out")).unwrap();
        let app = App::new(config, FixedClock("2024-01-01T00:00:00".to_string()));

        let err = app.deduplicate(&NullSink).unwrap_err();
        assert_matches!(err, CuratorError::MissingStageInput(_));
    }

    #[test]
    fn harmonize_with_no_sources_writes_empty_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConfigLoader::resolve_config(Config::default()).unwrap();
        config.output_dir = Utf8PathBuf::from_path_buf(dir.path().join("out")).unwrap();
        let app = App::new(config, FixedClock("2024-01-01T00:00:00".to_string()));

        let result = app.harmonize(&NullSink).unwrap();
        assert_eq!(result.rows, 0);
        assert!(app.layout().harmonized_csv().as_std_path().exists());
    }
}
