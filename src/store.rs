use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, WriterBuilder};
use polars::prelude::{Column, DataFrame, ParquetWriter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::{Builder, NamedTempFile};

use crate::error::CuratorError;
use crate::inventory::{InventoryTable, SampleRecord};

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: Utf8PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn harmonized_csv(&self) -> Utf8PathBuf {
        self.root.join("combined_inventory_harmonized.csv")
    }

    pub fn harmonized_parquet(&self) -> Utf8PathBuf {
        self.root.join("combined_inventory_harmonized.parquet")
    }

    pub fn study_summary(&self) -> Utf8PathBuf {
        self.root.join("study_summary_statistics.csv")
    }

    pub fn quality_report(&self) -> Utf8PathBuf {
        self.root.join("data_quality_report.json")
    }

    pub fn unparsed_timepoints(&self) -> Utf8PathBuf {
        self.corrections_dir().join("unparsed_timepoints.csv")
    }

    pub fn corrections_dir(&self) -> Utf8PathBuf {
        self.root.join("corrections")
    }

    pub fn unusual_timepoints(&self) -> Utf8PathBuf {
        self.corrections_dir().join("unusual_timepoint_samples.csv")
    }

    pub fn missing_storage(&self) -> Utf8PathBuf {
        self.corrections_dir().join("missing_storage_location_samples.csv")
    }

    pub fn deduplicated_csv(&self) -> Utf8PathBuf {
        self.root.join("combined_inventory_deduplicated.csv")
    }

    pub fn deduplicated_parquet(&self) -> Utf8PathBuf {
        self.root.join("combined_inventory_deduplicated.parquet")
    }

    pub fn duplicate_report(&self) -> Utf8PathBuf {
        self.root.join("duplicate_barcodes_report.csv")
    }

    pub fn duplicate_explanation(&self) -> Utf8PathBuf {
        self.root.join("duplicate_barcodes_explanation.md")
    }

    pub fn linkage_dir(&self) -> Utf8PathBuf {
        self.root.join("linkages")
    }

    pub fn publication_study(&self) -> Utf8PathBuf {
        self.linkage_dir().join("publication_to_study_linkage.csv")
    }

    pub fn publication_assay(&self) -> Utf8PathBuf {
        self.linkage_dir().join("publication_to_assay_linkage.csv")
    }

    pub fn sample_publication(&self) -> Utf8PathBuf {
        self.linkage_dir().join("sample_to_publication_linkage.csv")
    }

    pub fn multi_use(&self) -> Utf8PathBuf {
        self.linkage_dir().join("multi_use_samples.csv")
    }

    pub fn provenance(&self) -> Utf8PathBuf {
        self.linkage_dir().join("data_provenance_chains.json")
    }

    pub fn cross_reference(&self) -> Utf8PathBuf {
        self.linkage_dir().join("study_cross_reference.csv")
    }

    pub fn complete_linkage(&self) -> Utf8PathBuf {
        self.linkage_dir().join("complete_linkage_data.json")
    }

    pub fn validation_dir(&self) -> Utf8PathBuf {
        self.root.join("validation")
    }

    pub fn validation_report(&self) -> Utf8PathBuf {
        self.validation_dir().join("validation_report.json")
    }

    pub fn validation_summary(&self) -> Utf8PathBuf {
        self.validation_dir().join("validation_summary.md")
    }

    pub fn quality_metrics(&self) -> Utf8PathBuf {
        self.validation_dir().join("data_quality_metrics.json")
    }

    pub fn dashboard_dir(&self) -> Utf8PathBuf {
        self.root.join("dashboard")
    }

    pub fn dashboard_samples(&self) -> Utf8PathBuf {
        self.dashboard_dir().join("samples.json")
    }

    pub fn dashboard_statistics(&self) -> Utf8PathBuf {
        self.dashboard_dir().join("sample_statistics.json")
    }

    pub fn dashboard_publications(&self) -> Utf8PathBuf {
        self.dashboard_dir().join("publications.json")
    }
}

pub struct Store;

impl Store {
    // Writes through a temp file in the destination directory and renames it
    // into place, so readers never see a half-written output.
    pub fn write_with<F>(path: &Utf8Path, write: F) -> Result<(), CuratorError>
    where
        F: FnOnce(&mut NamedTempFile) -> Result<(), CuratorError>,
    {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| CuratorError::Filesystem(format!("create {parent}: {err}")))?;
        let mut temp = Builder::new()
            .prefix(".biobank-curator")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        write(&mut temp)?;
        temp.as_file()
            .sync_all()
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| CuratorError::Filesystem(format!("persist {path}: {err}")))?;
        Ok(())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CuratorError> {
        Self::write_with(path, |temp| {
            temp.write_all(content)
                .map_err(|err| CuratorError::Filesystem(err.to_string()))
        })
    }

    pub fn write_text(path: &Utf8Path, content: &str) -> Result<(), CuratorError> {
        Self::write_bytes_atomic(path, content.as_bytes())
    }

    pub fn write_json<T: Serialize + ?Sized>(path: &Utf8Path, value: &T) -> Result<(), CuratorError> {
        let mut content = serde_json::to_vec_pretty(value)
            .map_err(|err| CuratorError::Json(format!("{path}: {err}")))?;
        content.push(b'\n');
        Self::write_bytes_atomic(path, &content)
    }

    pub fn write_csv<T: Serialize>(path: &Utf8Path, rows: &[T]) -> Result<(), CuratorError> {
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
        for row in rows {
            writer
                .serialize(row)
                .map_err(|err| CuratorError::Csv(format!("{path}: {err}")))?;
        }
        let content = writer
            .into_inner()
            .map_err(|err| CuratorError::Csv(format!("{path}: {err}")))?;
        Self::write_bytes_atomic(path, &content)
    }

    pub fn read_csv<T: DeserializeOwned>(path: &Utf8Path) -> Result<Vec<T>, CuratorError> {
        if !path.as_std_path().exists() {
            return Err(CuratorError::MissingStageInput(path.to_string()));
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path.as_std_path())
            .map_err(|err| CuratorError::Csv(format!("{path}: {err}")))?;
        reader
            .deserialize::<T>()
            .map(|row| row.map_err(|err| CuratorError::Csv(format!("{path}: {err}"))))
            .collect()
    }

    pub fn read_inventory(path: &Utf8Path) -> Result<InventoryTable, CuratorError> {
        Ok(InventoryTable::new(Self::read_csv(path)?))
    }

    pub fn write_inventory_parquet(
        path: &Utf8Path,
        inventory: &InventoryTable,
    ) -> Result<(), CuratorError> {
        let mut frame = inventory_frame(inventory)
            .map_err(|err| CuratorError::Parquet(format!("{path}: {err}")))?;
        Self::write_with(path, |temp| {
            ParquetWriter::new(temp.as_file_mut())
                .finish(&mut frame)
                .map(|_| ())
                .map_err(|err| CuratorError::Parquet(format!("{path}: {err}")))
        })
    }
}

fn inventory_frame(inventory: &InventoryTable) -> polars::prelude::PolarsResult<DataFrame> {
    let rows = inventory.rows();
    let text = |name: &str, get: fn(&SampleRecord) -> Option<&str>| {
        Column::new(name.into(), rows.iter().map(get).collect::<Vec<_>>())
    };
    let flag = |name: &str, get: fn(&SampleRecord) -> Option<bool>| {
        Column::new(name.into(), rows.iter().map(get).collect::<Vec<_>>())
    };

    DataFrame::new(vec![
        Column::new(
            "sample_barcode_id".into(),
            rows.iter()
                .map(|row| row.sample_barcode_id.as_str())
                .collect::<Vec<_>>(),
        ),
        text("participant_id", |row| row.participant_id.as_deref()),
        text("study_code", |row| row.study_code.as_deref()),
        Column::new(
            "study_name".into(),
            rows.iter()
                .map(|row| row.study_name.as_str())
                .collect::<Vec<_>>(),
        ),
        text("labvantage_sample_id", |row| row.labvantage_sample_id.as_deref()),
        text("study_family_id", |row| row.study_family_id.as_deref()),
        text("storage_status", |row| row.storage_status.as_deref()),
        text("timepoint_raw", |row| row.timepoint_raw.as_deref()),
        text("storage_unit_id", |row| row.storage_unit_id.as_deref()),
        text("storage_location_path", |row| row.storage_location_path.as_deref()),
        text("sample_type", |row| row.sample_type.as_deref()),
        text("notes", |row| row.notes.as_deref()),
        text("additive", |row| row.additive.as_deref()),
        Column::new(
            "quantity".into(),
            rows.iter().map(|row| row.quantity).collect::<Vec<_>>(),
        ),
        text("quantity_units", |row| row.quantity_units.as_deref()),
        Column::new(
            "timepoint_day".into(),
            rows.iter().map(|row| row.timepoint_day).collect::<Vec<_>>(),
        ),
        Column::new(
            "timepoint_hour".into(),
            rows.iter().map(|row| row.timepoint_hour).collect::<Vec<_>>(),
        ),
        text("timepoint_normalized", |row| row.timepoint_normalized.as_deref()),
        flag("is_pre_challenge", |row| row.is_pre_challenge),
        flag("is_inoculation", |row| row.is_inoculation),
        flag("is_post_challenge", |row| row.is_post_challenge),
        flag("is_screening", |row| row.is_screening),
        Column::new(
            "is_available".into(),
            rows.iter().map(|row| row.is_available).collect::<Vec<_>>(),
        ),
        Column::new(
            "is_transferred".into(),
            rows.iter().map(|row| row.is_transferred).collect::<Vec<_>>(),
        ),
        Column::new(
            "source_file".into(),
            rows.iter()
                .map(|row| row.source_file.as_str())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "source_row".into(),
            rows.iter()
                .map(|row| row.source_row as u64)
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "harmonization_date".into(),
            rows.iter()
                .map(|row| row.harmonization_date.as_str())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "harmonization_version".into(),
            rows.iter()
                .map(|row| row.harmonization_version.as_str())
                .collect::<Vec<_>>(),
        ),
    ])
}
