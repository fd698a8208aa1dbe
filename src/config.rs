use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::StatusMarkers;
use crate::error::CuratorError;
use crate::validate::ThresholdField;

pub const DEFAULT_CONFIG_FILE: &str = "biobank.json";
pub const DEFAULT_INVENTORY_SUFFIX: &str = "_Full Inventory.csv";
pub const DEFAULT_MISSING_FIELD_THRESHOLD: f64 = 0.05;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub inventory: Vec<InventoryEntry>,
    #[serde(default)]
    pub inventory_dir: Option<String>,
    #[serde(default)]
    pub inventory_suffix: Option<String>,
    #[serde(default)]
    pub publications: Option<String>,
    #[serde(default)]
    pub assays: Option<String>,
    #[serde(default)]
    pub cross_reference: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub missing_field_threshold: Option<f64>,
    #[serde(default)]
    pub missing_field_checks: Option<Vec<ThresholdField>>,
    #[serde(default)]
    pub status_markers: Option<StatusMarkers>,
    #[serde(default)]
    pub column_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub assay_study_codes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InventoryEntry {
    Shorthand(String),
    Detailed(InventoryEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InventoryEntryObject {
    pub path: String,
    #[serde(default)]
    pub study_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventorySource {
    pub path: Utf8PathBuf,
    pub study_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub inventory: Vec<InventorySource>,
    pub publications: Option<Utf8PathBuf>,
    pub assays: Option<Utf8PathBuf>,
    pub cross_reference: Option<Utf8PathBuf>,
    pub output_dir: Utf8PathBuf,
    pub missing_field_threshold: f64,
    pub missing_field_checks: Vec<ThresholdField>,
    pub status_markers: StatusMarkers,
    pub column_aliases: BTreeMap<String, String>,
    pub assay_study_codes: BTreeMap<String, String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CuratorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(CuratorError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CuratorError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CuratorError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CuratorError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let mut inventory = config
            .inventory
            .into_iter()
            .map(|entry| match entry {
                InventoryEntry::Shorthand(path) => InventorySource {
                    path: Utf8PathBuf::from(path),
                    study_name: None,
                },
                InventoryEntry::Detailed(obj) => InventorySource {
                    path: Utf8PathBuf::from(obj.path),
                    study_name: obj.study_name,
                },
            })
            .collect::<Vec<_>>();

        if let Some(dir) = &config.inventory_dir {
            let suffix = config
                .inventory_suffix
                .as_deref()
                .unwrap_or(DEFAULT_INVENTORY_SUFFIX);
            for path in discover_inventory_files(dir, suffix)? {
                if !inventory.iter().any(|source| source.path == path) {
                    inventory.push(InventorySource {
                        path,
                        study_name: None,
                    });
                }
            }
        }

        let missing_field_threshold = config
            .missing_field_threshold
            .unwrap_or(DEFAULT_MISSING_FIELD_THRESHOLD);
        if !(0.0..=1.0).contains(&missing_field_threshold) {
            return Err(CuratorError::ConfigParse(format!(
                "missing_field_threshold must be a fraction between 0 and 1, got {missing_field_threshold}"
            )));
        }

        Ok(ResolvedConfig {
            schema_version,
            inventory,
            publications: config.publications.map(Utf8PathBuf::from),
            assays: config.assays.map(Utf8PathBuf::from),
            cross_reference: config.cross_reference.map(Utf8PathBuf::from),
            output_dir: Utf8PathBuf::from(
                config
                    .output_dir
                    .unwrap_or_else(|| "data/processed".to_string()),
            ),
            missing_field_threshold,
            missing_field_checks: config
                .missing_field_checks
                .unwrap_or_else(|| ThresholdField::DEFAULT.to_vec()),
            status_markers: config.status_markers.unwrap_or_default(),
            column_aliases: config.column_aliases,
            assay_study_codes: config
                .assay_study_codes
                .unwrap_or_else(default_assay_study_codes),
        })
    }
}

pub fn default_assay_study_codes() -> BTreeMap<String, String> {
    [
        ("Prometheus", "DU17-04"),
        ("EXHALE", "DU24-01"),
        ("SIGMA Plus", "DU20-01"),
        ("SIGMA PRISMM Family", "DU19-03"),
    ]
    .into_iter()
    .map(|(name, code)| (name.to_string(), code.to_string()))
    .collect()
}

// Sorted so that concatenation order is reproducible between runs.
fn discover_inventory_files(dir: &str, suffix: &str) -> Result<Vec<Utf8PathBuf>, CuratorError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| CuratorError::Filesystem(format!("read dir {dir}: {err}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        let matches = path
            .file_name()
            .map(|name| name.ends_with(suffix))
            .unwrap_or(false);
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_applies_defaults() {
        let config = Config {
            inventory: vec![InventoryEntry::Shorthand(
                "raw/LV_DU08-04_Flu_Full Inventory.csv".to_string(),
            )],
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.inventory.len(), 1);
        assert_eq!(resolved.output_dir, Utf8PathBuf::from("data/processed"));
        assert_eq!(resolved.missing_field_threshold, 0.05);
        assert_eq!(
            resolved.missing_field_checks,
            ThresholdField::DEFAULT.to_vec()
        );
        assert_eq!(resolved.status_markers, StatusMarkers::default());
        assert_eq!(
            resolved.assay_study_codes.get("EXHALE").map(String::as_str),
            Some("DU24-01")
        );
    }

    #[test]
    fn resolve_rejects_threshold_out_of_range() {
        let config = Config {
            missing_field_threshold: Some(5.0),
            ..Config::default()
        };
        assert!(ConfigLoader::resolve_config(config).is_err());
    }
}
