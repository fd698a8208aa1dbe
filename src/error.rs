use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CuratorError {
    #[error("invalid study code: {0}")]
    InvalidStudyCode(String),

    #[error("missing config file biobank.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read source file {path}: {message}")]
    SourceRead { path: String, message: String },

    #[error("source file {source_name} is missing expected columns: {}", .missing.join(", "))]
    #[diagnostic(help("add an entry to column_aliases in biobank.json if the export renamed a header"))]
    MissingColumns {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("failed to parse publications file {path}: {message}")]
    PublicationsParse { path: String, message: String },

    #[error("failed to parse assay tracking file {path}: {message}")]
    AssaysParse { path: String, message: String },

    #[error("stage input not found: {0} (run the previous stage first)")]
    MissingStageInput(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("json error: {0}")]
    Json(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
