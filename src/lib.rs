pub mod app;
pub mod assays;
pub mod config;
pub mod corrections;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod inventory;
pub mod linkage;
pub mod output;
pub mod publications;
pub mod report;
pub mod store;
pub mod timepoint;
pub mod validate;
