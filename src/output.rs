use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    DedupResult, ExportResult, HarmonizeResult, LinkResult, ProgressEvent, ProgressSink,
    RunResult, ValidateResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_harmonize(result: &HarmonizeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_dedup(result: &DedupResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_link(result: &LinkResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_validate(result: &ValidateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_export(result: &ExportResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
