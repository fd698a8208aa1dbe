use std::fmt::Write;

use crate::inventory::DedupOutcome;
use crate::validate::{ValidationIssue, ValidationReport};

const WARNING_PREVIEW: usize = 10;

pub fn validation_summary(report: &ValidationReport) -> String {
    let mut out = String::new();
    let metrics = &report.quality_metrics;

    let _ = writeln!(out, "# Data Validation Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "**Date**: {}", report.generated_at);
    let _ = writeln!(out, "**Status**: {}", report.status.as_str());
    let _ = writeln!(out);
    let _ = writeln!(out, "## Overview");
    let _ = writeln!(out, "- **Errors**: {}", report.total_errors);
    let _ = writeln!(out, "- **Warnings**: {}", report.total_warnings);
    let _ = writeln!(out, "- **Info**: {}", report.info.len());
    let _ = writeln!(out);

    if !report.errors.is_empty() {
        let _ = writeln!(out, "## Errors");
        for issue in &report.errors {
            push_issue(&mut out, issue);
        }
        let _ = writeln!(out);
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "## Warnings");
        for issue in report.warnings.iter().take(WARNING_PREVIEW) {
            push_issue(&mut out, issue);
        }
        if report.warnings.len() > WARNING_PREVIEW {
            let _ = writeln!(
                out,
                "- ... and {} more (see validation_report.json)",
                report.warnings.len() - WARNING_PREVIEW
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Data Quality");
    let _ = writeln!(
        out,
        "- Samples: {} across {} studies, {} participants",
        metrics.inventory.total_samples, metrics.inventory.studies, metrics.inventory.participants
    );
    let _ = writeln!(
        out,
        "- Participant id completeness: {:.1}%",
        metrics.inventory.completeness.participant_id
    );
    let _ = writeln!(
        out,
        "- Publications with study codes: {}/{}",
        metrics.publications.with_study_code, metrics.publications.total
    );
    let _ = writeln!(
        out,
        "- Sample availability: {:.1}%",
        metrics.inventory.available_pct
    );
    let _ = writeln!(
        out,
        "- Potential multi-use samples: {}",
        metrics.linkages.multi_use_samples
    );
    out
}

fn push_issue(out: &mut String, issue: &ValidationIssue) {
    let _ = writeln!(out, "- **{}**: {}", issue.check.as_str(), issue.message);
}

pub fn duplicate_explanation(outcome: &DedupOutcome, generated_at: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Duplicate Barcodes");
    let _ = writeln!(out);
    let _ = writeln!(out, "**Date**: {generated_at}");
    let _ = writeln!(out);
    let _ = writeln!(out, "## Issue");
    let _ = writeln!(
        out,
        "{} barcodes occur more than once in the harmonized inventory ({} rows in duplicate groups).",
        outcome.duplicate_barcodes,
        outcome.duplicates.len()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Decision");
    let _ = writeln!(
        out,
        "The first row of each barcode in harmonized order is kept; {} later rows were removed. Rows are not merged.",
        outcome.removed
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Impact");
    let _ = writeln!(
        out,
        "The deduplicated inventory has {} rows, one per distinct barcode.",
        outcome.clean.len()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Files");
    let _ = writeln!(
        out,
        "- `duplicate_barcodes_report.csv`: every row of every duplicate group, with group size"
    );
    let _ = writeln!(
        out,
        "- `combined_inventory_deduplicated.csv` / `.parquet`: the cleaned inventory"
    );
    out
}
