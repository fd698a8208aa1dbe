use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use biobank_curator::app::{
    App, DedupResult, ExportResult, HarmonizeResult, LinkResult, ProgressEvent, ProgressSink,
    ValidateResult,
};
use biobank_curator::config::ConfigLoader;
use biobank_curator::error::CuratorError;
use biobank_curator::output::{JsonOutput, OutputMode};

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Parser)]
#[command(name = "biobank-curator")]
#[command(about = "Harmonize, deduplicate, link and validate biobank sample inventories")]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config (default: ./biobank.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print stage results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Map inventory exports onto the canonical schema")]
    Harmonize,
    #[command(about = "Keep the first row of every barcode")]
    Dedup,
    #[command(about = "Build publication, assay and sample join tables")]
    Link,
    #[command(about = "Run the validation battery")]
    Validate,
    #[command(about = "Write dashboard JSON")]
    Export,
    #[command(about = "Run every stage in order")]
    Run,
}

struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None => tracing::info!("{}", event.message),
        }
    }
}

enum Completion {
    Done,
    ValidationFailed,
}

fn main() -> ExitCode {
    match run() {
        Ok(Completion::Done) => ExitCode::SUCCESS,
        Ok(Completion::ValidationFailed) => ExitCode::from(3),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<CuratorError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &CuratorError) -> u8 {
    match error {
        CuratorError::MissingConfig
        | CuratorError::ConfigRead(_)
        | CuratorError::MissingStageInput(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<Completion> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = App::from_config(config);
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &LogSink,
    };

    match cli.command {
        Command::Harmonize => {
            let result = app.harmonize(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_harmonize(&result).into_diagnostic()?,
                OutputMode::Human => print_harmonize(&result),
            }
            Ok(Completion::Done)
        }
        Command::Dedup => {
            let result = app.deduplicate(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_dedup(&result).into_diagnostic()?,
                OutputMode::Human => print_dedup(&result),
            }
            Ok(Completion::Done)
        }
        Command::Link => {
            let result = app.link(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_link(&result).into_diagnostic()?,
                OutputMode::Human => print_link(&result),
            }
            Ok(Completion::Done)
        }
        Command::Validate => {
            let result = app.validate(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_validate(&result).into_diagnostic()?,
                OutputMode::Human => print_validate(&result),
            }
            Ok(completion(&result))
        }
        Command::Export => {
            let result = app.export(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_export(&result).into_diagnostic()?,
                OutputMode::Human => print_export(&result),
            }
            Ok(Completion::Done)
        }
        Command::Run => {
            let result = app.run_all(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_run(&result).into_diagnostic()?,
                OutputMode::Human => {
                    print_harmonize(&result.harmonize);
                    print_dedup(&result.deduplicate);
                    print_link(&result.link);
                    print_validate(&result.validate);
                    print_export(&result.export);
                }
            }
            Ok(completion(&result.validate))
        }
    }
}

fn completion(result: &ValidateResult) -> Completion {
    if result.passed() {
        Completion::Done
    } else {
        Completion::ValidationFailed
    }
}

fn print_outputs(outputs: &[String]) {
    for path in outputs {
        println!("   -> {path}");
    }
}

fn print_harmonize(result: &HarmonizeResult) {
    println!("{CYAN}== harmonize{RESET}");
    println!(
        "{GREEN}{} rows from {} sources ({} studies){RESET}",
        result.rows, result.sources_processed, result.studies
    );
    if result.skipped_rows > 0 {
        println!("{YELLOW}skipped rows: {}{RESET}", result.skipped_rows);
    }
    for error in &result.source_errors {
        println!("{RED}failed source {}: {}{RESET}", error.source, error.message);
    }
    if !result.unparsed_timepoints.is_empty() {
        println!(
            "{YELLOW}unparsed timepoints: {}{RESET}",
            result.unparsed_timepoints.len()
        );
    }
    print_outputs(&result.outputs);
}

fn print_dedup(result: &DedupResult) {
    println!("{CYAN}== dedup{RESET}");
    println!(
        "{GREEN}{} -> {} rows{RESET}",
        result.input_rows, result.output_rows
    );
    if result.duplicate_barcodes > 0 {
        println!(
            "{YELLOW}{} duplicate barcodes, {} rows removed (first occurrence kept){RESET}",
            result.duplicate_barcodes, result.removed_rows
        );
    }
    if result.unusual_timepoint_samples + result.missing_storage_samples > 0 {
        println!(
            "{YELLOW}{} unusual timepoints, {} missing storage locations to correct{RESET}",
            result.unusual_timepoint_samples, result.missing_storage_samples
        );
    }
    print_outputs(&result.outputs);
}

fn print_link(result: &LinkResult) {
    println!("{CYAN}== link{RESET}");
    println!(
        "{GREEN}publication-study: {}  publication-assay: {}  sample-publication: {}{RESET}",
        result.publication_study_links,
        result.publication_assay_links,
        result.sample_publication_links
    );
    println!(
        "potential multi-use samples: {}  provenance chains: {}",
        result.multi_use_samples, result.provenance_chains
    );
    for warning in &result.warnings {
        println!("{YELLOW}warning: {warning}{RESET}");
    }
    print_outputs(&result.outputs);
}

fn print_validate(result: &ValidateResult) {
    let report = &result.report;
    let color = if report.passed() { GREEN } else { RED };
    println!("{CYAN}== validate{RESET}");
    println!(
        "{color}{}: {} errors, {} warnings{RESET}",
        report.status.as_str(),
        report.total_errors,
        report.total_warnings
    );
    for issue in &report.errors {
        println!("{RED}  [{}] {}{RESET}", issue.check.as_str(), issue.message);
    }
    print_outputs(&result.outputs);
}

fn print_export(result: &ExportResult) {
    println!("{CYAN}== export{RESET}");
    println!(
        "{GREEN}{} samples, {} publications{RESET}",
        result.samples, result.publications
    );
    if result.merged_publication_titles > 0 {
        println!(
            "{YELLOW}{} shared titles merged{RESET}",
            result.merged_publication_titles
        );
    }
    print_outputs(&result.outputs);
}
