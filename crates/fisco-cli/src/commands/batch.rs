//! Batch processing command for multiple XML documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use fisco_core::{BatchInput, BatchOutcome, BatchSummary, DocumentError};

use super::output::{CSV_HEADER, OutputFormat, csv_record, format_document};
use super::{Session, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching XML files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers (default: batch.jobs from config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// A file that never reached the pipeline.
struct ReadFailure {
    path: PathBuf,
    error: String,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let jobs = args.jobs.unwrap_or(config.batch.jobs);
    if jobs == 0 {
        anyhow::bail!("--jobs must be at least 1");
    }

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_xml(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let mut inputs = Vec::with_capacity(files.len());
    let mut read_failures = Vec::new();
    for path in files {
        match fs::read(&path) {
            Ok(raw) => inputs.push(BatchInput::new(path.display().to_string(), raw)),
            Err(e) if args.continue_on_error => {
                warn!("Failed to read {}: {}", path.display(), e);
                read_failures.push(ReadFailure {
                    path,
                    error: e.to_string(),
                });
            }
            Err(e) => anyhow::bail!("Failed to read {}: {}", path.display(), e),
        }
    }

    let session = Session::open(&config)?;
    let cancel = session.pipeline.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} Interrupted, finishing documents in progress", style("!").yellow());
            cancel.cancel();
        }
    });

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Processing {} documents with {} workers", inputs.len(), jobs));
    pb.enable_steady_tick(Duration::from_millis(100));

    let outcomes = session.pipeline.process_batch(inputs, jobs).await;

    pb.finish_with_message("Complete");
    interrupt.abort();

    if let Some(output_dir) = &args.output_dir {
        write_outputs(output_dir, &outcomes, args.format)?;
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes, &read_failures)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    session.persist()?;

    let summary = BatchSummary::from_outcomes(&outcomes);
    let failed = summary.failed + read_failures.len();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        summary.total + read_failures.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} skipped",
        style(summary.processed).green(),
        style(failed).red(),
        style(summary.skipped).yellow()
    );
    println!(
        "   {} errors, {} warnings, {} infos",
        summary.errors, summary.warnings, summary.infos
    );
    println!(
        "   {} classified by LLM, {} unclassified",
        summary.llm_classified, summary.unclassified
    );

    if failed > 0 {
        println!();
        println!("{}", style("Failed files:").red());
        for failure in &read_failures {
            println!("  - {}: {}", failure.path.display(), failure.error);
        }
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                if !matches!(e, DocumentError::Cancelled) {
                    println!("  - {}: {}", outcome.source, e);
                }
            }
        }

        if !args.continue_on_error {
            error!("{} documents failed", failed);
            anyhow::bail!("Processing failed for {} of {} files", failed, summary.total);
        }
    }

    Ok(())
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

fn write_outputs(output_dir: &Path, outcomes: &[BatchOutcome], format: OutputFormat) -> anyhow::Result<()> {
    for outcome in outcomes {
        let Ok(doc) = &outcome.result else {
            continue;
        };

        let output_name = Path::new(&outcome.source)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&doc.invoice.document_key);
        let output_path = output_dir.join(format!("{}.{}", output_name, format.extension()));

        fs::write(&output_path, format_document(doc, format)?)?;
        debug!("Wrote output to {}", output_path.display());
    }

    let report = serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "summary": BatchSummary::from_outcomes(outcomes),
    });
    fs::write(output_dir.join("batch.json"), serde_json::to_string_pretty(&report)?)?;

    Ok(())
}

fn write_summary(path: &Path, outcomes: &[BatchOutcome], read_failures: &[ReadFailure]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["filename", "status"];
    header.extend(CSV_HEADER);
    header.push("error");
    wtr.write_record(&header)?;

    let blank = || vec![String::new(); CSV_HEADER.len()];

    for outcome in outcomes {
        let filename = file_name(Path::new(&outcome.source));
        let (status, fields, error) = match &outcome.result {
            Ok(doc) => ("success", csv_record(doc), String::new()),
            Err(DocumentError::Cancelled) => ("skipped", blank(), String::new()),
            Err(e) => ("error", blank(), e.to_string()),
        };

        let mut record = vec![filename, status.to_string()];
        record.extend(fields);
        record.push(error);
        wtr.write_record(&record)?;
    }

    for failure in read_failures {
        let mut record = vec![file_name(&failure.path), "error".to_string()];
        record.extend(blank());
        record.push(failure.error.clone());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}
