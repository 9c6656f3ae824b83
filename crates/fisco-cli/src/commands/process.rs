//! Process command - normalize, validate and classify one XML document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use super::output::{OutputFormat, format_document};
use super::{Session, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input XML file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Exit with an error when validation reports error-severity issues
    #[arg(long)]
    strict: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let raw = fs::read(&args.input)?;
    let session = Session::open(&config)?;
    let doc = session
        .pipeline
        .process(&raw)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", args.input.display(), e))?;
    session.persist()?;

    let output = format_document(&doc, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if doc.has_errors() {
        eprintln!(
            "{} {} validation issue(s) found",
            style("!").yellow(),
            doc.issues.len()
        );
        if args.strict {
            anyhow::bail!("Validation failed for {}", args.input.display());
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
