use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use ttj_pipeline::config::Config;
use ttj_pipeline::logging;
use ttj_pipeline::pipeline::parser::{group_pages, read_page_dir, ParseStats, ShipmentParser};
use ttj_pipeline::pipeline::{Pipeline, PipelineOutput};
use ttj_pipeline::reference::ReferenceData;

#[derive(Parser)]
#[command(name = "ttj_pipeline")]
#[command(about = "Timber Trades Journal shipping-arrival extraction")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, decompose, deduplicate and normalize a directory of OCR pages
    Run {
        /// Directory of per-page `.txt` files
        #[arg(long)]
        pages: PathBuf,
        /// Reference data bundle (canonical lists, aliases, decision ledger)
        #[arg(long)]
        reference: PathBuf,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        /// Pipeline configuration; defaults to TTJ_CONFIG or ./config.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Parse pages only and print parse statistics
    Parse {
        #[arg(long)]
        pages: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

fn write_outputs(out: &Path, output: &PipelineOutput) -> anyhow::Result<()> {
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    write_jsonl(&out.join("shipments.jsonl"), &output.shipments)?;
    write_jsonl(&out.join("cargo_items.jsonl"), &output.cargo_items)?;
    write_json(&out.join("review_queue.json"), &output.review_queue)?;
    write_json(&out.join("summary.json"), &output.summary)?;
    info!("Wrote outputs to {}", out.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let log_dir = logging::log_dir();
    let _log_guard = logging::init_logging(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            pages,
            reference,
            out,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let reference = ReferenceData::load(&reference)
                .with_context(|| format!("loading reference data {}", reference.display()))?;
            // A bad ledger halts here, before any page is read
            let pipeline = Pipeline::new(config, reference).context("invalid reference data")?;

            let page_files = read_page_dir(&pages)
                .with_context(|| format!("reading pages from {}", pages.display()))?;
            if page_files.is_empty() {
                warn!("No .txt pages found in {}", pages.display());
            }
            let output = pipeline.run(group_pages(page_files));
            write_outputs(&out, &output)?;

            let summary = &output.summary;
            println!("\n📊 Run {}:", summary.run_id);
            println!("   Document groups: {}", summary.parse.groups);
            println!("   Lines seen: {}", summary.parse.lines_seen);
            println!("   Shipments: {}", summary.shipments);
            println!("   Cargo items: {}", summary.cargo_items);
            println!(
                "   Hallucinated records removed: {} ({} patterns)",
                summary.dedup.records_removed,
                summary.dedup.removed_patterns.len()
            );
            for (class, counters) in &summary.coverage {
                let share = summary.resolved_share(*class).unwrap_or(0.0);
                println!(
                    "   {}: {} occurrences, {:.1}% resolved, {} unmatched",
                    class,
                    counters.total(),
                    share * 100.0,
                    counters.unmatched
                );
            }
            println!("   Review queue: {} values", summary.review_queue_len);
        }
        Commands::Parse { pages, config } => {
            let config = load_config(config.as_deref())?;
            let parser = ShipmentParser::new(config.parser);
            let page_files = read_page_dir(&pages)
                .with_context(|| format!("reading pages from {}", pages.display()))?;

            let mut stats = ParseStats::default();
            for group in group_pages(page_files) {
                stats.merge(&parser.parse_group(&group).stats);
            }
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
