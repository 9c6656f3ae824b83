//! Cache command - inspect or reset the classification cache snapshot.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use fisco_core::MemoryCache;

use super::{load_config, save_cache};

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show cache statistics
    Stats {
        /// Also list every entry
        #[arg(long)]
        entries: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove every cached classification
    Clear,
}

pub async fn run(args: CacheArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let Some(path) = config.classifier.cache_path.clone() else {
        anyhow::bail!(
            "No cache file configured. Set one with 'fisco config set classifier.cache_path <path>'."
        );
    };

    match args.command {
        CacheCommand::Stats { entries, json } => show_stats(path, entries, json),
        CacheCommand::Clear => clear_cache(path),
    }
}

fn show_stats(path: PathBuf, list_entries: bool, json: bool) -> anyhow::Result<()> {
    let cache = MemoryCache::open(&path)?;
    let entries = cache.entries();
    let total_hits: u64 = entries.iter().map(|e| e.hit_count).sum();
    let from_llm = entries.iter().filter(|e| e.result.used_llm_fallback).count();

    if json {
        let report = serde_json::json!({
            "path": path,
            "entries": entries.len(),
            "total_hits": total_hits,
            "llm_entries": from_llm,
            "items": if list_entries { serde_json::to_value(&entries)? } else { serde_json::Value::Null },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Cache file: {}", path.display());
    println!("Entries:    {}", entries.len());
    println!("Total hits: {}", total_hits);
    println!("From LLM:   {}", from_llm);

    if list_entries && !entries.is_empty() {
        println!();
        for entry in &entries {
            println!(
                "  {} -> {} / {} ({:.2}, {} hits, last used {})",
                entry.key,
                entry.result.operation_type,
                entry.result.cost_center,
                entry.result.confidence,
                entry.hit_count,
                entry.last_used_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    Ok(())
}

fn clear_cache(path: PathBuf) -> anyhow::Result<()> {
    if !path.exists() {
        println!("{} Cache is already empty", style("ℹ").blue());
        return Ok(());
    }

    let cache = MemoryCache::open(&path).unwrap_or_default();
    let removed = cache.len();
    cache.clear();
    save_cache(&cache, &path)?;

    println!(
        "{} Removed {} cached classifications from {}",
        style("✓").green(),
        removed,
        path.display()
    );

    Ok(())
}
