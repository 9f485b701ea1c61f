//! Status command - Show collection statistics

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use corpus_search::core::config::Config;
use corpus_search::error::Error;
use corpus_search::search::collection::CollectionDb;

pub fn run(root: &Path, json: bool) -> Result<()> {
    let config = Config::load(root).context("failed to load configuration")?;
    let path = config.collection_path();

    let db = match CollectionDb::open(&path) {
        Ok(db) => db,
        Err(Error::CollectionNotFound { .. }) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "exists": false,
                        "collection": config.collection,
                        "path": path.display().to_string(),
                    })
                );
            } else {
                println!(
                    "{} Collection '{}' not built yet. Run {} first.",
                    "!".yellow().bold(),
                    config.collection,
                    "corpus build-index".cyan()
                );
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let stats = db.stats()?;

    if json {
        let mut value = serde_json::to_value(&stats)?;
        value["exists"] = serde_json::Value::Bool(true);
        value["collection"] = serde_json::Value::String(config.collection.clone());
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", format!("Collection '{}'", config.collection).bold());
    println!();
    println!(
        "  {} {} fragments",
        "→".dimmed(),
        stats.fragment_count.to_string().cyan()
    );
    println!(
        "  {} {} dimensions ({})",
        "→".dimmed(),
        stats.dim,
        stats.embedder_id
    );
    println!(
        "  {} chunk size {} words, overlap {}",
        "→".dimmed(),
        stats.chunk_size,
        stats.overlap
    );
    println!(
        "  {} Size: {:.2} KB",
        "→".dimmed(),
        stats.file_size_bytes as f64 / 1024.0
    );
    let built = chrono::DateTime::from_timestamp(stats.built_at, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    println!("  {} Built: {}", "→".dimmed(), built);

    Ok(())
}
