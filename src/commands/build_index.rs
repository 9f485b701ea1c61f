//! Build-index command - Rebuild the collection from the source folder

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use corpus_search::core::config::Config;
use corpus_search::core::document::FileExtractor;
use corpus_search::search::builder::{BuildOutcome, IndexBuilder};
use corpus_search::search::embedding::HtpEmbedder;

/// Run build-index command
pub fn run(root: &Path, chunk_size: Option<usize>, overlap: Option<usize>, json: bool) -> Result<()> {
    let mut config = Config::load(root).context("failed to load configuration")?;
    if let Some(size) = chunk_size {
        config.chunk_size = size;
    }
    if let Some(overlap) = overlap {
        config.overlap = overlap;
    }

    let extractor = FileExtractor::new();
    let embedder = HtpEmbedder::new();
    let builder = IndexBuilder::new(&config, &extractor, &embedder)?;

    if !json {
        println!(
            "{} Building collection '{}' from {}...",
            "→".dimmed(),
            config.collection,
            config.source_dir.display()
        );
    }

    let outcome = builder.build().context("index build failed")?;

    match outcome {
        BuildOutcome::Empty { documents, skipped } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "built": false,
                        "documents": documents,
                        "skipped": skipped,
                    })
                );
            } else {
                println!("Nothing to index.");
            }
        }
        BuildOutcome::Built(stats) => {
            if json {
                let mut value = serde_json::to_value(&stats)?;
                value["built"] = serde_json::Value::Bool(true);
                println!("{}", value);
            } else {
                println!();
                println!(
                    "{} Indexed {} fragments from {} documents in {:.2}s",
                    "✓".green().bold(),
                    stats.fragments.to_string().cyan(),
                    stats.documents.to_string().cyan(),
                    stats.duration_ms as f64 / 1000.0
                );
                if stats.skipped > 0 {
                    println!(
                        "  {} {} documents skipped (no text)",
                        "→".dimmed(),
                        stats.skipped
                    );
                }
                println!("  {} {} dimensions", "→".dimmed(), stats.dim);
                println!(
                    "  {} Collection saved to: {}",
                    "→".dimmed(),
                    stats.path.display()
                );
            }
        }
    }

    Ok(())
}
