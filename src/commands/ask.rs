//! Ask command - Query the collection

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use corpus_search::core::config::Config;
use corpus_search::search::embedding::HtpEmbedder;
use corpus_search::search::engine::QueryEngine;
use corpus_search::search::store::truncate_chars;

const DISPLAY_PREVIEW_CHARS: usize = 300;

/// Run ask command
pub fn run(root: &Path, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let config = Config::load(root).context("failed to load configuration")?;
    let embedder = HtpEmbedder::new();
    let engine = QueryEngine::open(&config, &embedder)?;

    let hits = engine.query(query, top_k.unwrap_or(engine.default_top_k()))?;

    if json {
        let json_hits: Vec<_> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                serde_json::json!({
                    "rank": i + 1,
                    "row_id": hit.row_id,
                    "source": hit.fragment.source,
                    "chunk_index": hit.fragment.chunk_index,
                    "score": hit.score,
                    "preview": hit.fragment.preview,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json_hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let score_str = format!("{:.3}", hit.score);
        let score_colored = if hit.score > 0.8 {
            score_str.green()
        } else if hit.score > 0.6 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        println!(
            "{}. [{} | chunk {}] score={}",
            (i + 1).to_string().bold(),
            hit.fragment.source.cyan(),
            hit.fragment.chunk_index,
            score_colored
        );
        println!("   {}", display_preview(&hit.fragment.preview).dimmed());
        println!();
    }

    Ok(())
}

/// Single-line preview cut for the terminal
fn display_preview(preview: &str) -> String {
    let flat = preview.replace('\n', " ");
    format!("{}...", truncate_chars(&flat, DISPLAY_PREVIEW_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_preview() {
        assert_eq!(display_preview("line one\nline two"), "line one line two...");

        let long = "가".repeat(400);
        let shown = display_preview(&long);
        assert_eq!(shown.chars().count(), DISPLAY_PREVIEW_CHARS + 3);
    }
}
