//! Init command - Write corpus.yaml and create the project folders

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

use corpus_search::core::config::{Config, CONFIG_FILE};

pub fn run(root: &Path, force: bool) -> Result<()> {
    let config_path = root.join(CONFIG_FILE);

    println!("{}", "Corpus Project Setup".bold());
    println!("{}", "=".repeat(50));
    println!();

    if config_path.exists() && !force {
        println!(
            "{} {} exists (use --force to overwrite)",
            "→".dimmed(),
            config_path.display()
        );
    } else {
        let yaml = Config::default().to_yaml()?;
        fs::write(&config_path, yaml)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("{} Wrote {}", "✓".green(), config_path.display());
    }

    let config = Config::load(root)
        .with_context(|| format!("invalid {}", config_path.display()))?;

    for (path, purpose) in [
        (&config.source_dir, "documents to index"),
        (&config.storage_dir, "built collections"),
    ] {
        if path.exists() {
            println!("{} {} exists ({})", "✓".green(), path.display(), purpose);
        } else {
            fs::create_dir_all(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            println!("{} Created {} ({})", "✓".green(), path.display(), purpose);
        }
    }

    println!();
    println!(
        "Put documents in {} and run {}.",
        config.source_dir.display().to_string().cyan(),
        "corpus build-index".cyan()
    );

    Ok(())
}
