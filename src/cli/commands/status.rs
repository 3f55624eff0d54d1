//! `fees status` - corpus summary.

use std::collections::BTreeMap;

use console::style;

use crate::analysis::{load, LoadOutcome, StaleReason};
use crate::config::Config;
use crate::services::collect_documents;

#[derive(Default)]
struct EntityStats {
    files: usize,
    extracted: usize,
    classified: usize,
    embedded: usize,
    stale: usize,
}

pub fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let items = collect_documents(&config.data_dir)?;

    let mut stats: BTreeMap<String, EntityStats> = BTreeMap::new();
    for item in &items {
        let entry = stats.entry(item.entity.clone()).or_default();
        entry.files += 1;
        match load(&item.path) {
            Ok(LoadOutcome::Valid(record)) => {
                if record.pages_text.is_some() {
                    entry.extracted += 1;
                }
                if record.category != config.domain.default_category {
                    entry.classified += 1;
                }
                if record.page_embeddings.is_some() {
                    entry.embedded += 1;
                }
            }
            Ok(LoadOutcome::Stale(StaleReason::FingerprintMismatch)) => entry.stale += 1,
            Ok(LoadOutcome::Stale(StaleReason::Malformed)) => entry.stale += 1,
            Ok(LoadOutcome::NotFound) | Err(_) => {}
        }
    }

    println!("\n{}", style(format!("Domain: {}", config.domain.name)).bold());
    println!(
        "{:<12} {:>6} {:>10} {:>11} {:>9} {:>6}",
        "entity", "files", "extracted", "classified", "embedded", "stale"
    );
    println!("{}", "-".repeat(60));
    for (entity, s) in &stats {
        println!(
            "{:<12} {:>6} {:>10} {:>11} {:>9} {:>6}",
            entity, s.files, s.extracted, s.classified, s.embedded, s.stale
        );
    }
    if stats.is_empty() {
        println!("(no documents under {})", config.data_dir.display());
    }
    Ok(())
}
