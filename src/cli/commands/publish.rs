//! `fees publish` - build index documents and publish atomically.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tracing::warn;

use crate::analysis::store::load_or_init;
use crate::analysis::{ensure_pages_text, save};
use crate::config::Config;
use crate::index::{build_documents, IndexPublisher, SearchClient};
use crate::services::collect_documents;

pub async fn cmd_publish(config: &Config, skip_embeddings: bool) -> anyhow::Result<()> {
    if config.index.url.is_empty() {
        anyhow::bail!("no search index URL configured (set MEILI_URL or [index].url)");
    }

    let items = collect_documents(&config.data_dir)?;
    if items.is_empty() {
        println!("No documents found under {}", config.data_dir.display());
        return Ok(());
    }

    // Build every document first: the index swap is all-or-nothing, so all
    // per-file work has to be accounted for before any write happens.
    let mut documents = Vec::new();
    let mut files = 0usize;
    let mut skipped = 0usize;
    for item in &items {
        let mut record =
            match load_or_init(&item.path, &item.entity, &config.domain.default_category) {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping {}: {}", item.path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

        let extracted = match ensure_pages_text(&mut record, &item.path) {
            Ok((_, extracted)) => extracted,
            Err(e) => {
                println!(
                    "  {} {} ({})",
                    style("✗").red(),
                    item.path.display(),
                    style(&e).dim()
                );
                skipped += 1;
                continue;
            }
        };
        if extracted {
            save(&record, &item.path)?;
        }

        let filename = item
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let path = item.path.to_string_lossy().to_string();
        documents.extend(build_documents(&record, &filename, &path, !skip_embeddings));
        files += 1;
    }

    if documents.is_empty() {
        println!("Nothing to publish.");
        return Ok(());
    }

    let client = Arc::new(SearchClient::new(
        &config.index.url,
        &config.index.api_key,
        Duration::from_secs(config.retrieval.timeout_secs),
    ));
    let publisher = IndexPublisher::new(client, config.index.clone());

    println!(
        "{} Publishing {} documents from {} files",
        style("→").cyan(),
        documents.len(),
        files
    );
    let index_name = publisher.publish(&documents).await?;

    let removed = publisher.cleanup_staging().await?;
    for uid in &removed {
        println!("  {} removed stale staging index '{}'", style("·").dim(), uid);
    }

    println!(
        "\n{} Published {} documents to index '{}' ({} files skipped)",
        style("✓").green(),
        documents.len(),
        index_name,
        skipped
    );
    Ok(())
}
