//! `fees fetch` - conditional retrieval of configured documents.

use std::time::Duration;

use console::style;
use tracing::warn;
use url::Url;

use crate::analysis::{load, save, LoadOutcome};
use crate::config::Config;
use crate::fingerprint::fingerprint_file;
use crate::models::DocumentAnalysis;
use crate::retrieval::{filename_for_url, DocumentFetcher, FetchOutcome, RetrievalError};

pub async fn cmd_fetch(config: &Config) -> anyhow::Result<()> {
    let fetcher = DocumentFetcher::new(Duration::from_secs(config.retrieval.timeout_secs));

    let mut downloaded = 0usize;
    let mut unchanged = 0usize;
    let mut failed = 0usize;

    let mut entity_ids: Vec<&String> = config.domain.entities.keys().collect();
    entity_ids.sort();

    for entity_id in entity_ids {
        let entity = &config.domain.entities[entity_id];
        for url_str in &entity.urls {
            let url = match Url::parse(url_str) {
                Ok(url) => url,
                Err(e) => {
                    println!(
                        "  {} {} ({})",
                        style("✗").red(),
                        url_str,
                        style(&e).dim()
                    );
                    failed += 1;
                    continue;
                }
            };

            let target = config
                .data_dir
                .join(entity_id)
                .join(filename_for_url(&url));

            // The freshness token only comes from a record that still
            // describes the bytes on disk.
            let existing_etag = if target.is_file() {
                match load(&target) {
                    Ok(LoadOutcome::Valid(record)) => record.etag,
                    _ => None,
                }
            } else {
                None
            };

            match fetch_with_retry(config, &fetcher, &url, existing_etag.as_deref(), &target).await
            {
                Ok(FetchOutcome::NotModified) => {
                    unchanged += 1;
                    println!("  {} {} (not modified)", style("·").dim(), url);
                }
                Ok(FetchOutcome::Downloaded { etag, size }) => {
                    // The bytes changed: the old record (if any) is stale,
                    // replace it with a fresh one carrying the retrieval
                    // metadata.
                    let digest = fingerprint_file(&target)?;
                    let record = DocumentAnalysis::from_retrieval(
                        entity_id,
                        digest,
                        &config.domain.default_category,
                        url.clone(),
                        etag,
                    );
                    save(&record, &target)?;
                    downloaded += 1;
                    println!(
                        "  {} {} ({} bytes)",
                        style("✓").green(),
                        url,
                        size
                    );
                }
                Err(e) => {
                    warn!("fetch {} failed: {}", url, e);
                    failed += 1;
                    println!("  {} {} ({})", style("✗").red(), url, style(&e).dim());
                }
            }
        }
    }

    println!(
        "\n{} downloaded, {} unchanged, {} failed",
        style(downloaded).green(),
        unchanged,
        if failed > 0 {
            style(failed).red()
        } else {
            style(failed).dim()
        }
    );
    Ok(())
}

/// Retry transient fetch failures with exponential backoff.
async fn fetch_with_retry(
    config: &Config,
    fetcher: &DocumentFetcher,
    url: &Url,
    etag: Option<&str>,
    target: &std::path::Path,
) -> Result<FetchOutcome, RetrievalError> {
    let mut attempt: u32 = 0;
    loop {
        match fetcher.fetch(url, etag, target).await {
            Ok(outcome) => return Ok(outcome),
            Err(e)
                if e.is_retryable()
                    && attempt + 1 < config.retrieval.retry_attempts.max(1) =>
            {
                let delay = Duration::from_millis(
                    config
                        .retrieval
                        .retry_base_delay_ms
                        .saturating_mul(1u64 << attempt),
                );
                warn!("retrying {} after {} (attempt {})", url, e, attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
