//! `fees analyze` - run the enrichment pipeline over the corpus.

use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::llm::GeminiClient;
use crate::services::{collect_documents, PipelineEvent, PipelineOptions, PipelineService};

pub async fn cmd_analyze(
    config: &Config,
    classify: bool,
    embed: bool,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let items = collect_documents(&config.data_dir)?;
    if items.is_empty() {
        println!("No documents found under {}", config.data_dir.display());
        return Ok(());
    }

    if (classify || embed) && config.llm.api_key.is_empty() {
        anyhow::bail!("no LLM API key configured (set GEMINI_API_KEY or [llm].api_key)");
    }

    let domain = Arc::new(config.domain.clone());
    let gemini = Arc::new(GeminiClient::new(config.llm.clone(), domain.clone()));

    let mut retrieval = config.retrieval.clone();
    if let Some(workers) = workers {
        retrieval.workers = workers.max(1);
    }

    let service = PipelineService::new(
        domain,
        gemini.clone(),
        gemini,
        retrieval,
        config.llm.classify_pages_limit,
    );

    let total = items.len();
    println!(
        "{} Analyzing {} documents (classify: {}, embed: {})",
        style("→").cyan(),
        total,
        classify,
        embed
    );

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let progress_reader = progress.clone();
    let reader = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PipelineEvent::Started { path, .. } => {
                    if let Some(name) = path.file_name() {
                        progress_reader.set_message(name.to_string_lossy().to_string());
                    }
                }
                PipelineEvent::Classified { path, category } => {
                    progress_reader.println(format!(
                        "  {} {} → {}",
                        style("✓").green(),
                        path.display(),
                        category
                    ));
                }
                PipelineEvent::Completed { .. } | PipelineEvent::UpToDate { .. } => {
                    progress_reader.inc(1);
                }
                PipelineEvent::Failed { path, error } => {
                    progress_reader.println(format!(
                        "  {} {} ({})",
                        style("✗").red(),
                        path.display(),
                        error
                    ));
                    progress_reader.inc(1);
                }
                _ => {}
            }
        }
    });

    let options = PipelineOptions { classify, embed };
    let summary = service.run(items, options, event_tx).await;
    let _ = reader.await;
    progress.finish_and_clear();

    println!(
        "\n{} processed, {} up to date, {} failed",
        style(summary.processed).green(),
        summary.up_to_date,
        if summary.failed > 0 {
            style(summary.failed).red()
        } else {
            style(summary.failed).dim()
        }
    );
    for (path, error) in &summary.failures {
        println!("  {} {}: {}", style("✗").red(), path.display(), error);
    }
    Ok(())
}
