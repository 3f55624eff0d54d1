//! Document enrichment pipeline.
//!
//! A bounded worker pool processes one source file per task: validate or
//! rebuild the sidecar record, extract page text, classify, embed, persist.
//! Each stage is idempotent: work already recorded for the current
//! fingerprint is never redone, so a second run over unchanged inputs makes
//! no service calls. Tasks own disjoint paths; there is no shared mutable
//! state beyond the filesystem.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::analysis::{ensure_pages_text, save, ExtractionError, StoreError};
use crate::analysis::store::load_or_init;
use crate::config::{DomainConfig, RetrievalSettings};
use crate::llm::{Classifier, Embedder, LlmError};

/// One file to process: the owning entity and the source path.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub entity: String,
    pub path: PathBuf,
}

/// Which enrichment stages to run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub classify: bool,
    pub embed: bool,
}

/// Events emitted while the pipeline runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started { worker_id: usize, path: PathBuf },
    Extracted { path: PathBuf, pages: usize },
    Classified { path: PathBuf, category: String },
    Embedded { path: PathBuf, pages: usize },
    /// At least one stage did work and the record was persisted.
    Completed { path: PathBuf },
    /// Every requested stage was already cached for the current fingerprint.
    UpToDate { path: PathBuf },
    Failed { path: PathBuf, error: String },
}

/// Outcome of a pipeline run. Per-file failures never halt the batch.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub processed: usize,
    pub up_to_date: usize,
    pub failed: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Errors for a single file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Worker-pool pipeline over the document corpus.
#[derive(Clone)]
pub struct PipelineService {
    domain: Arc<DomainConfig>,
    classifier: Arc<dyn Classifier>,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalSettings,
    classify_pages_limit: usize,
}

impl PipelineService {
    pub fn new(
        domain: Arc<DomainConfig>,
        classifier: Arc<dyn Classifier>,
        embedder: Arc<dyn Embedder>,
        retrieval: RetrievalSettings,
        classify_pages_limit: usize,
    ) -> Self {
        Self {
            domain,
            classifier,
            embedder,
            retrieval,
            classify_pages_limit,
        }
    }

    /// Run the pipeline over the given files with a bounded worker pool.
    pub async fn run(
        &self,
        files: Vec<WorkItem>,
        options: PipelineOptions,
        event_tx: mpsc::Sender<PipelineEvent>,
    ) -> PipelineSummary {
        let queue = Arc::new(Mutex::new(files));
        let processed = Arc::new(AtomicUsize::new(0));
        let up_to_date = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));

        let workers = self.retrieval.workers.max(1);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let service = self.clone();
            let queue = queue.clone();
            let processed = processed.clone();
            let up_to_date = up_to_date.clone();
            let failures = failures.clone();
            let event_tx = event_tx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let item = match queue.lock().unwrap().pop() {
                        Some(item) => item,
                        None => break,
                    };

                    let _ = event_tx
                        .send(PipelineEvent::Started {
                            worker_id,
                            path: item.path.clone(),
                        })
                        .await;

                    match service.process_file(&item, options, &event_tx).await {
                        Ok(true) => {
                            processed.fetch_add(1, Ordering::Relaxed);
                            let _ = event_tx
                                .send(PipelineEvent::Completed {
                                    path: item.path.clone(),
                                })
                                .await;
                        }
                        Ok(false) => {
                            up_to_date.fetch_add(1, Ordering::Relaxed);
                            let _ = event_tx
                                .send(PipelineEvent::UpToDate {
                                    path: item.path.clone(),
                                })
                                .await;
                        }
                        Err(e) => {
                            warn!("{}: {}", item.path.display(), e);
                            failures
                                .lock()
                                .unwrap()
                                .push((item.path.clone(), e.to_string()));
                            let _ = event_tx
                                .send(PipelineEvent::Failed {
                                    path: item.path,
                                    error: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let failures = std::mem::take(&mut *failures.lock().unwrap());
        PipelineSummary {
            processed: processed.load(Ordering::Relaxed),
            up_to_date: up_to_date.load(Ordering::Relaxed),
            failed: failures.len(),
            failures,
        }
    }

    /// Run every requested stage for one file. Returns whether any stage
    /// did work (false means the record was already complete).
    async fn process_file(
        &self,
        item: &WorkItem,
        options: PipelineOptions,
        event_tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<bool, FileError> {
        let mut record = load_or_init(&item.path, &item.entity, &self.domain.default_category)?;
        let mut changed = false;

        let (page_count, extracted) = {
            let (pages, extracted) = ensure_pages_text(&mut record, &item.path)?;
            (pages.len(), extracted)
        };
        if extracted {
            save(&record, &item.path)?;
            changed = true;
            let _ = event_tx
                .send(PipelineEvent::Extracted {
                    path: item.path.clone(),
                    pages: page_count,
                })
                .await;
        }

        if options.classify && record.category == self.domain.default_category {
            let file_name = item
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            // Bounded page prefix keeps request size in check; the filename
            // acts as a tiebreaker for sparse documents.
            let prefix: Vec<String> = record
                .pages_text
                .as_deref()
                .unwrap_or_default()
                .iter()
                .take(self.classify_pages_limit)
                .cloned()
                .collect();

            let classification = self
                .with_retry(|| self.classifier.classify(&file_name, &prefix))
                .await?;
            record.apply_classification(
                classification.category.clone(),
                classification.title,
                classification.effective_date,
            );
            save(&record, &item.path)?;
            changed = true;
            let _ = event_tx
                .send(PipelineEvent::Classified {
                    path: item.path.clone(),
                    category: classification.category,
                })
                .await;
        }

        if options.embed && record.page_embeddings.is_none() {
            let pages = record.pages_text.clone().unwrap_or_default();
            let embeddings = self
                .with_retry(|| self.embedder.embed_pages(&pages))
                .await?;
            if embeddings.len() != pages.len() {
                return Err(LlmError::Contract(format!(
                    "{} embeddings for {} pages",
                    embeddings.len(),
                    pages.len()
                ))
                .into());
            }
            record.page_embeddings = Some(embeddings);
            save(&record, &item.path)?;
            changed = true;
            let _ = event_tx
                .send(PipelineEvent::Embedded {
                    path: item.path.clone(),
                    pages: page_count,
                })
                .await;
        }

        Ok(changed)
    }

    /// Retry transient service failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.retrieval.retry_attempts.max(1) => {
                    let delay = Duration::from_millis(
                        self.retrieval.retry_base_delay_ms.saturating_mul(1u64 << attempt),
                    );
                    warn!("retrying after {} (attempt {})", e, attempt + 1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Collect processable documents: one folder per entity under the data
/// directory, PDFs only, names starting with `_` excluded.
pub fn collect_documents(data_dir: &std::path::Path) -> std::io::Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    if !data_dir.is_dir() {
        return Ok(items);
    }
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let entity = entry.file_name().to_string_lossy().to_string();
        for file in std::fs::read_dir(entry.path())? {
            let file = file?;
            let path = file.path();
            let name = file.file_name().to_string_lossy().to_string();
            if name.starts_with('_') {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("pdf") {
                continue;
            }
            items.push(WorkItem {
                entity: entity.clone(),
                path,
            });
        }
    }
    items.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(items)
}
