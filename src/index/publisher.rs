//! Index document construction and the atomic publish protocol.
//!
//! Documents are written to a freshly created staging index, never into the
//! live index in place. Once every batch is confirmed, the staging index is
//! swapped under the public name and the leftover deleted. A failed batch
//! abandons staging; readers never observe a partial publish.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::config::{IndexSettings, STAGING_INDEX_INFIX};
use crate::models::DocumentAnalysis;

use super::{IndexBackend, IndexError};

/// Attributes readers may filter on.
const FILTERABLE_ATTRIBUTES: &[&str] = &[
    "entity",
    "category",
    "filename",
    "retrieved_from",
    "content_hash",
    "effective_date",
];

/// One search-index document: a single page of a source file plus the
/// file-level analysis metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PageDocument {
    /// Primary key; embeds the content fingerprint, so unchanged content
    /// republishes under identical ids while any change mints new ones.
    pub id: String,
    pub entity: String,
    pub filename: String,
    pub path: String,
    /// 1-based page number.
    pub page: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved_from: Option<Url>,
    pub retrieved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub content_hash: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<DateTime<Utc>>,
}

/// Deterministic, collision-free document id for one page.
pub fn document_id(entity: &str, content_hash: &str, page_idx: usize) -> String {
    format!("{}_{}_p{}", entity, content_hash, page_idx)
}

/// Build one index document per extracted page of a record.
///
/// Returns nothing when the record has no extracted text; such files are
/// not publishable.
pub fn build_documents(
    record: &DocumentAnalysis,
    filename: &str,
    path: &str,
    include_embeddings: bool,
) -> Vec<PageDocument> {
    let Some(pages) = record.pages_text.as_ref() else {
        return Vec::new();
    };

    pages
        .iter()
        .enumerate()
        .map(|(i, content)| {
            let embedding = if include_embeddings {
                record
                    .page_embeddings
                    .as_ref()
                    .and_then(|embeddings| embeddings.get(i))
                    .cloned()
            } else {
                None
            };
            PageDocument {
                id: document_id(&record.entity, &record.content_hash, i),
                entity: record.entity.clone(),
                filename: filename.to_string(),
                path: path.to_string(),
                page: i + 1,
                content: content.clone(),
                embedding,
                retrieved_from: record.retrieved_from.clone(),
                retrieved_at: record.retrieved_at,
                etag: record.etag.clone(),
                content_hash: record.content_hash.clone(),
                category: record.category.clone(),
                title: record.title.clone(),
                effective_date: record.effective_date,
            }
        })
        .collect()
}

/// Publishes document batches with staging-and-swap semantics.
pub struct IndexPublisher {
    backend: Arc<dyn IndexBackend>,
    settings: IndexSettings,
}

impl IndexPublisher {
    pub fn new(backend: Arc<dyn IndexBackend>, settings: IndexSettings) -> Self {
        Self { backend, settings }
    }

    fn staging_prefix(&self) -> String {
        format!("{}{}", self.settings.index_name, STAGING_INDEX_INFIX)
    }

    fn staging_name(&self) -> String {
        format!("{}{}", self.staging_prefix(), Utc::now().format("%Y%m%d%H%M%S"))
    }

    /// Publish the documents, replacing the live index atomically.
    ///
    /// When a live index exists, documents go to a staging index first and
    /// the names are swapped only after every batch is confirmed; on any
    /// failure the staging index is abandoned and the live index remains
    /// authoritative. Returns the public index name.
    pub async fn publish(&self, documents: &[PageDocument]) -> Result<String, IndexError> {
        let live = self.settings.index_name.clone();
        let live_exists = self.backend.index_exists(&live).await?;
        let target = if live_exists {
            self.staging_name()
        } else {
            live.clone()
        };

        info!(
            "publishing {} documents to index '{}'",
            documents.len(),
            target
        );

        if let Err(e) = self.write_documents(&target, documents).await {
            if target != live {
                if let Err(cleanup) = self.backend.delete_index(&target).await {
                    warn!("failed to remove abandoned index '{}': {}", target, cleanup);
                }
            }
            return Err(e);
        }

        if target != live {
            self.backend.swap_indexes(&live, &target).await?;
            // After the swap the staging name holds the previous live data.
            self.backend.delete_index(&target).await?;
        }

        Ok(live)
    }

    async fn write_documents(
        &self,
        target: &str,
        documents: &[PageDocument],
    ) -> Result<(), IndexError> {
        self.backend.create_index(target, "id").await?;
        self.backend
            .set_filterable_attributes(target, FILTERABLE_ATTRIBUTES)
            .await?;

        let batch_size = self.settings.batch_size.max(1);
        let mut tasks = Vec::new();
        for chunk in documents.chunks(batch_size) {
            tasks.push(self.backend.add_documents(target, chunk).await?);
        }
        for task in tasks {
            self.backend.wait_for_task(task).await?;
        }
        Ok(())
    }

    /// Delete staging indexes left behind by a previous crashed run.
    pub async fn cleanup_staging(&self) -> Result<Vec<String>, IndexError> {
        let prefix = self.staging_prefix();
        let mut removed = Vec::new();
        for uid in self.backend.list_indexes().await? {
            if uid.starts_with(&prefix) {
                self.backend.delete_index(&uid).await?;
                removed.push(uid);
            }
        }
        Ok(removed)
    }
}
