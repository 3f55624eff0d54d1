//! The per-document analysis record.
//!
//! One record exists per source file, persisted as a sidecar next to it. The
//! file's bytes on disk are the root of truth; the record is a cache entry
//! keyed by the content fingerprint. Derived fields are append-only within
//! one fingerprint epoch: extraction, classification, and embedding each
//! write their own fields without clobbering the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Cached analysis state for one source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// URL the file was retrieved from. `None` when the file appeared
    /// locally and no retrieval has recorded an origin yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_from: Option<Url>,
    /// When the file was last retrieved (or first seen, for local files).
    pub retrieved_at: DateTime<Utc>,
    /// Transport freshness token captured at retrieval time. Opaque,
    /// compared verbatim on the next conditional fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Identifier of the owning entity (the parent folder name).
    pub entity: String,
    /// SHA-256 hex digest of the file bytes this record describes.
    pub content_hash: String,
    /// Classification category; the domain's default until classified.
    pub category: String,
    /// Document title reported by classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Date the document becomes effective, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<DateTime<Utc>>,
    /// Per-page extracted text, in page order. Absent until extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_text: Option<Vec<String>>,
    /// Per-page embedding vectors, index-aligned with `pages_text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_embeddings: Option<Vec<Vec<f32>>>,
}

impl DocumentAnalysis {
    /// Create a fresh record for a local file with no known origin.
    ///
    /// Such records are valid cache entries pending a future retrieval,
    /// which will fill in the origin and freshness token.
    pub fn new(entity: &str, content_hash: String, default_category: &str) -> Self {
        Self {
            retrieved_from: None,
            retrieved_at: Utc::now(),
            etag: None,
            entity: entity.to_string(),
            content_hash,
            category: default_category.to_string(),
            title: None,
            effective_date: None,
            pages_text: None,
            page_embeddings: None,
        }
    }

    /// Create a fresh record for a file that was just retrieved.
    pub fn from_retrieval(
        entity: &str,
        content_hash: String,
        default_category: &str,
        retrieved_from: Url,
        etag: Option<String>,
    ) -> Self {
        Self {
            retrieved_from: Some(retrieved_from),
            etag,
            ..Self::new(entity, content_hash, default_category)
        }
    }

    /// Merge a classification result into the record.
    ///
    /// The category is always replaced. Title and effective date are merged,
    /// not replaced: a response omitting them leaves previously recorded
    /// values intact, tolerating partial service output across runs.
    pub fn apply_classification(
        &mut self,
        category: String,
        title: Option<String>,
        effective_date: Option<DateTime<Utc>>,
    ) {
        self.category = category;
        if title.is_some() {
            self.title = title;
        }
        if effective_date.is_some() {
            self.effective_date = effective_date;
        }
    }

    /// Whether pages and embeddings are page-for-page aligned.
    ///
    /// Holds vacuously while either side is absent. A persisted record
    /// violating this is treated as malformed by the store.
    pub fn embeddings_aligned(&self) -> bool {
        match (&self.pages_text, &self.page_embeddings) {
            (Some(pages), Some(embeddings)) => pages.len() == embeddings.len(),
            _ => true,
        }
    }
}
