//! Search index client and atomic publisher.

mod client;
mod publisher;

pub use client::SearchClient;
pub use publisher::{build_documents, document_id, IndexPublisher, PageDocument};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the search index service.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("task {uid} failed: {message}")]
    Task { uid: u64, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

/// Operations the publisher needs from a search index service.
///
/// Batch document addition is asynchronous: `add_documents` returns a task
/// id which must be confirmed through `wait_for_task` before the caller may
/// consider the write durable.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    async fn index_exists(&self, uid: &str) -> Result<bool, IndexError>;

    /// Create an index and wait for it to be ready.
    async fn create_index(&self, uid: &str, primary_key: &str) -> Result<(), IndexError>;

    /// Configure filterable attributes and wait for completion.
    async fn set_filterable_attributes(
        &self,
        uid: &str,
        attributes: &[&str],
    ) -> Result<(), IndexError>;

    /// Enqueue a document batch; returns the task id to confirm.
    async fn add_documents(
        &self,
        uid: &str,
        documents: &[publisher::PageDocument],
    ) -> Result<u64, IndexError>;

    /// Block until the task succeeds, or fail with its error.
    async fn wait_for_task(&self, task_uid: u64) -> Result<(), IndexError>;

    /// Atomically exchange the contents of two indexes.
    async fn swap_indexes(&self, first: &str, second: &str) -> Result<(), IndexError>;

    async fn delete_index(&self, uid: &str) -> Result<(), IndexError>;

    async fn list_indexes(&self) -> Result<Vec<String>, IndexError>;
}
