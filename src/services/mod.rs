//! Service layer for pipeline business logic.
//!
//! Services are UI-free: progress is reported through events so the CLI can
//! render it however it likes.

pub mod pipeline;

pub use pipeline::{
    collect_documents, PipelineEvent, PipelineOptions, PipelineService, PipelineSummary, WorkItem,
};
