//! Data models for document analysis records.

mod analysis;

pub use analysis::DocumentAnalysis;
