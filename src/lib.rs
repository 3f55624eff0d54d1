//! feeacquire - fee document acquisition and analysis system.
//!
//! Retrieves pricing and fee disclosure documents published by configured
//! entities, caches derived analysis (page text, classification, embeddings)
//! in per-file sidecars, and publishes the results to a search index.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod fingerprint;
pub mod index;
pub mod llm;
pub mod models;
pub mod retrieval;
pub mod services;
