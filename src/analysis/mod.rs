//! Analysis sidecar persistence and text extraction.

pub mod extract;
pub mod store;

pub use extract::{ensure_pages_text, extract_pages_text, ExtractionError};
pub use store::{load, load_or_init, save, sidecar_path, LoadOutcome, StaleReason, StoreError};
