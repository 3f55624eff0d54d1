//! Sidecar persistence for analysis records.
//!
//! Each source file gets one sidecar (`doc.pdf` -> `doc.analysis.json`)
//! holding its analysis record as pretty JSON with absent fields omitted.
//! Loading validates the stored fingerprint against the file's current
//! bytes; staleness and corruption both heal to a cache miss instead of
//! failing the caller.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::fingerprint::{fingerprint_file, is_current};
use crate::models::DocumentAnalysis;

/// Extension given to sidecar files, replacing the source extension.
pub const SIDECAR_EXTENSION: &str = "analysis.json";

/// Errors from sidecar IO. Parse failures are not errors; they surface as
/// [`LoadOutcome::Stale`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serializing analysis record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a stored record was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The file's bytes no longer match the recorded fingerprint.
    FingerprintMismatch,
    /// The sidecar could not be parsed, or violated a record invariant.
    Malformed,
}

/// Result of loading a sidecar. Callers pattern-match; both `Stale` and
/// `NotFound` mean "synthesize a fresh record".
#[derive(Debug)]
pub enum LoadOutcome {
    Valid(DocumentAnalysis),
    Stale(StaleReason),
    NotFound,
}

/// Path of the sidecar for a source file.
pub fn sidecar_path(source: &Path) -> PathBuf {
    source.with_extension(SIDECAR_EXTENSION)
}

/// Load the analysis record for a source file, validating its fingerprint
/// against the file's current bytes.
pub fn load(source: &Path) -> Result<LoadOutcome, StoreError> {
    let digest = fingerprint_file(source)?;
    load_with_digest(source, &digest)
}

fn load_with_digest(source: &Path, digest: &str) -> Result<LoadOutcome, StoreError> {
    let sidecar = sidecar_path(source);
    let raw = match std::fs::read_to_string(&sidecar) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadOutcome::NotFound),
        Err(e) => return Err(e.into()),
    };

    let record: DocumentAnalysis = match serde_json::from_str(&raw) {
        Ok(record) => record,
        Err(e) => {
            debug!("unparseable sidecar {}: {}", sidecar.display(), e);
            return Ok(LoadOutcome::Stale(StaleReason::Malformed));
        }
    };

    if !record.embeddings_aligned() {
        debug!("sidecar {} has misaligned embeddings", sidecar.display());
        return Ok(LoadOutcome::Stale(StaleReason::Malformed));
    }

    if !is_current(&record, digest) {
        return Ok(LoadOutcome::Stale(StaleReason::FingerprintMismatch));
    }

    Ok(LoadOutcome::Valid(record))
}

/// Load the record for a source file, synthesizing a fresh one on a cache
/// miss. Stale or corrupt sidecars are replaced by a record with no derived
/// fields; all previously computed work for the old fingerprint is discarded.
pub fn load_or_init(
    source: &Path,
    entity: &str,
    default_category: &str,
) -> Result<DocumentAnalysis, StoreError> {
    let digest = fingerprint_file(source)?;
    match load_with_digest(source, &digest)? {
        LoadOutcome::Valid(record) => Ok(record),
        LoadOutcome::Stale(reason) => {
            debug!(
                "rebuilding analysis record for {} ({:?})",
                source.display(),
                reason
            );
            Ok(DocumentAnalysis::new(entity, digest, default_category))
        }
        LoadOutcome::NotFound => Ok(DocumentAnalysis::new(entity, digest, default_category)),
    }
}

/// Atomically write the record's sidecar.
///
/// The JSON is written to a temp file in the sidecar's directory and renamed
/// into place, so readers never observe a partial write.
pub fn save(record: &DocumentAnalysis, source: &Path) -> Result<(), StoreError> {
    let sidecar = sidecar_path(source);
    let dir = sidecar.parent().unwrap_or_else(|| Path::new("."));
    let rendered = serde_json::to_string_pretty(record)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(rendered.as_bytes())?;
    tmp.persist(&sidecar).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn write_source(dir: &Path, content: &[u8]) -> PathBuf {
        let path = dir.join("fees.pdf");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_sidecar_path_replaces_extension() {
        assert_eq!(
            sidecar_path(Path::new("/data/alpha/fees.pdf")),
            PathBuf::from("/data/alpha/fees.analysis.json")
        );
    }

    #[test]
    fn test_load_missing_sidecar_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), b"pdf bytes");
        assert!(matches!(load(&source).unwrap(), LoadOutcome::NotFound));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), b"pdf bytes");

        let mut record =
            DocumentAnalysis::new("alpha", fingerprint(b"pdf bytes"), "Uncategorized");
        record.pages_text = Some(vec!["page one".to_string()]);
        save(&record, &source).unwrap();

        match load(&source).unwrap() {
            LoadOutcome::Valid(loaded) => {
                assert_eq!(loaded.entity, "alpha");
                assert_eq!(loaded.pages_text.unwrap(), vec!["page one".to_string()]);
            }
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn test_mutated_file_invalidates_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), b"original");

        let mut record = DocumentAnalysis::new("alpha", fingerprint(b"original"), "Uncategorized");
        record.pages_text = Some(vec!["stale text".to_string()]);
        record.apply_classification("PriceList".to_string(), Some("old".to_string()), None);
        save(&record, &source).unwrap();

        // Change the file's bytes; everything derived must be discarded.
        std::fs::write(&source, b"rewritten").unwrap();

        match load(&source).unwrap() {
            LoadOutcome::Stale(StaleReason::FingerprintMismatch) => {}
            other => panic!("expected fingerprint mismatch, got {:?}", other),
        }

        let fresh = load_or_init(&source, "alpha", "Uncategorized").unwrap();
        assert_eq!(fresh.content_hash, fingerprint(b"rewritten"));
        assert!(fresh.pages_text.is_none());
        assert!(fresh.title.is_none());
        assert_eq!(fresh.category, "Uncategorized");
    }

    #[test]
    fn test_corrupt_sidecar_heals_to_fresh_record() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), b"pdf bytes");
        std::fs::write(sidecar_path(&source), b"{ not json").unwrap();

        assert!(matches!(
            load(&source).unwrap(),
            LoadOutcome::Stale(StaleReason::Malformed)
        ));

        let fresh = load_or_init(&source, "alpha", "Uncategorized").unwrap();
        assert_eq!(fresh.content_hash, fingerprint(b"pdf bytes"));
    }

    #[test]
    fn test_misaligned_embeddings_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), b"pdf bytes");

        let mut record = DocumentAnalysis::new("alpha", fingerprint(b"pdf bytes"), "Uncategorized");
        record.pages_text = Some(vec!["one".to_string(), "two".to_string()]);
        record.page_embeddings = Some(vec![vec![0.5]]);
        save(&record, &source).unwrap();

        assert!(matches!(
            load(&source).unwrap(),
            LoadOutcome::Stale(StaleReason::Malformed)
        ));
    }

    #[test]
    fn test_load_missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.pdf")).is_err());
    }
}
