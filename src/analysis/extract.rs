//! Page text extraction for PDF documents.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::DocumentAnalysis;

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no extractable text in {0}")]
    NoText(PathBuf),

    #[error("PDF parsing failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract page-ordered text from a PDF file.
///
/// A document with zero pages of content is a hard failure: the source is
/// not a usable document, and an empty result must never be cached as done.
pub fn extract_pages_text(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
        ExtractionError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    if pages.iter().all(|p| p.trim().is_empty()) {
        return Err(ExtractionError::NoText(path.to_path_buf()));
    }

    Ok(pages)
}

/// Materialize `pages_text` on the record, extracting at most once.
///
/// Returns the pages and whether extraction ran; when it did, the caller is
/// responsible for persisting the record. On extraction failure the record
/// is untouched.
pub fn ensure_pages_text<'a>(
    record: &'a mut DocumentAnalysis,
    source: &Path,
) -> Result<(&'a [String], bool), ExtractionError> {
    let extracted = if record.pages_text.is_none() {
        debug!("extracting text from {}", source.display());
        record.pages_text = Some(extract_pages_text(source)?);
        true
    } else {
        false
    };

    match record.pages_text.as_deref() {
        Some(pages) => Ok((pages, extracted)),
        None => Err(ExtractionError::NoText(source.to_path_buf())),
    }
}

/// Build a small valid PDF with one page of text per entry, via lopdf.
#[cfg(test)]
pub(crate) fn make_test_pdf(texts: &[&str]) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for text in texts {
        let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    #[test]
    fn test_extracts_page_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, make_test_pdf(&["hello fees", "second page"])).unwrap();

        let pages = extract_pages_text(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("hello fees"));
        assert!(pages[1].contains("second page"));
    }

    #[test]
    fn test_garbage_input_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(
            extract_pages_text(&path),
            Err(ExtractionError::Pdf { .. })
        ));
    }

    #[test]
    fn test_ensure_extracts_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        let bytes = make_test_pdf(&["only page"]);
        std::fs::write(&path, &bytes).unwrap();

        let mut record = DocumentAnalysis::new("alpha", fingerprint(&bytes), "Uncategorized");

        let (pages, extracted) = ensure_pages_text(&mut record, &path).unwrap();
        assert!(extracted);
        let first = pages.to_vec();

        // Delete the source: the second call must come from the cache.
        std::fs::remove_file(&path).unwrap();
        let (pages, extracted) = ensure_pages_text(&mut record, &path).unwrap();
        assert!(!extracted);
        assert_eq!(pages, first.as_slice());
    }

    #[test]
    fn test_empty_result_is_never_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, make_test_pdf(&[" "])).unwrap();

        let mut record = DocumentAnalysis::new(
            "alpha",
            fingerprint(&std::fs::read(&path).unwrap()),
            "Uncategorized",
        );
        assert!(ensure_pages_text(&mut record, &path).is_err());
        assert!(record.pages_text.is_none());
    }
}
