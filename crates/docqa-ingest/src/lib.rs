//! Page-segmented text extraction.
//!
//! PDFs go through `pdf-extract` one page at a time. Plain text files are
//! split on form feeds, so a `.txt` export of a paginated document keeps its
//! page numbers. Page numbers start at 1.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use docqa_core::types::PageText;
use docqa_core::{Error, Result};

const FORM_FEED: char = '\u{0C}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Text,
}

impl SourceKind {
    /// Chosen by extension, case-insensitively. `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    SourceKind::from_path(path).is_some()
}

/// Extract one `PageText` per PDF page, blank pages included.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>> {
    if !bytes.starts_with(b"%PDF") {
        return Err(Error::validation("input is not a PDF (missing %PDF header)"));
    }
    // pdf-extract panics on some malformed inputs
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| Error::Operation("PDF extraction panicked".into()))?
        .map_err(|e| Error::Operation(format!("PDF extraction failed: {e}")))?;
    let pages = number_pages(pages);
    debug!(pages = pages.len(), "extracted PDF");
    Ok(pages)
}

/// Split on form feeds. Text without one is a single page.
pub fn split_text_pages(text: &str) -> Vec<PageText> {
    number_pages(text.split(FORM_FEED).map(str::to_string))
}

fn number_pages(pages: impl IntoIterator<Item = String>) -> Vec<PageText> {
    pages
        .into_iter()
        .zip(1u32..)
        .map(|(text, page_number)| PageText { page_number, text })
        .collect()
}

/// Read `path` and extract its pages according to its extension.
pub fn load_pages(path: &Path) -> Result<Vec<PageText>> {
    let kind = SourceKind::from_path(path)
        .ok_or_else(|| Error::validation(format!("unsupported file type: {}", path.display())))?;
    info!(path = %path.display(), ?kind, "reading document");
    let pages = match kind {
        SourceKind::Pdf => extract_pages(&fs::read(path)?)?,
        SourceKind::Text => split_text_pages(&fs::read_to_string(path)?),
    };
    if pages.iter().all(|p| p.text.trim().is_empty()) {
        warn!(path = %path.display(), "document has no extractable text");
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_feeds_separate_pages() {
        let pages = split_text_pages("intro\u{0C}body\u{0C}\u{0C}end");
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(pages[1].text, "body");
        assert_eq!(pages[2].text, "");
    }

    #[test]
    fn text_without_form_feed_is_one_page() {
        let pages = split_text_pages("just one page\nwith two lines");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
    }

    #[test]
    fn kind_follows_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a/B.PDF")), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_path(Path::new("notes.txt")), Some(SourceKind::Text));
        assert_eq!(SourceKind::from_path(Path::new("image.png")), None);
        assert_eq!(SourceKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn non_pdf_bytes_are_rejected() {
        assert!(matches!(extract_pages(b"hello"), Err(Error::Validation(_))));
    }
}
