use std::fs;

use docqa_core::Error;
use docqa_ingest::{is_supported, load_pages};
use tempfile::TempDir;

#[test]
fn loads_text_file_pages() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("manual.txt");
    fs::write(&path, "Chapter one\r\nSetup\u{0C}Chapter two\u{0C}   \u{0C}Appendix").expect("write");
    let pages = load_pages(&path).expect("load");
    assert_eq!(pages.len(), 4);
    assert_eq!(pages[0].text, "Chapter one\r\nSetup");
    assert_eq!(pages[3].page_number, 4);
    assert_eq!(pages[3].text, "Appendix");
}

#[test]
fn unsupported_extension_is_a_validation_error() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("slides.pptx");
    fs::write(&path, "x").expect("write");
    assert!(!is_supported(&path));
    assert!(matches!(load_pages(&path), Err(Error::Validation(_))));
}

#[test]
fn missing_file_surfaces_io_error() {
    let tmp = TempDir::new().expect("tmp");
    assert!(matches!(load_pages(&tmp.path().join("gone.txt")), Err(Error::Operation(_))));
}

#[test]
fn corrupt_pdf_fails_cleanly() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("broken.pdf");
    fs::write(&path, b"%PDF-1.4\nnot really a pdf").expect("write");
    assert!(load_pages(&path).is_err());
}
