//! Text extraction from uploaded bytes.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::ExtractionError;
use crate::utils::file::{is_binary_extension, looks_binary};

static RE_TRAILING_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static RE_MULTI_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Turns an uploaded file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extractor for UTF-8 text files like markdown or source code.
///
/// Binary formats are rejected; PDFs go through [`PdfExtractor`].
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    max_size: u64,
}

impl PlainTextExtractor {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

fn check_size(bytes: &[u8], max_size: u64) -> Result<(), ExtractionError> {
    let size = bytes.len() as u64;
    if size > max_size {
        return Err(ExtractionError::TooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        check_size(bytes, self.max_size)?;

        if let Some(ext) = extension(filename)
            && is_binary_extension(&ext)
        {
            return Err(ExtractionError::UnsupportedFormat(format!(
                "{filename} (.{ext} files need a dedicated extractor)"
            )));
        }

        if looks_binary(bytes) {
            return Err(ExtractionError::UnsupportedFormat(format!(
                "{filename} looks like a binary file"
            )));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| ExtractionError::InvalidEncoding(format!("{filename}: {e}")))?;

        Ok(normalize_text(text))
    }
}

/// Extractor for PDF files. Pages are concatenated in order.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    max_size: u64,
}

impl PdfExtractor {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        check_size(bytes, self.max_size)?;

        // pdf-extract panics on some malformed files
        let text = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(bytes)
        }))
        .map_err(|_| ExtractionError::Malformed(format!("{filename}: unreadable PDF")))?
        .map_err(|e| ExtractionError::Malformed(format!("{filename}: {e}")))?;

        debug!(document = filename, chars = text.chars().count(), "extracted PDF text");
        Ok(normalize_text(&text))
    }
}

/// Picks an extractor from the file extension or, failing that, the
/// `%PDF-` magic bytes.
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    text: PlainTextExtractor,
    pdf: PdfExtractor,
}

impl DocumentExtractor {
    pub fn new(max_size: u64) -> Self {
        Self {
            text: PlainTextExtractor::new(max_size),
            pdf: PdfExtractor::new(max_size),
        }
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        if extension(filename).as_deref() == Some("pdf") || bytes.starts_with(b"%PDF-") {
            self.pdf.extract(filename, bytes)
        } else {
            self.text.extract(filename, bytes)
        }
    }
}

/// Normalize line endings, strip trailing spaces and collapse blank-line runs.
pub fn normalize_text(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = RE_TRAILING_SPACE.replace_all(&text, "");
    RE_MULTI_BLANK_LINES.replace_all(&text, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PlainTextExtractor {
        PlainTextExtractor::new(1024)
    }

    #[test]
    fn test_extracts_utf8_text() {
        let text = extractor().extract("notes.md", "# Title\n\nBody".as_bytes()).unwrap();
        assert_eq!(text, "# Title\n\nBody");
    }

    #[test]
    fn test_normalizes_whitespace() {
        let raw = "\u{feff}line one  \r\nline two\r\n\r\n\r\n\r\nline three\t\n";
        assert_eq!(
            normalize_text(raw),
            "line one\nline two\n\nline three\n"
        );
    }

    #[test]
    fn test_rejects_pdf() {
        let err = extractor().extract("paper.pdf", b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
    }

    /// Single-page PDF showing `text` in a standard font.
    fn pdf_with_text(text: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
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

    #[test]
    fn test_extracts_pdf_text() {
        let bytes = pdf_with_text("The cat sat on the mat");
        let text = PdfExtractor::new(1 << 20).extract("cat.pdf", &bytes).unwrap();
        assert!(text.contains("The cat sat on the mat"), "got {text:?}");
    }

    #[test]
    fn test_malformed_pdf() {
        let err = PdfExtractor::new(1024)
            .extract("broken.pdf", b"%PDF-1.7\nnot really a pdf")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_pdf_size_limit() {
        let bytes = pdf_with_text("hello");
        let err = PdfExtractor::new(8).extract("a.pdf", &bytes).unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { max: 8, .. }));
    }

    #[test]
    fn test_document_extractor_routes_by_format() {
        let extractor = DocumentExtractor::new(1 << 20);
        let pdf = pdf_with_text("Routing works");

        assert!(extractor.extract("a.pdf", &pdf).unwrap().contains("Routing works"));
        // no extension, recognised by content
        assert!(extractor.extract("upload", &pdf).unwrap().contains("Routing works"));
        assert_eq!(extractor.extract("notes.txt", b"plain").unwrap(), "plain");
        assert!(matches!(
            extractor.extract("image.png", b"png").unwrap_err(),
            ExtractionError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn test_rejects_binary_content() {
        let err = extractor().extract("blob", &[0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let err = extractor().extract("latin1.txt", &[0x63, 0x61, 0x66, 0xe9]).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidEncoding(_)));
    }

    #[test]
    fn test_rejects_oversized() {
        let err = PlainTextExtractor::new(4).extract("big.txt", b"12345").unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { size: 5, max: 4 }));
    }
}
