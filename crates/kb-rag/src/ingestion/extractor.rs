//! Text extraction from uploaded file bytes
//!
//! Extraction is pure: bytes and a declared MIME type in, plain text out.
//! No external state is touched, so the extractor is unit-testable with
//! fixture byte arrays.

use crate::error::{Error, Result};

/// MIME type of plain text files
pub const MIME_TEXT_PLAIN: &str = "text/plain";
/// MIME type of Markdown files
pub const MIME_TEXT_MARKDOWN: &str = "text/markdown";
/// MIME type of Word documents (.docx)
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Text extracted from a document
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Full extracted text
    pub text: String,
}

/// Converts raw file bytes into plain text
pub struct TextExtractor;

impl TextExtractor {
    /// Extract plain text from file bytes
    ///
    /// Supports plain text (direct UTF-8 decode) and DOCX (structural
    /// paragraph extraction, formatting discarded). Fails with
    /// `UnsupportedFormat` for other MIME types and `EmptyContent` when
    /// extraction yields only whitespace.
    pub fn extract(bytes: &[u8], mime_type: &str) -> Result<ExtractedText> {
        let text = match mime_type {
            MIME_DOCX => Self::extract_docx(bytes)?,
            mime if mime == MIME_TEXT_PLAIN
                || mime == MIME_TEXT_MARKDOWN
                || mime.starts_with("text/") =>
            {
                Self::extract_plain(bytes)
            }
            other => return Err(Error::UnsupportedFormat(other.to_string())),
        };

        if text.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        Ok(ExtractedText { text })
    }

    /// Guess a MIME type from a file name, for callers whose upload layer
    /// did not supply a usable one
    pub fn detect_mime(file_name: &str) -> String {
        mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string()
    }

    /// Decode bytes as UTF-8 text, replacing invalid sequences
    fn extract_plain(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    /// Extract paragraph text from a DOCX document
    fn extract_docx(bytes: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(bytes)
            .map_err(|e| Error::UnsupportedFormat(format!("invalid docx: {}", e)))?;

        let mut text = String::new();

        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                text.push('\n');
            }
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_docx(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = docx_rs::Docx::new();
        for p in paragraphs {
            docx = docx.add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*p)),
            );
        }

        let mut cursor = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_extract_plain_text() {
        let extracted = TextExtractor::extract(b"hello world", MIME_TEXT_PLAIN).unwrap();
        assert_eq!(extracted.text, "hello world");
    }

    #[test]
    fn test_extract_markdown_as_text() {
        let extracted = TextExtractor::extract(b"# Title\n\nbody", MIME_TEXT_MARKDOWN).unwrap();
        assert!(extracted.text.contains("Title"));
    }

    #[test]
    fn test_extract_docx_paragraphs() {
        let bytes = sample_docx(&["First paragraph.", "Second paragraph."]);
        let extracted = TextExtractor::extract(&bytes, MIME_DOCX).unwrap();

        assert!(extracted.text.contains("First paragraph."));
        assert!(extracted.text.contains("Second paragraph."));
    }

    #[test]
    fn test_unsupported_format() {
        let err = TextExtractor::extract(b"%PDF-1.4", "application/pdf").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_whitespace_only_is_empty_content() {
        let err = TextExtractor::extract(b"   \n\t  ", MIME_TEXT_PLAIN).unwrap_err();
        assert!(matches!(err, Error::EmptyContent));
    }

    #[test]
    fn test_detect_mime_from_filename() {
        assert_eq!(TextExtractor::detect_mime("notes.txt"), "text/plain");
        assert_eq!(
            TextExtractor::detect_mime("report.docx"),
            MIME_DOCX
        );
    }
}
