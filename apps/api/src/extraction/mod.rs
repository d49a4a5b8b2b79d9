//! Text extraction for uploaded and Drive-downloaded documents.
//!
//! PDF via `pdf-extract`, DOCX via `docx-rs`, plain text and JSON decoded as
//! lossy UTF-8. Parsing is CPU-bound and some PDF inputs panic inside the
//! parser, so every extraction runs on a blocking thread and a panic is
//! reported as an unreadable file.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("Failed to read file: {0}")]
    Unreadable(String),
}

/// Where a document came from. Only changes the wording of user-facing notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Upload,
    Drive,
}

impl Origin {
    fn noun(self) -> &'static str {
        match self {
            Origin::Upload => "file",
            Origin::Drive => "Drive file",
        }
    }

    /// Message returned to the client when extraction fails.
    pub fn failure_notice(self, error: &ExtractionError) -> String {
        match error {
            ExtractionError::Unsupported(name) => {
                format!("Unsupported {} type: {name}", self.noun())
            }
            ExtractionError::Unreadable(reason) => {
                format!("Failed to read {}: {reason}", self.noun())
            }
        }
    }

    /// Message returned to the client when extraction yields only whitespace.
    pub fn empty_notice(self) -> String {
        format!("No readable text found in the {}.", self.noun())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentKind {
    /// Detects the kind from the file extension, then from the MIME type.
    pub fn detect(file_name: &str, mime_type: Option<&str>) -> Option<DocumentKind> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let by_extension = match extension.as_deref() {
            Some("pdf") => Some(DocumentKind::Pdf),
            Some("docx") => Some(DocumentKind::Docx),
            Some("txt") | Some("json") => Some(DocumentKind::PlainText),
            _ => None,
        };

        by_extension.or_else(|| {
            let mime = mime_type?.split(';').next()?.trim().to_ascii_lowercase();
            match mime.as_str() {
                PDF_MIME => Some(DocumentKind::Pdf),
                DOCX_MIME => Some(DocumentKind::Docx),
                "text/plain" | "application/json" => Some(DocumentKind::PlainText),
                _ => None,
            }
        })
    }
}

/// Extracts plain text from a document. May return an empty string; callers
/// decide what an empty document means for them.
pub async fn extract_text(
    file_name: &str,
    mime_type: Option<&str>,
    bytes: Vec<u8>,
) -> Result<String, ExtractionError> {
    let kind = DocumentKind::detect(file_name, mime_type)
        .ok_or_else(|| ExtractionError::Unsupported(file_name.to_string()))?;

    info!("Extracting text from {file_name} as {kind:?} ({} bytes)", bytes.len());

    let text = tokio::task::spawn_blocking(move || extract_sync(kind, &bytes))
        .await
        .map_err(|e| {
            warn!("Extraction task for {file_name} failed: {e}");
            ExtractionError::Unreadable(format!("parser aborted: {e}"))
        })??;

    Ok(text)
}

fn extract_sync(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractionError> {
    match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractionError::Unreadable(e.to_string())),
        DocumentKind::Docx => {
            let docx =
                docx_rs::read_docx(bytes).map_err(|e| ExtractionError::Unreadable(e.to_string()))?;
            Ok(docx_text(&docx))
        }
        DocumentKind::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DOCX
// ────────────────────────────────────────────────────────────────────────────

/// One line per non-empty paragraph; each table row becomes one line.
#[allow(irrefutable_let_patterns)]
fn docx_text(docx: &docx_rs::Docx) -> String {
    let mut out = String::new();

    for child in &docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(para) => {
                push_line(&mut out, &paragraph_text(para));
            }
            docx_rs::DocumentChild::Table(table) => {
                for child in &table.rows {
                    if let docx_rs::TableChild::TableRow(row) = child {
                        let cells: Vec<String> = row
                            .cells
                            .iter()
                            .filter_map(|cell| {
                                if let docx_rs::TableRowChild::TableCell(cell) = cell {
                                    Some(cell_text(cell))
                                } else {
                                    None
                                }
                            })
                            .filter(|t| !t.is_empty())
                            .collect();
                        push_line(&mut out, &cells.join(" "));
                    }
                }
            }
            _ => {}
        }
    }

    out
}

fn push_line(out: &mut String, line: &str) {
    let line = line.trim();
    if !line.is_empty() {
        out.push_str(line);
        out.push('\n');
    }
}

fn cell_text(cell: &docx_rs::TableCell) -> String {
    cell.children
        .iter()
        .filter_map(|content| match content {
            docx_rs::TableCellContent::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut line = String::new();
    for child in &para.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => run_text(run, &mut line),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = inner {
                        run_text(run, &mut line);
                    }
                }
            }
            _ => {}
        }
    }
    line
}

fn run_text(run: &docx_rs::Run, out: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(t) => out.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => out.push('\t'),
            docx_rs::RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
}
