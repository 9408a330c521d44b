use std::path::Path;

use docfields_core::document::{DocumentError, PageSource};

mod pdf;
mod text;

pub use pdf::PdfDocument;
pub use text::{TextDocument, PAGE_BREAK};

/// Open a document, picking the adapter by file extension.
pub fn open_document(path: &Path) -> Result<Box<dyn PageSource>, DocumentError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    tracing::info!(path = %path.display(), extension = %extension, "Opening document");

    match extension.as_str() {
        "pdf" => Ok(Box::new(PdfDocument::open(path)?)),
        "txt" | "text" | "md" | "markdown" => Ok(Box::new(TextDocument::open(path)?)),
        "" => Err(DocumentError::Unsupported(format!(
            "{} has no file extension",
            path.display()
        ))),
        other => Err(DocumentError::Unsupported(other.to_string())),
    }
}
