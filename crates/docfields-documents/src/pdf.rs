use std::path::Path;
use std::sync::OnceLock;

use lopdf::Document;
use tracing::{debug, warn};

use docfields_core::document::{DocumentError, PageSource};

/// PDF document backed by `lopdf`, with `pdf-extract` as the plain-text fallback.
pub struct PdfDocument {
    bytes: Vec<u8>,
    doc: Document,
    /// lopdf page numbers in document order.
    page_numbers: Vec<u32>,
    plain_pages: OnceLock<Result<Vec<String>, String>>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let doc = Document::load_mem(&bytes).map_err(|e| DocumentError::Load(e.to_string()))?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        debug!(pages = page_numbers.len(), bytes = bytes.len(), "Loaded PDF");

        Ok(Self {
            bytes,
            doc,
            page_numbers,
            plain_pages: OnceLock::new(),
        })
    }

    fn page_number(&self, page: usize) -> Result<u32, DocumentError> {
        self.page_numbers
            .get(page)
            .copied()
            .ok_or_else(|| DocumentError::Page {
                page: page + 1,
                message: format!("document has {} pages", self.page_numbers.len()),
            })
    }

    /// All pages through pdf-extract, computed once on first fallback.
    fn plain_pages(&self) -> Result<&[String], DocumentError> {
        self.plain_pages
            .get_or_init(|| {
                pdf_extract::extract_text_from_mem_by_pages(&self.bytes).map_err(|e| e.to_string())
            })
            .as_deref()
            .map_err(|e| DocumentError::Load(format!("pdf-extract failed: {e}")))
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    /// A page lopdf reads as blank is reported as unsupported so pdf-extract gets a try.
    fn layout_text(&self, page: usize) -> Result<String, DocumentError> {
        let number = self.page_number(page)?;
        let text = self.doc.extract_text(&[number]).map_err(|e| {
            warn!(page = page + 1, error = %e, "lopdf could not extract page text");
            DocumentError::LayoutUnsupported
        })?;
        if text.trim().is_empty() {
            debug!(page = page + 1, "lopdf returned no text for page");
            return Err(DocumentError::LayoutUnsupported);
        }
        Ok(text)
    }

    fn plain_text(&self, page: usize) -> Result<String, DocumentError> {
        self.page_number(page)?;
        let pages = self.plain_pages()?;
        pages.get(page).cloned().ok_or_else(|| DocumentError::Page {
            page: page + 1,
            message: format!("pdf-extract returned {} pages", pages.len()),
        })
    }
}
