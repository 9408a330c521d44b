use std::path::Path;

use docfields_core::document::{DocumentError, PageSource};

/// Page separator in plain-text documents.
pub const PAGE_BREAK: char = '\x0c';

/// UTF-8 text document paginated on form feeds.
#[derive(Debug, Clone)]
pub struct TextDocument {
    pages: Vec<String>,
}

impl TextDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    pub fn from_text(text: &str) -> Self {
        let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
        // A trailing form feed closes the last page rather than opening a new one.
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        if pages.len() == 1 && pages[0].is_empty() {
            pages.clear();
        }
        Self { pages }
    }

    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }

    fn page(&self, page: usize) -> Result<&str, DocumentError> {
        self.pages
            .get(page)
            .map(String::as_str)
            .ok_or_else(|| DocumentError::Page {
                page: page + 1,
                message: format!("document has {} pages", self.pages.len()),
            })
    }
}

impl PageSource for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn layout_text(&self, page: usize) -> Result<String, DocumentError> {
        self.page(page).map(str::to_string)
    }

    fn plain_text(&self, page: usize) -> Result<String, DocumentError> {
        self.page(page).map(|p| p.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_form_feed() {
        let doc = TextDocument::from_text("first\n\x0csecond\n\x0cthird\n\x0c");
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.layout_text(0).unwrap(), "first\n");
        assert_eq!(doc.layout_text(2).unwrap(), "third\n");
        assert_eq!(doc.plain_text(1).unwrap(), "second");
    }

    #[test]
    fn test_single_page_without_breaks() {
        let doc = TextDocument::from_text("Invoice 42\nTotal: 10.00");
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_empty_text_has_no_pages() {
        assert_eq!(TextDocument::from_text("").page_count(), 0);
    }

    #[test]
    fn test_out_of_range_page() {
        let doc = TextDocument::from_pages(["only"]);
        assert!(matches!(
            doc.layout_text(1),
            Err(DocumentError::Page { page: 2, .. })
        ));
    }
}
