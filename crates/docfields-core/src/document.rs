use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DocfieldsError, Result};

/// One page or logical segment of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    /// 1-based page number in the source document.
    pub index: usize,
    pub content: String,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("failed to load document: {0}")]
    Load(String),

    #[error("failed to extract page {page}: {message}")]
    Page { page: usize, message: String },

    /// The adapter cannot produce layout-preserving text for this input.
    #[error("layout extraction not supported")]
    LayoutUnsupported,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DocumentError> for DocfieldsError {
    fn from(e: DocumentError) -> Self {
        DocfieldsError::Document(e.to_string())
    }
}

/// A paged document that can render each page to text.
///
/// Page numbers passed to the text methods are zero-based.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Layout-preserving text for one page.
    fn layout_text(&self, _page: usize) -> std::result::Result<String, DocumentError> {
        Err(DocumentError::LayoutUnsupported)
    }

    /// Plain text for one page. Used when layout extraction is unsupported.
    fn plain_text(&self, page: usize) -> std::result::Result<String, DocumentError>;
}

/// How many pages to take from the start page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "PageSelectionRepr", into = "PageSelectionRepr")]
pub enum PageSelection {
    Count(NonZeroUsize),
    #[default]
    All,
}

impl PageSelection {
    pub fn count(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(PageSelection::Count)
    }
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }
        s.parse::<usize>()
            .ok()
            .and_then(PageSelection::count)
            .ok_or_else(|| format!("page count must be a positive integer or \"ALL\", got \"{s}\""))
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelection::Count(n) => write!(f, "{n}"),
            PageSelection::All => f.write_str("ALL"),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum PageSelectionRepr {
    Number(i64),
    Text(String),
}

impl TryFrom<PageSelectionRepr> for PageSelection {
    type Error = String;

    fn try_from(repr: PageSelectionRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            PageSelectionRepr::Number(n) => usize::try_from(n)
                .ok()
                .and_then(PageSelection::count)
                .ok_or_else(|| format!("page count must be at least 1, got {n}")),
            PageSelectionRepr::Text(s) => s.parse(),
        }
    }
}

impl From<PageSelection> for PageSelectionRepr {
    fn from(selection: PageSelection) -> Self {
        match selection {
            PageSelection::Count(n) => PageSelectionRepr::Number(n.get() as i64),
            PageSelection::All => PageSelectionRepr::Text("ALL".into()),
        }
    }
}

/// Split a document into text units, starting at `start_page` (1-based).
///
/// Fails with [`DocfieldsError::EmptyDocument`] when the range is empty or no page
/// in it yields any text.
pub fn segment(
    source: &dyn PageSource,
    start_page: usize,
    selection: PageSelection,
) -> Result<Vec<TextUnit>> {
    let total = source.page_count();
    let start = start_page.max(1) - 1;
    let end = match selection {
        PageSelection::All => total,
        PageSelection::Count(n) => start.saturating_add(n.get()).min(total),
    };

    let mut units = Vec::with_capacity(end.saturating_sub(start));
    for page in start..end {
        let content = match source.layout_text(page) {
            Ok(text) => text,
            Err(DocumentError::LayoutUnsupported) => {
                tracing::debug!(page = page + 1, "Layout extraction unsupported, using plain text");
                source.plain_text(page)?
            }
            Err(e) => return Err(e.into()),
        };
        units.push(TextUnit {
            index: page + 1,
            content,
        });
    }

    if units.is_empty() {
        return Err(DocfieldsError::EmptyDocument(format!(
            "start page {start_page} is beyond the last page ({total})"
        )));
    }
    if units.iter().all(|u| u.content.trim().is_empty()) {
        return Err(DocfieldsError::EmptyDocument(format!(
            "pages {}-{} contain no text",
            start + 1,
            end
        )));
    }

    tracing::debug!(units = units.len(), total_pages = total, "Segmented document");

    Ok(units)
}
