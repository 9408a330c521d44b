use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocfieldsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("No text could be extracted from the document: {0}")]
    EmptyDocument(String),

    #[error("Document error: {0}")]
    Document(String),

    /// A single unit's model call or output validation failed. Never fatal to a run.
    #[error("Extraction error: {0}")]
    UnitExtraction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DocfieldsError>;
