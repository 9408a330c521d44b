pub mod api_types;
pub mod config;
pub mod document;
pub mod error;
pub mod extraction;
pub mod schema;

pub use api_types::ResultEnvelope;
pub use config::{AppConfig, PipelineOptions};
pub use document::{segment, DocumentError, PageSelection, PageSource, TextUnit};
pub use error::{DocfieldsError, Result};
pub use extraction::{ExtractionOutcome, ExtractionPrompt, StructuredExtractor};
pub use schema::{build_schema, BatchType, FieldDescriptor, FieldType, Record, RecordType};
