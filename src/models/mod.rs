pub mod document;
pub mod request;
pub mod response;

pub use document::{Document, PdfMetadata, Section};
pub use request::{
    ContentSource, ExtractionKind, ExtractionRequest, ExtractionTask, SourceType,
    SummarizationRequest,
};
pub use response::{Entity, ExtractionResponse, KeyValuePair, SummarizationResponse};
