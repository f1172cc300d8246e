use thiserror::Error;

/// Failures on the ingestion/build side of the pipeline.
///
/// Per-document extraction failures are downgraded to inline diagnostics by
/// the index manager and never surface through this type; what remains here
/// is fatal to a build attempt.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("document archive error: {0}")]
    Ooxml(String),

    #[error("path has no file stem: {0}")]
    MissingFileStem(String),

    #[error("no content: the corpus produced no chunks")]
    NoContent,

    #[error("chunk snapshot error: {0}")]
    ChunkSnapshot(#[from] serde_json::Error),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Failures of the flat vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index not ready: no vectors have been indexed")]
    NotReady,

    #[error("index serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the external generation service client.
///
/// The query engine catches these and converts them into diagnostic answer
/// strings; they never propagate past [`crate::QueryEngine::answer`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion backend returned {status}: {details}")]
    BackendResponse { status: String, details: String },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
