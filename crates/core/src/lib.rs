pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod index;
pub mod manager;
pub mod models;
pub mod query;

pub use chunking::{split_text, ChunkingConfig};
pub use embeddings::{
    Embedder, FramedEmbedder, HashedNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IndexError, IngestError, QueryError};
pub use extractor::{diagnostic_text, extract_document};
pub use fingerprint::{corpus_fingerprint, discover_documents};
pub use index::FlatIndex;
pub use manager::{IndexManager, CHUNKS_FILE, FINGERPRINT_FILE, INDEX_FILE};
pub use models::{
    Answer, BuildReport, DocumentFormat, ExtractionFailure, GenerationOptions, IndexStatus,
    SearchHit,
};
pub use query::{
    ChatCompletionsClient, CompletionClient, QueryEngine, DEFAULT_COMPLETIONS_ENDPOINT,
    DEFAULT_COMPLETIONS_MODEL, DEFAULT_TOP_K,
};
