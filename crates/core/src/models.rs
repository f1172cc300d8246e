use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Closed set of supported document formats, derived from the file extension.
///
/// Anything outside this set is inert during corpus discovery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
    Csv,
    Spreadsheet,
    SlideDeck,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::PlainText),
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Spreadsheet),
            "pptx" => Some(Self::SlideDeck),
            _ => None,
        }
    }

    /// Human-readable tag used in inline extraction diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::PlainText => "TXT",
            Self::Csv => "CSV",
            Self::Spreadsheet => "XLSX",
            Self::SlideDeck => "PPTX",
        }
    }
}

/// One nearest-neighbor result: a position into the aligned chunk sequence
/// plus its squared Euclidean distance from the query vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub chunk_index: usize,
    pub distance: f32,
}

/// Lifecycle of the managed index.
///
/// `Building` and `Rebuilding` are transient within a synchronous
/// `build_or_load` call; they are still tracked so callers can reason about
/// a manager observed mid-failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexStatus {
    Empty,
    Building,
    Ready,
    Stale,
    Rebuilding,
}

/// A document whose extraction failed and was downgraded to an inline
/// diagnostic instead of aborting the build.
#[derive(Debug, Clone)]
pub struct ExtractionFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a `build_or_load` call, for caller-side reporting.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// True when the persisted artifacts were reused without re-extraction.
    pub cache_hit: bool,
    pub document_count: usize,
    pub chunk_count: usize,
    pub failures: Vec<ExtractionFailure>,
    pub fingerprint: String,
    pub finished_at: DateTime<Utc>,
}

/// Sampling parameters forwarded to the generation service.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.3,
            top_p: 0.9,
        }
    }
}

/// A grounded answer plus the context block it was grounded on.
///
/// `context` is empty when the index was not ready or the generation call
/// failed; `text` then carries a sentinel or diagnostic message instead of
/// a model answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("Report.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("deck.pptx")),
            Some(DocumentFormat::SlideDeck)
        );
    }

    #[test]
    fn unsupported_extensions_are_inert() {
        assert_eq!(DocumentFormat::from_path(Path::new("archive.tar.gz")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("no_extension")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("image.png")), None);
    }
}
