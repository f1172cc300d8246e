//! Build-vs-reuse orchestration and on-disk cache layout.
//!
//! The manager owns three directories: the raw corpus, the processed-text
//! mirror (one `.txt` per document, for inspection only), and the cache with
//! its artifact triple — binary index, chunk snapshot, fingerprint token.
//! The triple is only trusted as a mutually consistent whole; anything less
//! is a cache miss and triggers a full rebuild. Rebuilds are never
//! incremental: one changed byte anywhere re-extracts and re-embeds the
//! entire corpus, a deliberate simplicity/cost tradeoff.
//!
//! Not thread-safe: `build_or_load` takes `&mut self`, and callers must not
//! interleave queries with a build on the same instance.

use chrono::Utc;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::{Embedder, FramedEmbedder};
use crate::error::IngestError;
use crate::extractor;
use crate::fingerprint::{corpus_fingerprint, discover_documents};
use crate::index::FlatIndex;
use crate::models::{BuildReport, DocumentFormat, ExtractionFailure, IndexStatus};

pub const INDEX_FILE: &str = "index.bin";
pub const CHUNKS_FILE: &str = "chunks.json";
pub const FINGERPRINT_FILE: &str = "fingerprint.txt";

pub struct IndexManager<E: Embedder> {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    cache_dir: PathBuf,
    chunking: ChunkingConfig,
    embedder: FramedEmbedder<E>,
    status: IndexStatus,
    index: Option<FlatIndex>,
    chunks: Vec<String>,
}

impl<E: Embedder> IndexManager<E> {
    /// Create a manager over the given directories, creating them as needed.
    pub fn new(
        raw_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        chunking: ChunkingConfig,
        embedder: E,
    ) -> Result<Self, IngestError> {
        let raw_dir = raw_dir.into();
        let processed_dir = processed_dir.into();
        let cache_dir = cache_dir.into();
        for dir in [&raw_dir, &processed_dir, &cache_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            raw_dir,
            processed_dir,
            cache_dir,
            chunking,
            embedder: FramedEmbedder::new(embedder),
            status: IndexStatus::Empty,
            index: None,
            chunks: Vec::new(),
        })
    }

    /// Reuse the persisted artifacts when the corpus is unchanged, otherwise
    /// run the full extract → chunk → embed → index pipeline and persist the
    /// result. `force` skips the cache check entirely.
    pub fn build_or_load(&mut self, force: bool) -> Result<BuildReport, IngestError> {
        let current = corpus_fingerprint(&self.raw_dir)?;

        if !force {
            if let Some((index, chunks)) = self.try_load_cache(&current) {
                let report = BuildReport {
                    cache_hit: true,
                    document_count: discover_documents(&self.raw_dir).len(),
                    chunk_count: chunks.len(),
                    failures: Vec::new(),
                    fingerprint: current,
                    finished_at: Utc::now(),
                };
                self.index = Some(index);
                self.chunks = chunks;
                self.status = IndexStatus::Ready;
                return Ok(report);
            }
        }

        if self.status == IndexStatus::Ready {
            self.status = IndexStatus::Stale;
        }
        self.status = match self.status {
            IndexStatus::Stale => IndexStatus::Rebuilding,
            _ => IndexStatus::Building,
        };

        let documents = discover_documents(&self.raw_dir);
        let mut chunks: Vec<String> = Vec::new();
        let mut failures = Vec::new();

        for path in &documents {
            let format = match DocumentFormat::from_path(path) {
                Some(format) => format,
                None => continue,
            };
            let (text, failed) = match extractor::extract_document(path, format) {
                Ok(text) => (text, false),
                Err(error) => {
                    failures.push(ExtractionFailure {
                        path: path.clone(),
                        reason: error.to_string(),
                    });
                    (extractor::diagnostic_text(format, &error), true)
                }
            };
            self.persist_processed_text(path, &text)?;
            // Diagnostics are persisted for inspection but never indexed.
            if !failed {
                chunks.extend(split_text(&text, self.chunking));
            }
        }

        if chunks.is_empty() {
            self.index = None;
            self.chunks.clear();
            self.status = IndexStatus::Empty;
            return Err(IngestError::NoContent);
        }

        let embeddings = self.embedder.embed_passages(&chunks);
        let index = FlatIndex::build(embeddings)?;

        // Fingerprint is written last: a crash between writes leaves a torn
        // triple that fails the cache check on the next load.
        index.save(&self.cache_dir.join(INDEX_FILE))?;
        let mut writer = BufWriter::new(File::create(self.cache_dir.join(CHUNKS_FILE))?);
        serde_json::to_writer(&mut writer, &chunks)?;
        writer.flush()?;
        fs::write(self.cache_dir.join(FINGERPRINT_FILE), &current)?;

        let report = BuildReport {
            cache_hit: false,
            document_count: documents.len(),
            chunk_count: chunks.len(),
            failures,
            fingerprint: current,
            finished_at: Utc::now(),
        };
        self.index = Some(index);
        self.chunks = chunks;
        self.status = IndexStatus::Ready;
        Ok(report)
    }

    /// The persisted bundle is trusted only when all three artifacts exist,
    /// the token matches, both deserialize, the chunk count equals the vector
    /// count, and the dimensionality matches the configured embedder.
    fn try_load_cache(&self, current: &str) -> Option<(FlatIndex, Vec<String>)> {
        let index_path = self.cache_dir.join(INDEX_FILE);
        let chunks_path = self.cache_dir.join(CHUNKS_FILE);
        let fingerprint_path = self.cache_dir.join(FINGERPRINT_FILE);
        if !(index_path.exists() && chunks_path.exists() && fingerprint_path.exists()) {
            return None;
        }

        let persisted = fs::read_to_string(&fingerprint_path).ok()?;
        if persisted.trim() != current {
            return None;
        }

        let index = FlatIndex::load(&index_path).ok()?;
        let chunks: Vec<String> =
            serde_json::from_reader(BufReader::new(File::open(&chunks_path).ok()?)).ok()?;

        if chunks.len() != index.len() {
            return None;
        }
        if !index.is_empty() && index.dimensions() != self.embedder.dimensions() {
            return None;
        }
        Some((index, chunks))
    }

    fn persist_processed_text(&self, source: &Path, text: &str) -> Result<(), IngestError> {
        let stem = source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| IngestError::MissingFileStem(source.display().to_string()))?;
        let mut writer =
            BufWriter::new(File::create(self.processed_dir.join(format!("{stem}.txt")))?);
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn status(&self) -> IndexStatus {
        self.status
    }

    pub fn embedder(&self) -> &FramedEmbedder<E> {
        &self.embedder
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Index and aligned chunk sequence, only while `Ready`.
    pub fn snapshot(&self) -> Option<(&FlatIndex, &[String])> {
        match (&self.index, self.status) {
            (Some(index), IndexStatus::Ready) if !self.chunks.is_empty() => {
                Some((index, self.chunks.as_slice()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use tempfile::{tempdir, TempDir};

    fn manager_in(dir: &TempDir) -> IndexManager<HashedNgramEmbedder> {
        IndexManager::new(
            dir.path().join("raw_docs"),
            dir.path().join("processed"),
            dir.path().join("cache"),
            ChunkingConfig::default(),
            HashedNgramEmbedder::default(),
        )
        .expect("manager setup")
    }

    #[test]
    fn single_text_document_builds_one_aligned_chunk(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("a.txt"), "hello world")?;

        let report = manager.build_or_load(false)?;
        assert!(!report.cache_hit);
        assert_eq!(report.chunk_count, 1);
        assert_eq!(manager.status(), IndexStatus::Ready);

        let (index, chunks) = manager.snapshot().expect("ready");
        assert_eq!(chunks, ["hello world"]);
        assert_eq!(index.len(), chunks.len());

        let query = manager.embedder().embed_query("greeting");
        let hits = index.search(&query, 6)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_index, 0);
        Ok(())
    }

    #[test]
    fn second_build_is_a_cache_hit() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("a.txt"), "hello world")?;

        assert!(!manager.build_or_load(false)?.cache_hit);
        let second = manager.build_or_load(false)?;
        assert!(second.cache_hit);

        let (index, chunks) = manager.snapshot().expect("ready");
        assert_eq!(index.len(), chunks.len());
        Ok(())
    }

    #[test]
    fn force_rebuilds_despite_a_fresh_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("a.txt"), "hello world")?;

        manager.build_or_load(false)?;
        assert!(!manager.build_or_load(true)?.cache_hit);
        Ok(())
    }

    #[test]
    fn modified_corpus_invalidates_the_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("a.txt"), "hello world")?;
        manager.build_or_load(false)?;

        fs::write(manager.raw_dir().join("a.txt"), "hello there")?;
        let report = manager.build_or_load(false)?;
        assert!(!report.cache_hit);

        let (_, chunks) = manager.snapshot().expect("ready");
        assert_eq!(chunks, ["hello there"]);
        Ok(())
    }

    #[test]
    fn missing_artifact_is_a_cache_miss() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("a.txt"), "hello world")?;
        manager.build_or_load(false)?;

        fs::remove_file(dir.path().join("cache").join(CHUNKS_FILE))?;
        assert!(!manager.build_or_load(false)?.cache_hit);
        Ok(())
    }

    #[test]
    fn count_mismatch_in_cache_triggers_rebuild() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("a.txt"), "hello world")?;
        manager.build_or_load(false)?;

        // Tamper: snapshot now claims two chunks while the index holds one.
        fs::write(
            dir.path().join("cache").join(CHUNKS_FILE),
            serde_json::to_string(&vec!["hello world", "stray"])?,
        )?;
        let report = manager.build_or_load(false)?;
        assert!(!report.cache_hit);

        let (index, chunks) = manager.snapshot().expect("ready");
        assert_eq!(index.len(), chunks.len());
        Ok(())
    }

    #[test]
    fn empty_corpus_fails_with_no_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);

        let result = manager.build_or_load(false);
        assert!(matches!(result, Err(IngestError::NoContent)));
        assert_eq!(manager.status(), IndexStatus::Empty);
        assert!(manager.snapshot().is_none());
        Ok(())
    }

    #[test]
    fn corrupt_sole_document_is_no_content_with_diagnostic(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("corrupt.pdf"), b"%PDF-1.4 not a pdf")?;

        let result = manager.build_or_load(false);
        assert!(matches!(result, Err(IngestError::NoContent)));

        let processed = fs::read_to_string(dir.path().join("processed").join("corrupt.txt"))?;
        assert!(processed.starts_with("[error reading PDF:"));
        Ok(())
    }

    #[test]
    fn corrupt_document_does_not_abort_the_build() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("corrupt.pdf"), b"%PDF-1.4 not a pdf")?;
        fs::write(manager.raw_dir().join("notes.txt"), "useful content survives")?;

        let report = manager.build_or_load(false)?;
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("corrupt.pdf"));

        let (_, chunks) = manager.snapshot().expect("ready");
        assert_eq!(chunks, ["useful content survives"]);
        Ok(())
    }

    #[test]
    fn unsupported_files_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut manager = manager_in(&dir);
        fs::write(manager.raw_dir().join("a.txt"), "hello world")?;
        fs::write(manager.raw_dir().join("image.png"), [0u8, 1, 2, 3])?;

        let report = manager.build_or_load(false)?;
        assert_eq!(report.document_count, 1);
        assert!(report.failures.is_empty());
        Ok(())
    }

    #[test]
    fn fresh_manager_loads_the_previous_build() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut first = manager_in(&dir);
        fs::write(first.raw_dir().join("a.txt"), "persisted across restarts")?;
        first.build_or_load(false)?;

        let mut second = manager_in(&dir);
        let report = second.build_or_load(false)?;
        assert!(report.cache_hit);

        let (index, chunks) = second.snapshot().expect("ready");
        assert_eq!(chunks, ["persisted across restarts"]);
        assert_eq!(index.len(), chunks.len());
        Ok(())
    }
}
