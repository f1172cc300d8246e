//! Corpus discovery and change detection.
//!
//! The fingerprint is a SHA-256 digest over a deterministic, path-sorted
//! enumeration of every regular file under the raw directory: relative path
//! bytes, a NUL separator, then the file contents. Byte-identical corpora
//! always produce identical tokens; any added, removed, or modified file
//! changes the token.

use crate::error::IngestError;
use crate::models::DocumentFormat;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported documents under `raw_dir`, sorted by path. Files with
/// unrecognized extensions are silently skipped.
pub fn discover_documents(raw_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = list_files(raw_dir)
        .into_iter()
        .filter(|path| DocumentFormat::from_path(path).is_some())
        .collect();
    files.sort_unstable();
    files
}

/// Change-detection token over the entire raw document set.
pub fn corpus_fingerprint(raw_dir: &Path) -> Result<String, IngestError> {
    let mut files = list_files(raw_dir);
    files.sort_unstable();

    let mut hasher = Sha256::new();
    for path in files {
        let relative = path.strip_prefix(raw_dir).unwrap_or(&path);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(&fs::read(&path)?);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn list_files(raw_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(raw_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn identical_corpora_share_a_fingerprint() -> Result<(), Box<dyn std::error::Error>> {
        let first = tempdir()?;
        let second = tempdir()?;
        for dir in [first.path(), second.path()] {
            fs::write(dir.join("a.txt"), "alpha")?;
            fs::write(dir.join("b.txt"), "beta")?;
        }

        assert_eq!(
            corpus_fingerprint(first.path())?,
            corpus_fingerprint(second.path())?
        );
        Ok(())
    }

    #[test]
    fn single_byte_change_alters_the_fingerprint() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "alpha")?;
        let before = corpus_fingerprint(dir.path())?;

        fs::write(dir.path().join("a.txt"), "alphb")?;
        let after = corpus_fingerprint(dir.path())?;

        assert_ne!(before, after);
        Ok(())
    }

    #[test]
    fn adding_even_an_empty_file_alters_the_fingerprint(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "alpha")?;
        let before = corpus_fingerprint(dir.path())?;

        fs::write(dir.path().join("empty.txt"), "")?;
        let after = corpus_fingerprint(dir.path())?;

        assert_ne!(before, after);
        Ok(())
    }

    #[test]
    fn discovery_is_recursive_sorted_and_whitelisted(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("z.txt"), "z")?;
        fs::write(dir.path().join("nested/a.csv"), "a")?;
        fs::write(dir.path().join("ignored.bin"), "binary")?;

        let files = discover_documents(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("nested/a.csv"));
        assert!(files[1].ends_with("z.txt"));
        Ok(())
    }
}
