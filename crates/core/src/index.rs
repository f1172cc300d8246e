//! Flat (exhaustive) nearest-neighbor index over squared Euclidean distance.
//!
//! Correctness over speed: every search scans all vectors, which is the right
//! tradeoff for small-to-medium corpora. The index owns no text; it refers to
//! chunks purely by position, and the caller is responsible for keeping the
//! chunk sequence aligned.

use crate::error::IndexError;
use crate::models::SearchHit;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatIndex {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Build a fresh index from `vectors`. All vectors must share one
    /// dimensionality; an empty input yields an empty (not-ready) index.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
        for vector in &vectors {
            if vector.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }
        }
        Ok(Self {
            dimensions,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Up to `k` nearest neighbors of `query`, ascending by squared L2
    /// distance. Returns all vectors when fewer than `k` exist.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.vectors.is_empty() {
            return Err(IndexError::NotReady);
        }
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(chunk_index, vector)| SearchHit {
                chunk_index,
                distance: squared_l2(query, vector),
            })
            .collect();

        hits.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a persisted index. The result answers `search` identically to
    /// the index that produced the file.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let reader = BufReader::new(File::open(path)?);
        let index: Self = bincode::deserialize_from(reader)?;
        for vector in &index.vectors {
            if vector.len() != index.dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: index.dimensions,
                    actual: vector.len(),
                });
            }
        }
        Ok(index)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
