//! Local search abstraction.
//!
//! The orchestrator always consults the local index first, through the
//! [`LocalSearch`] trait. The application crate provides a SQLite FTS5
//! implementation; [`memory::InMemoryIndex`] is a dependency-free version
//! for tests and embedding.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::LocalResultSet;

pub use memory::{InMemoryIndex, IndexedPaper};

/// A searchable local corpus.
///
/// An empty [`LocalResultSet`] is a valid answer meaning "no matches"; an
/// `Err` means the index itself could not be queried and is fatal to the
/// resolution.
#[async_trait]
pub trait LocalSearch: Send + Sync {
    async fn search(&self, query_text: &str, limit: usize) -> Result<LocalResultSet>;
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If every score is equal (including the single-item case), every item
/// gets `1.0`.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }

    let s_min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    raw.iter()
        .map(|s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scores() {
        assert_eq!(normalize_scores(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_normalize_scores_equal() {
        assert_eq!(normalize_scores(&[7.0, 7.0]), vec![1.0, 1.0]);
        assert_eq!(normalize_scores(&[0.3]), vec![1.0]);
    }

    #[test]
    fn test_normalize_scores_empty() {
        assert!(normalize_scores(&[]).is_empty());
    }
}
