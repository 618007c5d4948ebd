//! Parallel chunk processing utilities using Rayon.
//!
//! Distribution of chunks across workers lives here; the per-chunk transform
//! itself never coordinates across chunks.

use rayon::prelude::*;

use crate::array::{ChunkedArray, Result};
use crate::chunk::Chunk;

/// Minimum number of populated cells before enabling parallelization.
/// Below this threshold, sequential processing is faster due to
/// thread spawn overhead.
pub const PARALLEL_THRESHOLD: usize = 10_000;

/// Apply a fallible per-chunk transform to every chunk in parallel.
///
/// The first error aborts the whole operation; no partial result set is
/// returned.
pub fn process_chunks<F, T>(chunks: &[&Chunk], f: F) -> Result<Vec<T>>
where
    F: Fn(&Chunk) -> Result<T> + Sync + Send,
    T: Send,
{
    chunks.par_iter().map(|chunk| f(chunk)).collect()
}

/// Statistics for parallel work distribution.
#[derive(Debug, Clone)]
pub struct ChunkLoadStats {
    pub total_cells: usize,
    pub num_chunks: usize,
    /// (chunk start, populated cells), largest first.
    pub cells_per_chunk: Vec<(String, usize)>,
}

impl ChunkLoadStats {
    pub fn from_array(array: &ChunkedArray) -> Self {
        let mut cells_per_chunk: Vec<(String, usize)> = array
            .chunks()
            .iter()
            .map(|chunk| (chunk.start().to_string(), chunk.len()))
            .collect();
        cells_per_chunk.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            total_cells: array.num_cells(),
            num_chunks: array.num_chunks(),
            cells_per_chunk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArraySchema, Attribute, AttributeKind, Dimension};
    use crate::chunk::Coordinates;

    fn sample_array() -> ChunkedArray {
        let schema = ArraySchema::new(
            vec![Dimension::new("i", 1, 8, 4)],
            Attribute::new("s", AttributeKind::String),
        )
        .unwrap();
        let mut array = ChunkedArray::new(schema);
        array.insert(Coordinates::new(vec![1]), "x".to_string()).unwrap();
        array.insert(Coordinates::new(vec![2]), "y".to_string()).unwrap();
        array.insert(Coordinates::new(vec![6]), "z".to_string()).unwrap();
        array
    }

    #[test]
    fn test_process_chunks_preserves_order() {
        let array = sample_array();
        let chunks = array.chunks();
        let lens = process_chunks(&chunks, |c| Ok(c.len())).unwrap();
        assert_eq!(lens, vec![2, 1]);
    }

    #[test]
    fn test_process_chunks_propagates_errors() {
        let array = sample_array();
        let chunks = array.chunks();
        let result: Result<Vec<usize>> = process_chunks(&chunks, |c| {
            if c.len() == 1 {
                Err(crate::array::ArrayError::InvalidFormat("boom".to_string()))
            } else {
                Ok(c.len())
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_stats() {
        let stats = ChunkLoadStats::from_array(&sample_array());
        assert_eq!(stats.total_cells, 3);
        assert_eq!(stats.num_chunks, 2);
        assert_eq!(stats.cells_per_chunk[0].1, 2);
    }
}
