//! Chunk collector: materializes one chunk's values into a working batch.
//!
//! The batch is owned by a single chunk pass. It carries no ordering promise
//! beyond being a complete enumeration of the chunk's values, and it never
//! aliases the chunk's own storage.

use crate::array::{ArrayError, Result};
use crate::chunk::Chunk;

/// Copy every value in the chunk into an owned batch.
///
/// Values are copied byte for byte; empty strings are legal and preserved.
/// Batch storage is reserved up front, and a failed reservation aborts the
/// chunk pass rather than producing a truncated batch.
pub fn collect_values(chunk: &Chunk) -> Result<Vec<String>> {
    let mut batch: Vec<String> = Vec::new();
    batch.try_reserve_exact(chunk.len()).map_err(|e| {
        ArrayError::Resource(format!(
            "batch of {} values for chunk at {}: {}",
            chunk.len(),
            chunk.start(),
            e
        ))
    })?;
    batch.extend(chunk.values().map(str::to_owned));
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Coordinates;

    fn chunk_with(values: &[&str]) -> Chunk {
        let mut chunk = Chunk::new(Coordinates::new(vec![1]), vec![values.len() as i64]);
        for (i, v) in values.iter().enumerate() {
            chunk
                .insert(Coordinates::new(vec![1 + i as i64]), v.to_string())
                .unwrap();
        }
        chunk
    }

    #[test]
    fn test_collects_every_value() {
        let chunk = chunk_with(&["x", "y", "x", "a"]);
        let mut batch = collect_values(&chunk).unwrap();
        batch.sort_unstable();
        assert_eq!(batch, vec!["a", "x", "x", "y"]);
    }

    #[test]
    fn test_empty_chunk_yields_empty_batch() {
        let chunk = Chunk::new(Coordinates::new(vec![1]), vec![4]);
        assert!(collect_values(&chunk).unwrap().is_empty());
    }

    #[test]
    fn test_empty_strings_preserved() {
        let chunk = chunk_with(&["", "a", ""]);
        let batch = collect_values(&chunk).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.iter().filter(|v| v.is_empty()).count(), 2);
    }
}
