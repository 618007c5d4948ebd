//! Core chunk types for chunked string arrays.
//!
//! A chunk is a fixed-bounds partition of an array and the unit of
//! independent processing. Chunks are sparse: a coordinate slot either
//! holds a string value or is unpopulated.

use std::collections::BTreeMap;
use std::fmt;

use crate::array::{ArrayError, Result};

/// A coordinate tuple identifying one cell of a multi-dimensional array.
///
/// Ordering is componentwise lexicographic, which matches the array's
/// row-major iteration order (last dimension varies fastest).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinates(Vec<i64>);

impl Coordinates {
    /// Create coordinates from dimension components.
    #[inline]
    pub fn new(coords: Vec<i64>) -> Self {
        Self(coords)
    }

    /// Number of dimensions.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Dimension components as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

impl From<Vec<i64>> for Coordinates {
    fn from(coords: Vec<i64>) -> Self {
        Self::new(coords)
    }
}

impl From<&[i64]> for Coordinates {
    fn from(coords: &[i64]) -> Self {
        Self::new(coords.to_vec())
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// A sparse chunk: a bounded region of the array anchored at a starting
/// coordinate, holding zero or more (position, value) cells.
///
/// A chunk's output under any transform is fully determined by its own
/// input; no state is shared between chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    start: Coordinates,
    extents: Vec<i64>,
    cells: BTreeMap<Coordinates, String>,
}

impl Chunk {
    /// Create an empty chunk anchored at `start` with the given per-dimension
    /// extents (already clipped to the array bounds by the schema).
    pub fn new(start: Coordinates, extents: Vec<i64>) -> Self {
        debug_assert_eq!(start.ndim(), extents.len());
        Self {
            start,
            extents,
            cells: BTreeMap::new(),
        }
    }

    /// The chunk's starting coordinate.
    #[inline]
    pub fn start(&self) -> &Coordinates {
        &self.start
    }

    /// Per-dimension extents of the chunk region.
    #[inline]
    pub fn extents(&self) -> &[i64] {
        &self.extents
    }

    /// Total number of coordinate slots in the chunk region.
    pub fn capacity(&self) -> u64 {
        self.extents.iter().map(|&e| e as u64).product()
    }

    /// Number of populated cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if no cell is populated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Check whether a position falls inside this chunk's region.
    pub fn contains_position(&self, pos: &Coordinates) -> bool {
        if pos.ndim() != self.start.ndim() {
            return false;
        }
        pos.as_slice()
            .iter()
            .zip(self.start.as_slice())
            .zip(&self.extents)
            .all(|((&p, &s), &e)| p >= s && p < s + e)
    }

    /// Place a value at a position inside the chunk region.
    /// Writing the same position twice keeps the last value.
    pub fn insert(&mut self, pos: Coordinates, value: String) -> Result<()> {
        if !self.contains_position(&pos) {
            return Err(ArrayError::InvalidFormat(format!(
                "position {} outside chunk at {}",
                pos, self.start
            )));
        }
        self.cells.insert(pos, value);
        Ok(())
    }

    /// Value at a position, if populated.
    pub fn get(&self, pos: &Coordinates) -> Option<&str> {
        self.cells.get(pos).map(String::as_str)
    }

    /// Iterate populated cells in row-major position order.
    pub fn entries(&self) -> impl Iterator<Item = (&Coordinates, &str)> {
        self.cells.iter().map(|(p, v)| (p, v.as_str()))
    }

    /// Iterate populated values in row-major position order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.values().map(String::as_str)
    }
}

/// Write-once sink for populating a fresh output chunk.
///
/// Values are accepted at sequentially advancing row-major positions
/// beginning at the chunk's starting coordinate: opened, populated,
/// then sealed with [`ChunkWriter::finish`]. One pass, one writer.
#[derive(Debug)]
pub struct ChunkWriter {
    chunk: Chunk,
    cursor: Vec<i64>,
    written: u64,
}

impl ChunkWriter {
    /// Open a writer for a new chunk at `start` with the given extents.
    pub fn new(start: Coordinates, extents: Vec<i64>) -> Self {
        let cursor = start.as_slice().to_vec();
        Self {
            chunk: Chunk::new(start, extents),
            cursor,
            written: 0,
        }
    }

    /// Append a value at the next sequential position.
    ///
    /// Writing past the chunk's capacity is a hard error: a transform that
    /// only ever shrinks a chunk's cell set can never legitimately overflow,
    /// so an overflow is reported instead of silently dropping values.
    pub fn write(&mut self, value: String) -> Result<()> {
        if self.written >= self.chunk.capacity() {
            return Err(ArrayError::ChunkOverflow {
                chunk: self.chunk.start().to_string(),
                capacity: self.chunk.capacity(),
                needed: self.written + 1,
            });
        }
        let pos = Coordinates::new(self.cursor.clone());
        self.chunk.cells.insert(pos, value);
        self.advance();
        self.written += 1;
        Ok(())
    }

    /// Number of values written so far.
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Seal the chunk and make its contents available.
    pub fn finish(self) -> Chunk {
        self.chunk
    }

    /// Step the cursor one slot in row-major order, carrying into the
    /// previous dimension at each extent boundary.
    fn advance(&mut self) {
        let start = self.chunk.start.as_slice();
        let extents = &self.chunk.extents;
        for d in (0..self.cursor.len()).rev() {
            self.cursor[d] += 1;
            if self.cursor[d] < start[d] + extents[d] {
                return;
            }
            self.cursor[d] = start[d];
        }
        // All dimensions wrapped: region exhausted. The capacity guard in
        // write() keeps the wrapped cursor from ever being used.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_ordering_is_row_major() {
        let mut coords = [
            Coordinates::new(vec![2, 1]),
            Coordinates::new(vec![1, 2]),
            Coordinates::new(vec![1, 1]),
        ];
        coords.sort();

        assert_eq!(coords[0].as_slice(), &[1, 1]);
        assert_eq!(coords[1].as_slice(), &[1, 2]);
        assert_eq!(coords[2].as_slice(), &[2, 1]);
    }

    #[test]
    fn test_coordinates_display() {
        assert_eq!(Coordinates::new(vec![1]).to_string(), "1");
        assert_eq!(Coordinates::new(vec![3, -2, 7]).to_string(), "3,-2,7");
    }

    #[test]
    fn test_chunk_capacity_and_bounds() {
        let chunk = Chunk::new(Coordinates::new(vec![1, 1]), vec![4, 2]);

        assert_eq!(chunk.capacity(), 8);
        assert!(chunk.contains_position(&Coordinates::new(vec![4, 2])));
        assert!(!chunk.contains_position(&Coordinates::new(vec![5, 1])));
        assert!(!chunk.contains_position(&Coordinates::new(vec![1])));
    }

    #[test]
    fn test_chunk_insert_out_of_region() {
        let mut chunk = Chunk::new(Coordinates::new(vec![1]), vec![4]);
        let result = chunk.insert(Coordinates::new(vec![5]), "x".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_chunk_entries_in_position_order() {
        let mut chunk = Chunk::new(Coordinates::new(vec![1]), vec![4]);
        chunk.insert(Coordinates::new(vec![3]), "c".to_string()).unwrap();
        chunk.insert(Coordinates::new(vec![1]), "a".to_string()).unwrap();
        chunk.insert(Coordinates::new(vec![2]), "b".to_string()).unwrap();

        let values: Vec<_> = chunk.values().collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_writer_sequential_positions() {
        let mut writer = ChunkWriter::new(Coordinates::new(vec![1]), vec![4]);
        writer.write("a".to_string()).unwrap();
        writer.write("b".to_string()).unwrap();
        writer.write("c".to_string()).unwrap();
        let chunk = writer.finish();

        assert_eq!(chunk.get(&Coordinates::new(vec![1])), Some("a"));
        assert_eq!(chunk.get(&Coordinates::new(vec![2])), Some("b"));
        assert_eq!(chunk.get(&Coordinates::new(vec![3])), Some("c"));
        assert_eq!(chunk.get(&Coordinates::new(vec![4])), None);
        assert_eq!(chunk.len(), 3);
    }

    #[test]
    fn test_writer_row_major_carry() {
        // 2x2 region starting at (1,1): fill order (1,1), (1,2), (2,1), (2,2)
        let mut writer = ChunkWriter::new(Coordinates::new(vec![1, 1]), vec![2, 2]);
        for v in ["a", "b", "c", "d"] {
            writer.write(v.to_string()).unwrap();
        }
        let chunk = writer.finish();

        assert_eq!(chunk.get(&Coordinates::new(vec![1, 1])), Some("a"));
        assert_eq!(chunk.get(&Coordinates::new(vec![1, 2])), Some("b"));
        assert_eq!(chunk.get(&Coordinates::new(vec![2, 1])), Some("c"));
        assert_eq!(chunk.get(&Coordinates::new(vec![2, 2])), Some("d"));
    }

    #[test]
    fn test_writer_overflow_is_an_error() {
        let mut writer = ChunkWriter::new(Coordinates::new(vec![1]), vec![2]);
        writer.write("a".to_string()).unwrap();
        writer.write("b".to_string()).unwrap();

        let err = writer.write("c".to_string()).unwrap_err();
        assert!(matches!(err, ArrayError::ChunkOverflow { .. }));
        // Nothing was dropped silently: the two accepted writes survive.
        assert_eq!(writer.written(), 2);
    }

    #[test]
    fn test_empty_writer_finishes_empty() {
        let writer = ChunkWriter::new(Coordinates::new(vec![1]), vec![4]);
        let chunk = writer.finish();
        assert!(chunk.is_empty());
        assert_eq!(chunk.capacity(), 4);
    }
}
