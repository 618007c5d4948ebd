//! Array schema and the in-memory chunked array.
//!
//! An array is described by one or more dimensions (inclusive bounds plus a
//! fixed chunk interval) and a single named attribute. Cells route to the
//! chunk whose grid-aligned region contains their position.

use std::fmt;
use std::io;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::chunk::{Chunk, Coordinates};

/// Errors that can occur while loading, validating, or transforming arrays.
#[derive(Error, Debug)]
pub enum ArrayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid array format: {0}")]
    InvalidFormat(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Resource exhaustion: {0}")]
    Resource(String),

    #[error("output chunk at {chunk} over capacity: value {needed} of {capacity} cells")]
    ChunkOverflow {
        chunk: String,
        capacity: u64,
        needed: u64,
    },
}

pub type Result<T> = std::result::Result<T, ArrayError>;

/// One array dimension: inclusive `[lo, hi]` bounds and a chunk interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub lo: i64,
    pub hi: i64,
    pub chunk_len: i64,
}

impl Dimension {
    pub fn new(name: impl Into<String>, lo: i64, hi: i64, chunk_len: i64) -> Self {
        Self {
            name: name.into(),
            lo,
            hi,
            chunk_len,
        }
    }

    /// Total length of the dimension.
    #[inline]
    pub fn len(&self) -> i64 {
        self.hi - self.lo + 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hi < self.lo
    }

    /// Parse a `name:lo:hi:chunk_len` specification.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(':');
        let name = parts.next()?;
        if name.is_empty() {
            return None;
        }
        let lo: i64 = parts.next()?.parse().ok()?;
        let hi: i64 = parts.next()?.parse().ok()?;
        let chunk_len: i64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(name, lo, hi, chunk_len))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.name, self.lo, self.hi, self.chunk_len)
    }
}

/// Attribute value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Int64,
    Double,
}

impl AttributeKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "int64" => Some(Self::Int64),
            "double" => Some(Self::Double),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int64 => write!(f, "int64"),
            Self::Double => write!(f, "double"),
        }
    }
}

/// The array's single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

/// Schema of a chunked array: dimensions plus one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    dimensions: Vec<Dimension>,
    attribute: Attribute,
}

impl ArraySchema {
    /// Build a schema, validating dimension bounds and chunk intervals.
    pub fn new(dimensions: Vec<Dimension>, attribute: Attribute) -> Result<Self> {
        if dimensions.is_empty() {
            return Err(ArrayError::Schema(
                "array requires at least one dimension".to_string(),
            ));
        }
        for dim in &dimensions {
            if dim.hi < dim.lo {
                return Err(ArrayError::Schema(format!(
                    "dimension {} has hi < lo ({} < {})",
                    dim.name, dim.hi, dim.lo
                )));
            }
            if dim.chunk_len < 1 {
                return Err(ArrayError::Schema(format!(
                    "dimension {} has non-positive chunk interval {}",
                    dim.name, dim.chunk_len
                )));
            }
            // The span must fit in i64 so length and chunk-grid arithmetic
            // cannot overflow downstream.
            if dim
                .hi
                .checked_sub(dim.lo)
                .and_then(|span| span.checked_add(1))
                .is_none()
            {
                return Err(ArrayError::Schema(format!(
                    "dimension {} spans [{}, {}], too wide for a signed length",
                    dim.name, dim.lo, dim.hi
                )));
            }
        }
        Ok(Self {
            dimensions,
            attribute,
        })
    }

    #[inline]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    #[inline]
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dimensions.len()
    }

    /// Check whether a position lies within the array bounds.
    pub fn contains(&self, pos: &Coordinates) -> bool {
        pos.ndim() == self.ndim()
            && pos
                .as_slice()
                .iter()
                .zip(&self.dimensions)
                .all(|(&p, d)| p >= d.lo && p <= d.hi)
    }

    /// Starting coordinate of the grid-aligned chunk owning `pos`.
    pub fn chunk_start(&self, pos: &Coordinates) -> Coordinates {
        let coords = pos
            .as_slice()
            .iter()
            .zip(&self.dimensions)
            .map(|(&p, d)| d.lo + ((p - d.lo) / d.chunk_len) * d.chunk_len)
            .collect();
        Coordinates::new(coords)
    }

    /// Per-dimension extents of the chunk at `start`, clipped to the array
    /// bounds for edge chunks.
    pub fn chunk_extents(&self, start: &Coordinates) -> Vec<i64> {
        start
            .as_slice()
            .iter()
            .zip(&self.dimensions)
            .map(|(&s, d)| d.chunk_len.min(d.hi - s + 1))
            .collect()
    }
}

/// An in-memory chunked array with string cell payloads.
///
/// Chunks are created on demand as cells arrive and always sit on the
/// schema's chunk grid.
#[derive(Debug, Clone)]
pub struct ChunkedArray {
    schema: ArraySchema,
    chunks: Vec<Chunk>,
    index: FxHashMap<Coordinates, usize>,
}

impl ChunkedArray {
    pub fn new(schema: ArraySchema) -> Self {
        Self {
            schema,
            chunks: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn schema(&self) -> &ArraySchema {
        &self.schema
    }

    /// Place a value at a position, creating the owning chunk if needed.
    pub fn insert(&mut self, pos: Coordinates, value: String) -> Result<()> {
        if !self.schema.contains(&pos) {
            return Err(ArrayError::InvalidFormat(format!(
                "position {} outside array bounds",
                pos
            )));
        }
        let start = self.schema.chunk_start(&pos);
        let idx = match self.index.get(&start) {
            Some(&idx) => idx,
            None => {
                let extents = self.schema.chunk_extents(&start);
                self.chunks.push(Chunk::new(start.clone(), extents));
                self.index.insert(start, self.chunks.len() - 1);
                self.chunks.len() - 1
            }
        };
        self.chunks[idx].insert(pos, value)
    }

    /// Adopt a fully built chunk. The slot for its starting coordinate must
    /// be vacant: output chunks are written once.
    pub fn insert_chunk(&mut self, chunk: Chunk) -> Result<()> {
        if self.index.contains_key(chunk.start()) {
            return Err(ArrayError::InvalidFormat(format!(
                "duplicate chunk at {}",
                chunk.start()
            )));
        }
        self.index.insert(chunk.start().clone(), self.chunks.len());
        self.chunks.push(chunk);
        Ok(())
    }

    /// Look up a chunk by its starting coordinate.
    pub fn get_chunk(&self, start: &Coordinates) -> Option<&Chunk> {
        self.index.get(start).map(|&idx| &self.chunks[idx])
    }

    /// All chunks ordered by starting coordinate.
    pub fn chunks(&self) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self.chunks.iter().collect();
        chunks.sort_by(|a, b| a.start().cmp(b.start()));
        chunks
    }

    /// Number of chunks holding at least one slot (populated or not).
    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Total populated cells across all chunks.
    pub fn num_cells(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_cells() == 0
    }
}
