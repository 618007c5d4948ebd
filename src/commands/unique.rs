//! Chunk-wise unique: suppress duplicate string values within each chunk.
//!
//! The transform exists as a pre-filter ahead of global sort/unique stages:
//! each chunk is deduplicated independently, so a value appearing in two
//! chunks survives once per chunk. Within a chunk the survivors come out in
//! byte-lexicographic order at sequential row-major positions anchored at
//! the chunk's starting coordinate; original cell positions are not kept.
//!
//! Per chunk the work is four sequential phases: collect the values into an
//! owned batch, sort, scan out adjacent duplicates, emit. O(n log n)
//! comparisons plus an O(n) scan per chunk, O(n) auxiliary memory, and no
//! state crossing chunk boundaries.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use crate::array::{ArrayError, ArraySchema, AttributeKind, ChunkedArray, Result};
use crate::chunk::{Chunk, ChunkWriter};
use crate::collector;
use crate::config;
use crate::parallel;
use crate::text;

/// Statistics from a unique transform.
#[derive(Debug, Default, Clone)]
pub struct UniqueStats {
    pub chunks: usize,
    pub cells_in: usize,
    pub cells_out: usize,
}

impl fmt::Display for UniqueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chunks: {}, Cells in: {}, Cells out: {}",
            self.chunks, self.cells_in, self.cells_out
        )
    }
}

/// The chunk-wise unique command.
#[derive(Debug, Clone)]
pub struct UniqueCommand {
    /// Process chunks sequentially even for large arrays
    pub sequential: bool,
}

impl Default for UniqueCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueCommand {
    pub fn new() -> Self {
        Self { sequential: false }
    }

    /// Deduplicate one chunk.
    ///
    /// The output chunk reuses the input chunk's start and extents; survivors
    /// land at sequential row-major positions from the start. An empty chunk
    /// produces an empty chunk, a singleton chunk an identical singleton.
    pub fn unique_chunk(&self, chunk: &Chunk) -> Result<Chunk> {
        // Collect
        let mut batch = collector::collect_values(chunk)?;

        // Sort: str's Ord is byte-wise lexicographic. Stability is
        // irrelevant since equal values collapse in the next phase.
        batch.sort_unstable();

        // Dedup scan: the last survivor is the comparison cursor, so the
        // first element is always kept and equal runs collapse to one.
        let mut survivors: Vec<String> = Vec::with_capacity(batch.len());
        for value in batch {
            match survivors.last() {
                Some(last) if *last == value => {}
                _ => survivors.push(value),
            }
        }

        // Emit. Duplicates only shrink the set, so the writer's capacity
        // check can only fire on a malformed input chunk.
        let mut writer = ChunkWriter::new(chunk.start().clone(), chunk.extents().to_vec());
        for value in survivors {
            writer.write(value)?;
        }
        Ok(writer.finish())
    }

    /// Apply the transform to a whole array.
    ///
    /// Fails up front on a non-string attribute; any per-chunk failure
    /// aborts the whole transform with no partial output.
    pub fn apply(&self, array: &ChunkedArray) -> Result<ChunkedArray> {
        self.apply_with_stats(array).map(|(out, _)| out)
    }

    /// Apply the transform and report statistics.
    pub fn apply_with_stats(&self, array: &ChunkedArray) -> Result<(ChunkedArray, UniqueStats)> {
        check_string_attribute(array.schema())?;

        let chunks = array.chunks();
        let cells_in = array.num_cells();

        let transformed: Vec<Chunk> =
            if self.sequential || cells_in < config::parallel_min_cells() {
                chunks
                    .iter()
                    .map(|chunk| self.unique_chunk(chunk))
                    .collect::<Result<_>>()?
            } else {
                parallel::process_chunks(&chunks, |chunk| self.unique_chunk(chunk))?
            };

        let mut output = ChunkedArray::new(array.schema().clone());
        for chunk in transformed {
            output.insert_chunk(chunk)?;
        }

        let stats = UniqueStats {
            chunks: output.num_chunks(),
            cells_in,
            cells_out: output.num_cells(),
        };
        Ok((output, stats))
    }

    /// Run the transform on a file, writing the result array as text.
    ///
    /// Output is produced only after the whole transform has succeeded.
    pub fn run<P: AsRef<Path>, W: Write>(
        &self,
        input_path: P,
        output: &mut W,
    ) -> Result<UniqueStats> {
        let array = text::load_array(input_path)?;
        self.write_result(&array, output)
    }

    /// Run the transform reading the array from stdin.
    pub fn run_stdin<W: Write>(&self, output: &mut W) -> Result<UniqueStats> {
        let stdin = io::stdin();
        let array = text::ArrayReader::new(stdin.lock()).read_array()?;
        self.write_result(&array, output)
    }

    fn write_result<W: Write>(&self, array: &ChunkedArray, output: &mut W) -> Result<UniqueStats> {
        let (result, stats) = self.apply_with_stats(array)?;
        text::write_array(output, &result)?;
        Ok(stats)
    }
}

/// The transform is defined for string attributes only.
fn check_string_attribute(schema: &ArraySchema) -> Result<()> {
    let attr = schema.attribute();
    if attr.kind != AttributeKind::String {
        return Err(ArrayError::Schema(format!(
            "unique requires a string attribute, got {} for '{}'",
            attr.kind, attr.name
        )));
    }
    Ok(())
}
