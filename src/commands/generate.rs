//! Generate synthetic chunked string arrays for benchmarking.
//!
//! Builds an array whose cell values are drawn from a bounded pool of
//! distinct strings, so any run with `cells > pool` is guaranteed to put
//! duplicate values inside chunks. Deterministic for a fixed seed.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;

use crate::array::{
    ArrayError, ArraySchema, Attribute, AttributeKind, ChunkedArray, Dimension, Result,
};
use crate::chunk::Coordinates;
use crate::text;

/// Buffer size for the output file (8MB for better throughput)
const BUF_SIZE: usize = 8 * 1024 * 1024;

/// Configuration for the generate command.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub output: PathBuf,
    pub dims: Vec<Dimension>,
    /// Populated cells to place (capped at the array's capacity).
    pub cells: usize,
    /// Number of distinct values to draw from.
    pub pool: usize,
    pub seed: u64,
}

/// Statistics from a generate run.
#[derive(Debug, Default, Clone)]
pub struct GenerateStats {
    pub cells_written: usize,
    pub pool_size: usize,
    pub chunks: usize,
}

impl fmt::Display for GenerateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cells: {}, Pool: {}, Chunks: {}",
            self.cells_written, self.pool_size, self.chunks
        )
    }
}

/// Synthetic array generator.
#[derive(Debug, Clone)]
pub struct GenerateCommand {
    config: GenerateConfig,
}

impl GenerateCommand {
    pub fn new(config: GenerateConfig) -> Self {
        Self { config }
    }

    /// Build the array in memory and write it to the configured path.
    pub fn run(&self) -> Result<GenerateStats> {
        let array = self.build()?;
        let stats = GenerateStats {
            cells_written: array.num_cells(),
            pool_size: self.config.pool,
            chunks: array.num_chunks(),
        };

        let file = File::create(&self.config.output)?;
        let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
        text::write_array(&mut writer, &array)?;
        writer.flush()?;
        Ok(stats)
    }

    /// Build the synthetic array without writing it.
    pub fn build(&self) -> Result<ChunkedArray> {
        if self.config.pool == 0 {
            return Err(ArrayError::InvalidFormat(
                "value pool must hold at least one string".to_string(),
            ));
        }
        let schema = ArraySchema::new(
            self.config.dims.clone(),
            Attribute::new("v", AttributeKind::String),
        )?;

        let capacity: u64 = schema
            .dimensions()
            .iter()
            .map(|d| d.len() as u64)
            .product();
        let cells = (self.config.cells as u64).min(capacity) as usize;

        let mut rng = SmallRng::seed_from_u64(self.config.seed);
        let pool = build_pool(&mut rng, self.config.pool);

        // Distinct random positions via rejection sampling; attempts are
        // capped so a nearly full array cannot spin forever.
        let mut taken: FxHashSet<Coordinates> = FxHashSet::default();
        let mut array = ChunkedArray::new(schema);
        let mut attempts = 0usize;
        let max_attempts = cells.saturating_mul(20).max(1024);
        while taken.len() < cells && attempts < max_attempts {
            attempts += 1;
            let pos = Coordinates::new(
                array
                    .schema()
                    .dimensions()
                    .iter()
                    .map(|d| rng.gen_range(d.lo..=d.hi))
                    .collect(),
            );
            if !taken.insert(pos.clone()) {
                continue;
            }
            let value = pool[rng.gen_range(0..pool.len())].clone();
            array.insert(pos, value)?;
        }
        Ok(array)
    }
}

/// Draw `size` distinct strings.
fn build_pool(rng: &mut SmallRng, size: usize) -> Vec<String> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut pool = Vec::with_capacity(size);
    while pool.len() < size {
        let value = format!("v{:08x}", rng.gen::<u32>());
        if seen.insert(value.clone()) {
            pool.push(value);
        }
    }
    pool
}
