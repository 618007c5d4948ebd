//! CWU: Chunk-Wise Unique
//!
//! Usage: cwu <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use cwu::array::{ArrayError, Dimension};
use cwu::commands::{GenerateCommand, GenerateConfig, UniqueCommand, UniqueStats};
use cwu::parallel::ChunkLoadStats;
use cwu::text;

#[derive(Parser)]
#[command(name = "cwu")]
#[command(version)]
#[command(about = "CWU: chunk-wise unique filter for chunked string arrays", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deduplicate string values within each chunk of an array
    Unique {
        /// Input array file (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print transform statistics to stderr
        #[arg(long)]
        stats: bool,

        /// Process chunks sequentially regardless of array size
        #[arg(long)]
        sequential: bool,
    },

    /// Generate a synthetic array for benchmarking
    Generate {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Dimension specs, one per dimension (name:lo:hi:chunk_len)
        #[arg(short, long, required = true, num_args = 1..)]
        dims: Vec<String>,

        /// Number of populated cells
        #[arg(short, long, default_value = "100000")]
        cells: usize,

        /// Number of distinct values in the pool
        #[arg(short, long, default_value = "1000")]
        pool: usize,

        /// RNG seed for reproducibility
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Print schema and per-chunk occupancy of an array file
    Info {
        /// Input array file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .expect("Failed to initialize thread pool");
    }

    let result = match cli.command {
        Commands::Unique {
            input,
            output,
            stats,
            sequential,
        } => run_unique(input, output, stats, sequential),

        Commands::Generate {
            output,
            dims,
            cells,
            pool,
            seed,
        } => run_generate(output, dims, cells, pool, seed),

        Commands::Info { input } => run_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_unique(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    stats: bool,
    sequential: bool,
) -> Result<(), ArrayError> {
    let mut cmd = UniqueCommand::new();
    cmd.sequential = sequential;

    let result = match output {
        Some(path) => {
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            let stats = run_unique_to(&cmd, &input, &mut writer)?;
            writer.flush()?;
            stats
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            run_unique_to(&cmd, &input, &mut handle)?
        }
    };

    if stats {
        eprintln!("Unique stats: {}", result);
    }
    Ok(())
}

fn run_unique_to<W: Write>(
    cmd: &UniqueCommand,
    input: &Option<PathBuf>,
    output: &mut W,
) -> Result<UniqueStats, ArrayError> {
    match input {
        Some(path) if path.to_string_lossy() != "-" => cmd.run(path, output),
        _ => cmd.run_stdin(output),
    }
}

fn run_generate(
    output: PathBuf,
    dims: Vec<String>,
    cells: usize,
    pool: usize,
    seed: u64,
) -> Result<(), ArrayError> {
    let dims: Vec<Dimension> = dims
        .iter()
        .map(|spec| {
            Dimension::parse(spec).ok_or_else(|| {
                ArrayError::InvalidFormat(format!(
                    "invalid dimension spec '{}', expected name:lo:hi:chunk_len",
                    spec
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    let cmd = GenerateCommand::new(GenerateConfig {
        output,
        dims,
        cells,
        pool,
        seed,
    });
    let stats = cmd.run()?;
    eprintln!("Generated: {}", stats);
    Ok(())
}

fn run_info(input: PathBuf) -> Result<(), ArrayError> {
    let array = text::load_array(input)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    writeln!(handle, "attribute\t{}", array.schema().attribute())?;
    for dim in array.schema().dimensions() {
        writeln!(handle, "dimension\t{}", dim)?;
    }

    let stats = ChunkLoadStats::from_array(&array);
    writeln!(handle, "chunks\t{}", stats.num_chunks)?;
    writeln!(handle, "cells\t{}", stats.total_cells)?;
    for (start, cells) in &stats.cells_per_chunk {
        writeln!(handle, "chunk\t{}\t{}", start, cells)?;
    }
    Ok(())
}
