//! CWU: Chunk-Wise Unique
//!
//! This library deduplicates string values within each chunk of a chunked,
//! possibly multi-dimensional array. It is a pre-filter for downstream
//! global sort/unique stages: duplicates are collapsed per chunk, never
//! across chunks.
//!
//! # Features
//!
//! - **Parallel processing**: Uses Rayon for multi-core chunk transforms
//! - **Fast loading**: Memory-mapped I/O and parallel parsing of large files
//! - **Strict failure semantics**: A transform fully succeeds or fully fails
//!
//! # Example
//!
//! ```rust
//! use cwu::{text, commands::UniqueCommand};
//!
//! let array = text::parse_array(
//!     "@dims\ti:1:4:4\n@attr\ts:string\n1\tx\n2\ty\n3\tx\n4\ta\n",
//! ).unwrap();
//!
//! let output = UniqueCommand::new().apply(&array).unwrap();
//! assert_eq!(output.num_cells(), 3);
//! ```

pub mod array;
pub mod chunk;
pub mod collector;
pub mod commands;
pub mod config;
pub mod parallel;
pub mod text;

// Re-export commonly used types
pub use array::{ArrayError, ArraySchema, Attribute, AttributeKind, ChunkedArray, Dimension};
pub use chunk::{Chunk, ChunkWriter, Coordinates};
pub use text::{load_array, parse_array, read_array, write_array};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::array::{ArrayError, ArraySchema, Attribute, AttributeKind, ChunkedArray, Dimension};
    pub use crate::chunk::{Chunk, ChunkWriter, Coordinates};
    pub use crate::commands::{GenerateCommand, GenerateConfig, UniqueCommand, UniqueStats};
    pub use crate::text::{load_array, parse_array, read_array, write_array};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_workflow() {
        use crate::commands::UniqueCommand;
        use crate::text::parse_array;

        let content = "@dims\ti:1:4:4\n@attr\ts:string\n1\tx\n2\ty\n3\tx\n4\ta\n";
        let array = parse_array(content).unwrap();

        let output = UniqueCommand::new().apply(&array).unwrap();

        assert_eq!(output.num_chunks(), 1);
        assert_eq!(output.num_cells(), 3);
    }

    #[test]
    fn test_transform_then_write_workflow() {
        use crate::commands::UniqueCommand;
        use crate::text::{parse_array, write_array};

        let content = "@dims\ti:1:4:4\n@attr\ts:string\n1\tb\n2\tb\n3\ta\n";
        let array = parse_array(content).unwrap();
        let output = UniqueCommand::new().apply(&array).unwrap();

        let mut buf = Vec::new();
        write_array(&mut buf, &output).unwrap();
        let rendered = String::from_utf8(buf).unwrap();

        assert!(rendered.contains("1\ta\n"));
        assert!(rendered.contains("2\tb\n"));
        assert!(!rendered.contains("3\t"));
    }
}
