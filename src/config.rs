//! Global configuration for CWU runtime behavior.
//!
//! Thread-safe knobs read outside hot loops; the atomics add no measurable
//! overhead next to the per-chunk sorting work.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::parallel::PARALLEL_THRESHOLD;

/// Minimum total populated cells before the transform runs chunks in
/// parallel. Below this, sequential processing wins on thread overhead.
static PARALLEL_MIN_CELLS: AtomicUsize = AtomicUsize::new(PARALLEL_THRESHOLD);

/// Override the parallelism threshold.
///
/// Set once at startup; arrays with fewer populated cells than this are
/// transformed one chunk at a time on the calling thread.
///
/// # Example
///
/// ```
/// use cwu::config;
///
/// // Force sequential processing regardless of array size
/// config::set_parallel_min_cells(usize::MAX);
/// # config::set_parallel_min_cells(10_000);
/// ```
#[inline]
pub fn set_parallel_min_cells(cells: usize) {
    PARALLEL_MIN_CELLS.store(cells, Ordering::Release);
}

/// Current parallelism threshold in populated cells.
#[inline]
pub fn parallel_min_cells() -> usize {
    PARALLEL_MIN_CELLS.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_threshold() {
        set_parallel_min_cells(PARALLEL_THRESHOLD);
        assert_eq!(parallel_min_cells(), PARALLEL_THRESHOLD);
    }

    #[test]
    #[serial]
    fn test_override_threshold() {
        set_parallel_min_cells(1);
        assert_eq!(parallel_min_cells(), 1);
        set_parallel_min_cells(PARALLEL_THRESHOLD); // Reset
    }
}
