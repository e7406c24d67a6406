//! Shared test utilities for the hydro-publisher workspace.
//!
//! This crate provides common testing infrastructure including:
//! - In-memory [`ArraySource`](hydro_common::ArraySource) and sink fakes
//! - Test data path helpers and skip macros for optional data files
//! - Dataset fixtures and value generators
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{MemorySink, MemorySource, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod memory_sink;
pub mod memory_source;
pub mod paths;

// Re-export commonly used items at the crate root
pub use generators::*;
pub use memory_sink::{MemorySession, MemorySink, StoredRow};
pub use memory_source::{MemoryOpener, MemorySource};
pub use paths::*;

/// Macro to skip a test if the required file is not found.
///
/// Useful for tests that depend on real HYFAA stores, which are too large to
/// keep in the repository.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_test_file;
///
/// #[test]
/// fn test_real_store() {
///     let path = require_test_file!("post_processing_portal.nc");
///     // Test code using path...
/// }
/// ```
///
/// If the file is not found, the test will print a skip message and return early.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
