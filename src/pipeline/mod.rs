// Data pipeline: normalization, the cleaned-table handoff, and batch loading

pub mod loader;
pub mod processing;
pub mod storage;

// Re-export key types from each stage
pub use loader::{BatchLoader, LoadReport, LoaderOptions};
pub use processing::normalize;
