// Observability: metrics recorded during normalize and load

pub mod metrics;

// Re-export main functions for ease of use
pub use metrics::{init, push_to_gateway};
