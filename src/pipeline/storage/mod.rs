// File-based handoff between the normalizer and the loader

pub mod csv_table;

pub use csv_table::{CleanTable, RawTable};
