pub mod coerce;
pub mod normalizers;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::CleanRow;
use crate::error::Result;
use crate::pipeline::storage::csv_table::RawTable;

pub use normalizers::{DeficiencyNormalizer, ProviderNormalizer, QualityMeasureNormalizer};

/// What happened to a single raw row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome<R> {
    Keep(R),
    /// Every target column was absent
    Empty,
    /// The provider key was absent after trimming
    MissingKey,
    /// The provider key exceeded the fixed width
    OverlongKey(String),
}

/// Trait for turning one raw CMS export into its cleaned target schema
pub trait TableNormalizer {
    type Row: CleanRow + Clone;

    /// Table name used in logs and errors
    fn table(&self) -> &'static str;

    /// `(source header, target column)` pairs, in target column order
    fn column_map(&self) -> &'static [(&'static str, &'static str)];

    /// Coerce one projected row. Cells arrive untrimmed, aligned with `column_map`.
    fn clean_row(&self, cells: &[Option<String>]) -> RowOutcome<Self::Row>;

    /// Table-level passes that need every cleaned row (dedup, aggregates)
    fn finish(&self, rows: Vec<Self::Row>) -> Vec<Self::Row> {
        rows
    }
}

/// Informational diagnostics for one normalized table
#[derive(Debug, Clone, Serialize)]
pub struct NormalizeSummary {
    pub table: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub dropped_empty: usize,
    pub dropped_missing_key: usize,
    pub dropped_overlong_key: usize,
    pub dropped_duplicates: usize,
    /// Percentage of absent values per output column
    pub null_pct: Vec<(String, f64)>,
    /// SHA-256 of the written cleaned table, filled in once it is on disk
    pub sha256: Option<String>,
}

impl NormalizeSummary {
    pub fn removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

/// A cleaned table with its diagnostics
#[derive(Debug, Clone)]
pub struct NormalizedTable<R> {
    pub rows: Vec<R>,
    pub summary: NormalizeSummary,
}

/// Run the per-table pipeline: project, coerce, filter, then table-level passes.
#[instrument(skip(normalizer, raw), fields(table = normalizer.table()))]
pub fn normalize_table<N: TableNormalizer>(
    normalizer: &N,
    raw: &RawTable,
) -> Result<NormalizedTable<N::Row>> {
    let projection = raw.project(normalizer.column_map())?;
    let rows_before = projection.rows.len();

    let mut kept = Vec::with_capacity(rows_before);
    let (mut dropped_empty, mut dropped_missing_key, mut dropped_overlong_key) = (0, 0, 0);

    for cells in &projection.rows {
        match normalizer.clean_row(cells) {
            RowOutcome::Keep(row) => kept.push(row),
            RowOutcome::Empty => dropped_empty += 1,
            RowOutcome::MissingKey => dropped_missing_key += 1,
            RowOutcome::OverlongKey(key) => {
                debug!("Rejecting provider key longer than 6 characters: {}", key);
                dropped_overlong_key += 1;
            }
        }
    }

    let cleaned = kept.len();
    let rows = normalizer.finish(kept);
    let dropped_duplicates = cleaned - rows.len();

    let summary = NormalizeSummary {
        table: normalizer.table().to_string(),
        rows_before,
        rows_after: rows.len(),
        dropped_empty,
        dropped_missing_key,
        dropped_overlong_key,
        dropped_duplicates,
        null_pct: null_percentages(&rows),
        sha256: None,
    };

    info!(
        "Rows: {} -> {} (removed {})",
        summary.rows_before,
        summary.rows_after,
        summary.removed()
    );
    if dropped_overlong_key > 0 {
        info!("Rejected {} rows with an overlong provider key", dropped_overlong_key);
    }

    Ok(NormalizedTable { rows, summary })
}

/// Percentage of absent values per column, in output column order
pub fn null_percentages<R: CleanRow>(rows: &[R]) -> Vec<(String, f64)> {
    let mut absent = vec![0usize; R::COLUMNS.len()];
    for row in rows {
        for (count, present) in absent.iter_mut().zip(row.presence()) {
            if !present {
                *count += 1;
            }
        }
    }
    R::COLUMNS
        .iter()
        .zip(absent)
        .map(|(column, count)| {
            let pct = if rows.is_empty() {
                0.0
            } else {
                count as f64 * 100.0 / rows.len() as f64
            };
            (column.to_string(), pct)
        })
        .collect()
}
