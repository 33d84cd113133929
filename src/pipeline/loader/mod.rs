pub mod wire;

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::app::ports::RecordStore;
use crate::constants;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::storage::csv_table::CleanTable;

/// Knobs for the batch loader. One loader serves every collection.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Clear every collection (children first) before loading
    pub clear_before_load: bool,
    /// Rows per create-many request
    pub batch_size: usize,
    /// Columns always sent as JSON integers when numeric
    pub int_columns: BTreeSet<String>,
    /// Columns always sent as JSON strings
    pub text_columns: BTreeSet<String>,
    /// Failed-batch diagnostics kept before further detail is suppressed
    pub max_reported_errors: usize,
    /// Log progress every N batches
    pub progress_every: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            clear_before_load: false,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            int_columns: constants::default_int_columns().into_iter().collect(),
            text_columns: constants::default_text_columns().into_iter().collect(),
            max_reported_errors: constants::DEFAULT_MAX_REPORTED_ERRORS,
            progress_every: constants::DEFAULT_PROGRESS_EVERY,
        }
    }
}

/// Result of loading one cleaned table into one collection
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub collection: String,
    pub total_rows: usize,
    pub accepted_rows: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// At most `max_reported_errors` diagnostics, in batch order
    pub error_messages: Vec<String>,
    /// Failures beyond the cap that were counted but not described
    pub suppressed_errors: usize,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn rejected_rows(&self) -> usize {
        self.total_rows - self.accepted_rows
    }

    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Sequential, fixed-size batch submission with per-batch accounting.
///
/// A failed batch is neither retried nor split; its rows are simply absent
/// from the destination and the run moves on to the next batch.
pub struct BatchLoader {
    store: Arc<dyn RecordStore>,
    options: LoaderOptions,
}

impl BatchLoader {
    pub fn new(store: Arc<dyn RecordStore>, options: LoaderOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Read a cleaned table from disk and load it. Only a read failure is an error.
    pub async fn load_file(&self, path: &Path, collection: &str) -> Result<LoadReport> {
        let table = CleanTable::read(path)?;
        Ok(self.load_table(table, collection).await)
    }

    #[instrument(skip(self, table), fields(collection = %collection, rows = table.len()))]
    pub async fn load_table(&self, mut table: CleanTable, collection: &str) -> LoadReport {
        let started = Instant::now();

        // The store assigns surrogate ids itself
        table.drop_column(constants::SURROGATE_ID);

        let total = table.len();
        let batch_size = self.options.batch_size.max(1);
        let kinds = wire::infer_kinds(&table, &self.options.int_columns, &self.options.text_columns);

        info!(
            "Loading {}: {} rows in batches of {}",
            collection, total, batch_size
        );

        let mut report = LoadReport {
            collection: collection.to_string(),
            total_rows: total,
            accepted_rows: 0,
            batches: 0,
            failed_batches: 0,
            error_messages: Vec::new(),
            suppressed_errors: 0,
            elapsed: Duration::ZERO,
        };

        for (batch_num, start) in (0..total).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(total);
            let records = wire::to_records(&table, &kinds, start, end);
            report.batches += 1;

            let t_batch = Instant::now();
            let outcome = self.store.insert_batch(collection, &records).await;
            metrics::load::batch_duration(collection, t_batch.elapsed().as_secs_f64());

            match outcome {
                Ok(()) => {
                    report.accepted_rows += records.len();
                    metrics::load::batch_accepted(collection, records.len());
                }
                Err(e) => {
                    report.failed_batches += 1;
                    metrics::load::batch_failed(collection);
                    let msg = format!("Batch {}: {}", batch_num, e);
                    if report.error_messages.len() < self.options.max_reported_errors {
                        warn!("ERROR: {}", msg);
                        report.error_messages.push(msg);
                    } else {
                        if report.suppressed_errors == 0 {
                            warn!("(suppressing further errors for {}...)", collection);
                        }
                        report.suppressed_errors += 1;
                    }
                }
            }

            let every = self.options.progress_every.max(1);
            if batch_num % every == 0 || end == total {
                let pct = if total == 0 { 100 } else { end * 100 / total };
                info!("Progress: {}/{} ({}%)", end, total, pct);
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "RESULT: {}/{} rows inserted, {} batch errors in {:.1}s",
            report.accepted_rows,
            report.total_rows,
            report.failed_batches,
            report.elapsed.as_secs_f64()
        );
        report
    }
}
