use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

use crate::app::ports::RecordStore;
use crate::domain::Collection;
use crate::error::Result;
use crate::pipeline::loader::{BatchLoader, LoadReport, LoaderOptions};

/// Outcome of loading all three collections
#[derive(Debug, Clone)]
pub struct LoadRun {
    /// One report per collection, in load order
    pub reports: Vec<LoadReport>,
    pub elapsed: Duration,
}

impl LoadRun {
    pub fn accepted_rows(&self) -> usize {
        self.reports.iter().map(|r| r.accepted_rows).sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.reports.iter().map(|r| r.failed_batches).sum()
    }
}

/// Use case for pushing the cleaned tables into the store, parent collection first
pub struct LoadUseCase {
    store: Arc<dyn RecordStore>,
    loader: BatchLoader,
    clean_dir: PathBuf,
}

impl LoadUseCase {
    pub fn new(store: Arc<dyn RecordStore>, options: LoaderOptions, clean_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader: BatchLoader::new(store.clone(), options),
            store,
            clean_dir: clean_dir.into(),
        }
    }

    /// Probe, optionally clear, then load in `Collection::LOAD_ORDER`.
    ///
    /// A missing collection or an unreadable cleaned table aborts the run.
    /// Rejected batches never do; they are reported per collection.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<LoadRun> {
        let started = Instant::now();

        preflight(self.store.as_ref()).await?;

        if self.loader.options().clear_before_load {
            clear_all(self.store.as_ref()).await?;
        }

        let mut reports = Vec::with_capacity(Collection::LOAD_ORDER.len());
        for collection in Collection::LOAD_ORDER {
            let path = self.clean_dir.join(collection.clean_file());
            info!("Loading {} from {}", collection, path.display());
            let report = self.loader.load_file(&path, collection.name()).await?;
            reports.push(report);
        }

        let run = LoadRun {
            reports,
            elapsed: started.elapsed(),
        };
        info!(
            "Load finished: {} rows accepted, {} batch errors in {:.1}s",
            run.accepted_rows(),
            run.failed_batches(),
            run.elapsed.as_secs_f64()
        );
        Ok(run)
    }
}

/// Confirm every collection is reachable before any write
pub async fn preflight(store: &dyn RecordStore) -> Result<()> {
    for collection in Collection::LOAD_ORDER {
        if let Err(e) = store.probe(collection.name()).await {
            error!("Collection {} is not accessible: {}", collection, e);
            return Err(e);
        }
        info!("OK: {}", collection);
    }
    Ok(())
}

/// Delete every row, children before the parent
pub async fn clear_all(store: &dyn RecordStore) -> Result<()> {
    for collection in Collection::clear_order() {
        store.clear(collection.name(), collection.clear_filter()).await?;
        info!("Cleared {}", collection);
    }
    Ok(())
}
