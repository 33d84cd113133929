use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

use crate::app::ports::{Record, RecordStore};
use crate::constants::{PROVIDER_KEY, SURROGATE_ID};
use crate::domain::{Collection, RowFilter};
use crate::error::{PipelineError, Result};

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, Vec<Record>>,
    next_id: u64,
}

/// In-memory store for dry runs and tests.
///
/// Mirrors the constraints the real tables carry: provider keys are unique,
/// child rows must reference an existing provider, and a violating batch is
/// rejected as a whole.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for collection in Collection::LOAD_ORDER {
            tables.rows.insert(collection.name(), Vec::new());
        }
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Snapshot of a collection's rows, in insertion order
    pub async fn rows(&self, collection: &str) -> Vec<Record> {
        let tables = self.tables.lock().await;
        tables.rows.get(collection).cloned().unwrap_or_default()
    }

    fn lookup(collection: &str) -> Result<Collection> {
        Collection::from_name(collection)
            .ok_or_else(|| PipelineError::MissingCollection(collection.to_string()))
    }
}

fn key_of(record: &Record) -> Option<&str> {
    record.get(PROVIDER_KEY).and_then(Value::as_str)
}

fn conflict(body: String) -> PipelineError {
    PipelineError::Store { status: 409, body }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn probe(&self, collection: &str) -> Result<()> {
        Self::lookup(collection).map(|_| ())
    }

    async fn insert_batch(&self, collection: &str, records: &[Record]) -> Result<()> {
        let target = Self::lookup(collection)?;
        let mut tables = self.tables.lock().await;

        let parents: HashSet<String> = tables
            .rows
            .get(Collection::Providers.name())
            .map(|rows| rows.iter().filter_map(key_of).map(str::to_string).collect())
            .unwrap_or_default();

        // Validate the whole batch before touching the table
        if target.references_provider() {
            if let Some(orphan) = records.iter().find(|r| !key_of(r).is_some_and(|k| parents.contains(k))) {
                return Err(conflict(format!(
                    "insert or update on table \"{}\" violates foreign key constraint: key ({})=({}) is not present in table \"providers\"",
                    collection,
                    PROVIDER_KEY,
                    key_of(orphan).unwrap_or("null")
                )));
            }
        } else {
            let mut batch_keys = HashSet::new();
            for record in records {
                let Some(key) = key_of(record) else {
                    return Err(PipelineError::Store {
                        status: 400,
                        body: format!("null value in column \"{}\" violates not-null constraint", PROVIDER_KEY),
                    });
                };
                if parents.contains(key) || !batch_keys.insert(key) {
                    return Err(conflict(format!(
                        "duplicate key value violates unique constraint \"providers_pkey\": ({})=({})",
                        PROVIDER_KEY, key
                    )));
                }
            }
        }

        let mut accepted = records.to_vec();
        if target.references_provider() {
            for record in &mut accepted {
                tables.next_id += 1;
                record.insert(SURROGATE_ID.to_string(), Value::from(tables.next_id));
            }
        }

        let rows = tables.rows.entry(target.name()).or_default();
        rows.extend(accepted);
        debug!("Inserted {} rows into {} (now {})", records.len(), collection, rows.len());
        Ok(())
    }

    async fn count_rows(&self, collection: &str) -> Result<Option<u64>> {
        let target = Self::lookup(collection)?;
        let tables = self.tables.lock().await;
        Ok(tables.rows.get(target.name()).map(|rows| rows.len() as u64))
    }

    async fn select(&self, collection: &str, columns: &str, limit: Option<usize>) -> Result<Vec<Record>> {
        let target = Self::lookup(collection)?;
        let tables = self.tables.lock().await;
        let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
        let all = wanted.contains(&"*");

        Ok(tables
            .rows
            .get(target.name())
            .map(|rows| {
                rows.iter()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|row| {
                        if all {
                            row.clone()
                        } else {
                            wanted
                                .iter()
                                .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                                .collect()
                        }
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// The clear filters used by the loader always match every row, so the filter is not evaluated
    async fn clear(&self, collection: &str, _filter: RowFilter) -> Result<()> {
        let target = Self::lookup(collection)?;
        let mut tables = self.tables.lock().await;

        if target == Collection::Providers {
            let children = Collection::LOAD_ORDER
                .iter()
                .filter(|c| c.references_provider())
                .map(|c| tables.rows.get(c.name()).map_or(0, Vec::len))
                .sum::<usize>();
            if children > 0 {
                return Err(conflict(
                    "update or delete on table \"providers\" violates foreign key constraint".into(),
                ));
            }
        }

        if let Some(rows) = tables.rows.get_mut(target.name()) {
            rows.clear();
        }
        Ok(())
    }
}
