use async_trait::async_trait;

use crate::domain::RowFilter;
use crate::error::Result;

/// One wire-safe row, keyed by column name
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The remote relational store, addressed one collection at a time.
///
/// Implementations must treat a batch as all-or-nothing: either every record of
/// `insert_batch` is persisted or the call returns an error and none are.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Succeeds when the collection exists and is readable
    async fn probe(&self, collection: &str) -> Result<()>;

    /// Create-many for a single batch
    async fn insert_batch(&self, collection: &str, records: &[Record]) -> Result<()>;

    /// Exact row count, if the store reports one
    async fn count_rows(&self, collection: &str) -> Result<Option<u64>>;

    /// Project `columns` (comma-separated, `*` for all), over at most `limit` rows when given
    async fn select(&self, collection: &str, columns: &str, limit: Option<usize>) -> Result<Vec<Record>>;

    /// Delete every row matched by `filter`
    async fn clear(&self, collection: &str, filter: RowFilter) -> Result<()>;
}
