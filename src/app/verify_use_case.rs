use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::ports::{Record, RecordStore};
use crate::config::VerifyConfig;
use crate::domain::Collection;

/// Post-load sanity report. Every section is best-effort.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    /// `(collection, rows)`; `None` when the store did not report a count
    pub counts: Vec<(String, Option<u64>)>,
    pub top_states: Vec<(String, usize)>,
    /// Provider rows the state breakdown was computed over
    pub state_sample_size: usize,
    pub top_categories: Vec<(String, usize)>,
    /// Rows the category breakdown was computed over
    pub category_sample_size: usize,
    pub quality_samples: Vec<QualitySample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySample {
    pub measure_description: String,
    pub score: String,
    pub national_average: String,
}

/// Use case for reading back what landed in the store
pub struct VerifyUseCase {
    store: Arc<dyn RecordStore>,
    config: VerifyConfig,
}

impl VerifyUseCase {
    pub fn new(store: Arc<dyn RecordStore>, config: VerifyConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self) -> VerificationReport {
        let mut report = VerificationReport::default();

        for collection in Collection::LOAD_ORDER {
            let count = match self.store.count_rows(collection.name()).await {
                Ok(count) => count,
                Err(e) => {
                    warn!("Count failed for {}: {}", collection, e);
                    None
                }
            };
            info!(
                "{}: {} rows",
                collection,
                count.map_or_else(|| "?".to_string(), |c| c.to_string())
            );
            report.counts.push((collection.name().to_string(), count));
        }

        if let Some(rows) = self
            .fetch(Collection::Providers, "state", Some(self.config.state_limit))
            .await
        {
            report.state_sample_size = rows.len();
            if let Some(Some(total)) = report.counts.first().map(|(_, c)| *c) {
                if (rows.len() as u64) < total {
                    warn!(
                        "State breakdown covers {} of {} providers (store row cap)",
                        rows.len(),
                        total
                    );
                }
            }
            report.top_states = top_counts(&rows, "state", self.config.top_n);
            for (state, count) in &report.top_states {
                info!("  {}: {} facilities", state, count);
            }
        }

        if let Some(rows) = self
            .fetch(Collection::Deficiencies, "deficiency_category", Some(self.config.sample_limit))
            .await
        {
            report.category_sample_size = rows.len();
            report.top_categories = top_counts(&rows, "deficiency_category", self.config.top_n);
            for (category, count) in &report.top_categories {
                info!("  {}: {}", category, count);
            }
        }

        if let Some(rows) = self
            .fetch(
                Collection::QualityMeasures,
                "measure_description,score,national_average",
                Some(self.config.sample_rows),
            )
            .await
        {
            report.quality_samples = rows.iter().map(quality_sample).collect();
            for sample in &report.quality_samples {
                info!(
                    "  {}: score={}, national_avg={}",
                    sample.measure_description, sample.score, sample.national_average
                );
            }
        }

        report
    }

    async fn fetch(&self, collection: Collection, columns: &str, limit: Option<usize>) -> Option<Vec<Record>> {
        match self.store.select(collection.name(), columns, limit).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Query on {} ({}) failed: {}", collection, columns, e);
                None
            }
        }
    }
}

/// Frequency of `column`'s present values, most frequent first, ties by value
pub fn top_counts(rows: &[Record], column: &str, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let value = match row.get(column) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(num)) => num.to_string(),
            _ => continue,
        };
        *counts.entry(value).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(n);
    sorted
}

fn two_decimals(value: Option<&Value>) -> String {
    match value.and_then(Value::as_f64) {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

fn quality_sample(row: &Record) -> QualitySample {
    let description: String = row
        .get("measure_description")
        .and_then(Value::as_str)
        .unwrap_or("(none)")
        .chars()
        .take(50)
        .collect();
    QualitySample {
        measure_description: description,
        score: two_decimals(row.get("score")),
        national_average: two_decimals(row.get("national_average")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryStore;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn top_counts_orders_by_count_then_value() {
        let rows: Vec<Record> = ["TX", "CA", "TX", "AL", "CA", "OH"]
            .iter()
            .map(|s| record(json!({ "state": s })))
            .chain([record(json!({ "state": null })), record(json!({}))])
            .collect();

        let top = top_counts(&rows, "state", 3);
        assert_eq!(
            top,
            vec![("CA".to_string(), 2), ("TX".to_string(), 2), ("AL".to_string(), 1)]
        );
    }

    #[test]
    fn quality_sample_formats_two_decimals() {
        let sample = quality_sample(&record(json!({
            "measure_description": "Falls with major injury",
            "score": 2.5,
            "national_average": null
        })));
        assert_eq!(sample.score, "2.50");
        assert_eq!(sample.national_average, "n/a");
    }

    #[tokio::test]
    async fn state_breakdown_is_bounded_and_sized() {
        let store = Arc::new(InMemoryStore::new());
        let providers: Vec<Record> = (0..5)
            .map(|i| record(json!({"federal_provider_number": format!("{:06}", i), "state": "TX"})))
            .collect();
        store.insert_batch("providers", &providers).await.unwrap();

        let config = VerifyConfig {
            state_limit: 2,
            ..VerifyConfig::default()
        };
        let report = VerifyUseCase::new(store, config).run().await;

        assert_eq!(report.state_sample_size, 2);
        assert_eq!(report.top_states, vec![("TX".to_string(), 2)]);
        assert_eq!(report.counts[0].1, Some(5));
    }

    #[tokio::test]
    async fn report_reflects_store_contents() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_batch(
                "providers",
                &[
                    record(json!({"federal_provider_number": "015009", "state": "AL"})),
                    record(json!({"federal_provider_number": "015010", "state": "AL"})),
                    record(json!({"federal_provider_number": "045001", "state": "AR"})),
                ],
            )
            .await
            .unwrap();
        store
            .insert_batch(
                "deficiencies",
                &[
                    record(json!({"federal_provider_number": "015009", "deficiency_category": "Pharmacy"})),
                    record(json!({"federal_provider_number": "015009", "deficiency_category": null})),
                ],
            )
            .await
            .unwrap();

        let report = VerifyUseCase::new(store, VerifyConfig::default()).run().await;

        assert_eq!(report.counts[0], ("providers".to_string(), Some(3)));
        assert_eq!(report.counts[2], ("quality_measures".to_string(), Some(0)));
        assert_eq!(report.top_states[0], ("AL".to_string(), 2));
        assert_eq!(report.state_sample_size, 3);
        assert_eq!(report.category_sample_size, 2);
        assert_eq!(report.top_categories, vec![("Pharmacy".to_string(), 1)]);
        assert!(report.quality_samples.is_empty());
    }
}
