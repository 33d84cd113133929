use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::domain::Collection;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::normalize::{
    normalize_table, DeficiencyNormalizer, NormalizeSummary, ProviderNormalizer,
    QualityMeasureNormalizer, TableNormalizer,
};
use crate::pipeline::storage::csv_table::{fingerprint, render_clean_table, RawTable, StagedFile};

/// Rows echoed at debug level after each table is cleaned
const PREVIEW_ROWS: usize = 3;

/// Use case for turning the three raw CMS exports into cleaned handoff tables
pub struct NormalizeUseCase {
    raw_dir: PathBuf,
    clean_dir: PathBuf,
}

/// One table cleaned and rendered in memory, not yet on disk
struct PreparedTable {
    collection: Collection,
    summary: NormalizeSummary,
    bytes: Vec<u8>,
}

impl NormalizeUseCase {
    pub fn new(raw_dir: impl Into<PathBuf>, clean_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            clean_dir: clean_dir.into(),
        }
    }

    /// Normalize every table in load order. Any read, schema or write failure aborts
    /// the run, and the clean directory is only touched once all three tables are ready.
    pub fn run(&self) -> Result<Vec<NormalizeSummary>> {
        let prepared = vec![
            self.prepare(Collection::Providers, &ProviderNormalizer)?,
            self.prepare(Collection::Deficiencies, &DeficiencyNormalizer)?,
            self.prepare(Collection::QualityMeasures, &QualityMeasureNormalizer)?,
        ];

        let mut staged = Vec::with_capacity(prepared.len());
        for table in &prepared {
            let target = self.clean_dir.join(table.collection.clean_file());
            match StagedFile::write(&target, &table.bytes) {
                Ok(file) => staged.push(file),
                Err(e) => {
                    staged.into_iter().for_each(StagedFile::discard);
                    return Err(e);
                }
            }
        }

        let mut summaries = Vec::with_capacity(prepared.len());
        for (table, file) in prepared.into_iter().zip(staged) {
            let path = file.commit()?;
            log_summary(&table.summary, &path);
            summaries.push(table.summary);
        }
        Ok(summaries)
    }

    #[instrument(skip(self, normalizer), fields(table = %collection))]
    fn prepare<N: TableNormalizer>(&self, collection: Collection, normalizer: &N) -> Result<PreparedTable> {
        let raw_path = self.raw_dir.join(collection.raw_file());
        info!("Reading {}", raw_path.display());
        let raw = RawTable::read(&raw_path, collection.name())?;

        let normalized = normalize_table(normalizer, &raw)?;
        let bytes = render_clean_table(&normalized.rows)?;

        let mut summary = normalized.summary;
        summary.sha256 = Some(fingerprint(&bytes));

        for row in normalized.rows.iter().take(PREVIEW_ROWS) {
            if let Ok(json) = serde_json::to_string(row) {
                debug!("Sample row: {}", json);
            }
        }

        metrics::normalize::rows_read(collection.name(), summary.rows_before);
        metrics::normalize::rows_written(collection.name(), summary.rows_after);
        metrics::normalize::rows_dropped(collection.name(), summary.removed());

        Ok(PreparedTable {
            collection,
            summary,
            bytes,
        })
    }
}

fn log_summary(summary: &NormalizeSummary, clean_path: &Path) {
    info!(
        "Wrote {} rows to {} (sha256 {})",
        summary.rows_after,
        clean_path.display(),
        summary.sha256.as_deref().unwrap_or("-")
    );
    if summary.dropped_missing_key + summary.dropped_empty > 0 {
        info!(
            "Dropped {} rows without a provider key ({} entirely empty)",
            summary.dropped_missing_key + summary.dropped_empty,
            summary.dropped_empty
        );
    }
    if summary.dropped_duplicates > 0 {
        info!("Dropped {} duplicate provider rows", summary.dropped_duplicates);
    }
    let nulls: Vec<String> = summary
        .null_pct
        .iter()
        .map(|(column, pct)| format!("{}={:.1}%", column, pct))
        .collect();
    info!("Null %: {}", nulls.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CleanRow;
    use crate::pipeline::storage::csv_table::CleanTable;
    use std::fs;
    use tempfile::TempDir;

    const PROVIDERS_CSV: &str = "\
CMS Certification Number (CCN),Provider Name,City/Town,State,Overall Rating,Health Inspection Rating,Staffing Rating,Total Amount of Fines in Dollars,Number of Facility Reported Incidents
15009,BURNS NURSING HOME,RUSSELLVILLE,AL,5,4,3,\"$1,250.50\",0
15009,BURNS NURSING HOME (DUP),RUSSELLVILLE,AL,1,1,1,,
";
    const DEFICIENCIES_CSV: &str = "\
CMS Certification Number (CCN),Deficiency Description,Deficiency Category,Scope Severity Code,Survey Date
015009,Keep drugs locked,Pharmacy Service Deficiencies,D,2023-05-04
";
    const QUALITY_CSV: &str = "\
CMS Certification Number (CCN),Measure Description,Four Quarter Average Score
015009,Falls with major injury,2.5
";

    fn raw_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("providers.csv"), PROVIDERS_CSV).unwrap();
        fs::write(dir.path().join("deficiencies.csv"), DEFICIENCIES_CSV).unwrap();
        fs::write(dir.path().join("quality_measures.csv"), QUALITY_CSV).unwrap();
        dir
    }

    #[test]
    fn writes_three_clean_tables_with_fingerprints() {
        let raw = raw_dir();
        let clean = TempDir::new().unwrap();
        let use_case = NormalizeUseCase::new(raw.path(), clean.path().join("out"));

        let summaries = use_case.run().unwrap();

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].rows_before, 2);
        assert_eq!(summaries[0].rows_after, 1);
        assert_eq!(summaries[0].dropped_duplicates, 1);
        assert!(summaries.iter().all(|s| s.sha256.as_ref().map(String::len) == Some(64)));

        let providers = CleanTable::read(&clean.path().join("out/providers_clean.csv")).unwrap();
        assert_eq!(providers.columns, crate::domain::Provider::COLUMNS);
        assert_eq!(providers.rows[0][0].as_deref(), Some("015009"));
        assert_eq!(providers.rows[0][1].as_deref(), Some("BURNS NURSING HOME"));
    }

    #[test]
    fn missing_raw_file_aborts() {
        let raw = raw_dir();
        fs::remove_file(raw.path().join("deficiencies.csv")).unwrap();
        let clean = TempDir::new().unwrap();

        let result = NormalizeUseCase::new(raw.path(), clean.path()).run();
        assert!(result.is_err());
    }

    #[test]
    fn schema_error_in_a_later_table_writes_nothing() {
        let raw = raw_dir();
        fs::write(
            raw.path().join("quality_measures.csv"),
            "CMS Certification Number (CCN),Measure Description\n015009,Falls\n",
        )
        .unwrap();
        let clean = TempDir::new().unwrap();

        let err = NormalizeUseCase::new(raw.path(), clean.path()).run().unwrap_err();

        assert!(matches!(err, crate::error::PipelineError::MissingColumn { .. }));
        let left: Vec<_> = fs::read_dir(clean.path()).unwrap().collect();
        assert!(left.is_empty(), "clean directory should stay empty: {:?}", left);
    }

    #[test]
    fn failed_run_keeps_previous_outputs_intact() {
        let raw = raw_dir();
        let clean = TempDir::new().unwrap();
        let use_case = NormalizeUseCase::new(raw.path(), clean.path());
        let first = use_case.run().unwrap();
        let before = fs::read(clean.path().join("providers_clean.csv")).unwrap();

        fs::write(
            raw.path().join("providers.csv"),
            "CMS Certification Number (CCN),Provider Name,City/Town,State,Overall Rating,Health Inspection Rating,Staffing Rating,Total Amount of Fines in Dollars,Number of Facility Reported Incidents\n45001,OTHER HOME,LITTLE ROCK,AR,3,3,3,,0\n",
        )
        .unwrap();
        fs::remove_file(raw.path().join("quality_measures.csv")).unwrap();
        assert!(use_case.run().is_err());

        assert_eq!(fs::read(clean.path().join("providers_clean.csv")).unwrap(), before);
        assert_eq!(fs::read_dir(clean.path()).unwrap().count(), 3);
        assert_eq!(first.len(), 3);
    }
}
