use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::CleanRow;
use crate::error::{PipelineError, Result};

/// A raw CMS export held as untyped text records
#[derive(Debug, Clone)]
pub struct RawTable {
    pub name: String,
    headers: StringRecord,
    records: Vec<StringRecord>,
}

/// Raw cells selected by source header, in mapping order
#[derive(Debug, Clone)]
pub struct Projection {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn read(path: &Path, name: &str) -> Result<Self> {
        let file = fs::File::open(path)?;
        Self::from_reader(name, file)
    }

    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(table = name, rows = records.len(), columns = headers.len(), "Read raw table");
        Ok(Self {
            name: name.to_string(),
            headers,
            records,
        })
    }

    /// Select the mapped source columns and rename them to their targets.
    /// A missing source header is fatal; unmapped columns are dropped.
    pub fn project(&self, mapping: &[(&'static str, &'static str)]) -> Result<Projection> {
        let mut indices = Vec::with_capacity(mapping.len());
        for (source, _) in mapping {
            let idx = self
                .headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == *source)
                .ok_or_else(|| PipelineError::MissingColumn {
                    table: self.name.clone(),
                    column: source.to_string(),
                })?;
            indices.push(idx);
        }

        let rows = self
            .records
            .iter()
            .map(|record| {
                indices
                    .iter()
                    .map(|&i| record.get(i).filter(|v| !v.is_empty()).map(str::to_string))
                    .collect()
            })
            .collect();

        Ok(Projection {
            columns: mapping.iter().map(|(_, target)| *target).collect(),
            rows,
        })
    }
}

/// A cleaned table as read back by the loader: header names plus optional cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl CleanTable {
    pub fn read(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().from_reader(reader);
        let columns = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
                    .collect(),
            );
        }
        Ok(Self { columns, rows })
    }

    /// Remove a column (and its cells) if present. Returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.columns.iter().position(|c| c == name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serialize cleaned rows with an explicit header. Absent values become empty cells.
pub fn render_clean_table<T: CleanRow + Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wtr.write_record(T::COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

/// SHA-256 of a rendered table, hex encoded
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A cleaned table written under a temporary name next to its final path.
/// Nothing is visible at `target` until `commit`.
#[derive(Debug)]
pub struct StagedFile {
    staging: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    pub fn write(target: &Path, bytes: &[u8]) -> Result<Self> {
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut staging = target.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, bytes)?;
        Ok(Self {
            staging,
            target: target.to_path_buf(),
        })
    }

    /// Move the staged bytes into place
    pub fn commit(self) -> Result<PathBuf> {
        fs::rename(&self.staging, &self.target)?;
        debug!(path = %self.target.display(), "Committed cleaned table");
        Ok(self.target)
    }

    /// Remove the staged bytes, leaving `target` untouched
    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.staging) {
            debug!(path = %self.staging.display(), "Could not remove staged file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QualityMeasure;

    const RAW: &str = "CMS Certification Number (CCN),Measure Description,Four Quarter Average Score,Footnote\n\
                       15009,Falls,12.5,\n\
                       ,Falls,,\n";

    #[test]
    fn projection_renames_and_drops_extra_columns() {
        let table = RawTable::from_reader("quality_measures", RAW.as_bytes()).unwrap();
        let projected = table
            .project(&[
                ("CMS Certification Number (CCN)", "federal_provider_number"),
                ("Four Quarter Average Score", "score"),
            ])
            .unwrap();

        assert_eq!(projected.columns, vec!["federal_provider_number", "score"]);
        assert_eq!(projected.rows[0], vec![Some("15009".into()), Some("12.5".into())]);
        assert_eq!(projected.rows[1], vec![None, None]);
    }

    #[test]
    fn missing_source_column_is_fatal() {
        let table = RawTable::from_reader("quality_measures", RAW.as_bytes()).unwrap();
        let err = table
            .project(&[("Measure Code", "measure_code")])
            .unwrap_err();
        match err {
            PipelineError::MissingColumn { table, column } => {
                assert_eq!(table, "quality_measures");
                assert_eq!(column, "Measure Code");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clean_table_keeps_header_when_empty() {
        let bytes = render_clean_table::<QualityMeasure>(&[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "federal_provider_number,measure_description,score,national_average\n"
        );
    }

    #[test]
    fn clean_table_writes_absent_as_empty_cell() {
        let rows = vec![QualityMeasure {
            federal_provider_number: "015009".into(),
            measure_description: Some("Falls, major injury".into()),
            score: None,
            national_average: Some(2.5),
        }];
        let text = String::from_utf8(render_clean_table(&rows).unwrap()).unwrap();
        let body = text.lines().nth(1).unwrap();
        assert_eq!(body, "015009,\"Falls, major injury\",,2.5");

        let read_back = CleanTable::from_reader(text.as_bytes()).unwrap();
        assert_eq!(read_back.columns.len(), 4);
        assert_eq!(read_back.rows[0][2], None);
        assert_eq!(read_back.rows[0][3].as_deref(), Some("2.5"));
    }

    #[test]
    fn staged_file_is_invisible_until_committed() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("providers_clean.csv");

        let staged = StagedFile::write(&target, b"federal_provider_number\n").unwrap();
        assert!(!target.exists());
        assert_eq!(staged.commit().unwrap(), target);
        assert_eq!(fs::read(&target).unwrap(), b"federal_provider_number\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let other = dir.path().join("deficiencies_clean.csv");
        StagedFile::write(&other, b"x\n").unwrap().discard();
        assert!(!other.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint(b"federal_provider_number\n015009\n");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint(b"federal_provider_number\n015009\n"));
        assert_ne!(a, fingerprint(b"federal_provider_number\n015010\n"));
    }

    #[test]
    fn drop_column_removes_cells() {
        let mut table = CleanTable::from_reader("id,federal_provider_number\n1,015009\n".as_bytes()).unwrap();
        assert!(table.drop_column("id"));
        assert!(!table.drop_column("id"));
        assert_eq!(table.columns, vec!["federal_provider_number"]);
        assert_eq!(table.rows[0], vec![Some("015009".to_string())]);
    }
}
