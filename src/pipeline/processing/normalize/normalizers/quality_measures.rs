use std::collections::HashMap;

use super::CCN_HEADER;
use crate::constants::QUALITY_MEASURES;
use crate::domain::QualityMeasure;
use crate::pipeline::processing::normalize::coerce::{self, ProviderKey};
use crate::pipeline::processing::normalize::{RowOutcome, TableNormalizer};

const COLUMN_MAP: &[(&str, &str)] = &[
    (CCN_HEADER, "federal_provider_number"),
    ("Measure Description", "measure_description"),
    ("Four Quarter Average Score", "score"),
];

/// Normalizer for the MDS quality measures export.
///
/// The four-quarter average is used as `score`. After row cleaning, the mean
/// score of each measure is broadcast back as `national_average`.
#[derive(Debug, Default, Clone, Copy)]
pub struct QualityMeasureNormalizer;

impl TableNormalizer for QualityMeasureNormalizer {
    type Row = QualityMeasure;

    fn table(&self) -> &'static str {
        QUALITY_MEASURES
    }

    fn column_map(&self) -> &'static [(&'static str, &'static str)] {
        COLUMN_MAP
    }

    fn clean_row(&self, cells: &[Option<String>]) -> RowOutcome<QualityMeasure> {
        let cell = |i: usize| cells.get(i).and_then(|c| c.as_deref());

        let key = coerce::provider_key(cell(0));
        let measure_description = coerce::clean_text(cell(1));
        let score = coerce::real(cell(2));

        match key {
            ProviderKey::Valid(federal_provider_number) => RowOutcome::Keep(QualityMeasure {
                federal_provider_number,
                measure_description,
                score,
                national_average: None,
            }),
            ProviderKey::Overlong(key) => RowOutcome::OverlongKey(key),
            ProviderKey::Absent if measure_description.is_none() && score.is_none() => {
                RowOutcome::Empty
            }
            ProviderKey::Absent => RowOutcome::MissingKey,
        }
    }

    fn finish(&self, rows: Vec<QualityMeasure>) -> Vec<QualityMeasure> {
        with_national_average(rows)
    }
}

/// Broadcast the per-measure mean of present scores onto every row of the measure.
/// Groups with no present score, and rows without a description, get no average.
pub fn with_national_average(mut rows: Vec<QualityMeasure>) -> Vec<QualityMeasure> {
    let mut totals: HashMap<String, (f64, usize)> = HashMap::new();
    for row in &rows {
        if let (Some(desc), Some(score)) = (&row.measure_description, row.score) {
            let entry = totals.entry(desc.clone()).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }
    }

    for row in &mut rows {
        row.national_average = row
            .measure_description
            .as_ref()
            .and_then(|desc| totals.get(desc))
            .map(|(sum, count)| sum / *count as f64);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::normalize_table;
    use crate::pipeline::storage::csv_table::RawTable;

    const HEADER: &str = "CMS Certification Number (CCN),Measure Code,Measure Description,Resident type,Four Quarter Average Score\n";

    fn measure(key: &str, desc: Option<&str>, score: Option<f64>) -> QualityMeasure {
        QualityMeasure {
            federal_provider_number: key.into(),
            measure_description: desc.map(str::to_string),
            score,
            national_average: None,
        }
    }

    #[test]
    fn group_mean_ignores_absent_scores() {
        let rows = with_national_average(vec![
            measure("015009", Some("Falls"), Some(80.0)),
            measure("015010", Some("Falls"), Some(90.0)),
            measure("015011", Some("Falls"), None),
        ]);
        assert!(rows.iter().all(|r| r.national_average == Some(85.0)));
    }

    #[test]
    fn all_absent_group_has_no_average() {
        let rows = with_national_average(vec![
            measure("015009", Some("Pressure ulcers"), None),
            measure("015010", Some("Pressure ulcers"), None),
            measure("015010", Some("Falls"), Some(4.0)),
        ]);
        assert_eq!(rows[0].national_average, None);
        assert_eq!(rows[1].national_average, None);
        assert_eq!(rows[2].national_average, Some(4.0));
    }

    #[test]
    fn rows_without_description_have_no_average() {
        let rows = with_national_average(vec![
            measure("015009", None, Some(10.0)),
            measure("015010", None, Some(20.0)),
        ]);
        assert!(rows.iter().all(|r| r.national_average.is_none()));
    }

    #[test]
    fn averages_are_identical_within_a_measure() {
        let raw = RawTable::from_reader(
            QUALITY_MEASURES,
            format!(
                "{HEADER}15009,401,Falls with major injury,Long Stay,1.5\n\
                 15010,401,Falls with major injury ,Long Stay,2.5\n\
                 15011,401,Falls with major injury,Long Stay,Not Available\n\
                 15009,410,Antipsychotic medication,Long Stay,12\n"
            )
            .as_bytes(),
        )
        .unwrap();
        let table = normalize_table(&QualityMeasureNormalizer, &raw).unwrap();

        assert_eq!(table.rows.len(), 4);
        // trailing whitespace is trimmed before grouping
        for row in &table.rows[..3] {
            assert_eq!(row.national_average, Some(2.0));
        }
        assert_eq!(table.rows[2].score, None);
        assert_eq!(table.rows[3].national_average, Some(12.0));
    }
}
