use super::CCN_HEADER;
use crate::constants::DEFICIENCIES;
use crate::domain::Deficiency;
use crate::pipeline::processing::normalize::coerce::{self, ProviderKey};
use crate::pipeline::processing::normalize::{RowOutcome, TableNormalizer};

const COLUMN_MAP: &[(&str, &str)] = &[
    (CCN_HEADER, "federal_provider_number"),
    ("Deficiency Description", "deficiency_description"),
    ("Deficiency Category", "deficiency_category"),
    ("Scope Severity Code", "scope_severity_code"),
    ("Survey Date", "survey_date"),
];

/// Normalizer for the health deficiencies export. No deduplication: a provider
/// legitimately carries many citations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeficiencyNormalizer;

impl TableNormalizer for DeficiencyNormalizer {
    type Row = Deficiency;

    fn table(&self) -> &'static str {
        DEFICIENCIES
    }

    fn column_map(&self) -> &'static [(&'static str, &'static str)] {
        COLUMN_MAP
    }

    fn clean_row(&self, cells: &[Option<String>]) -> RowOutcome<Deficiency> {
        let cell = |i: usize| cells.get(i).and_then(|c| c.as_deref());

        let key = coerce::provider_key(cell(0));
        let deficiency_description = coerce::clean_text(cell(1));
        let deficiency_category = coerce::clean_text(cell(2));
        let scope_severity_code = coerce::clean_text(cell(3));
        let survey_date = coerce::date(cell(4));

        match key {
            ProviderKey::Valid(federal_provider_number) => RowOutcome::Keep(Deficiency {
                federal_provider_number,
                deficiency_description,
                deficiency_category,
                scope_severity_code,
                survey_date,
            }),
            ProviderKey::Overlong(key) => RowOutcome::OverlongKey(key),
            ProviderKey::Absent
                if deficiency_description.is_none()
                    && deficiency_category.is_none()
                    && scope_severity_code.is_none()
                    && survey_date.is_none() =>
            {
                RowOutcome::Empty
            }
            ProviderKey::Absent => RowOutcome::MissingKey,
        }
    }
}
