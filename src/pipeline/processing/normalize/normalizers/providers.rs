use std::collections::HashSet;

use super::CCN_HEADER;
use crate::constants::PROVIDERS;
use crate::domain::Provider;
use crate::pipeline::processing::normalize::coerce::{self, ProviderKey};
use crate::pipeline::processing::normalize::{RowOutcome, TableNormalizer};

const COLUMN_MAP: &[(&str, &str)] = &[
    (CCN_HEADER, "federal_provider_number"),
    ("Provider Name", "provider_name"),
    ("City/Town", "city"),
    ("State", "state"),
    ("Overall Rating", "overall_rating"),
    ("Health Inspection Rating", "health_inspection_rating"),
    ("Staffing Rating", "staffing_rating"),
    ("Total Amount of Fines in Dollars", "total_amount_of_fines_in_dollars"),
    ("Number of Facility Reported Incidents", "number_of_facility_reported_incidents"),
];

/// Normalizer for the provider information export. Deduplicates on the provider key.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderNormalizer;

fn cell(cells: &[Option<String>], i: usize) -> Option<&str> {
    cells.get(i).and_then(|c| c.as_deref())
}

impl TableNormalizer for ProviderNormalizer {
    type Row = Provider;

    fn table(&self) -> &'static str {
        PROVIDERS
    }

    fn column_map(&self) -> &'static [(&'static str, &'static str)] {
        COLUMN_MAP
    }

    fn clean_row(&self, cells: &[Option<String>]) -> RowOutcome<Provider> {
        let key = coerce::provider_key(cell(cells, 0));
        let provider_name = coerce::clean_text(cell(cells, 1));
        let city = coerce::clean_text(cell(cells, 2));
        let state = coerce::clean_text(cell(cells, 3));
        let overall_rating = coerce::whole(cell(cells, 4));
        let health_inspection_rating = coerce::whole(cell(cells, 5));
        let staffing_rating = coerce::whole(cell(cells, 6));
        let total_amount_of_fines_in_dollars = coerce::currency(cell(cells, 7));
        let number_of_facility_reported_incidents = coerce::whole(cell(cells, 8));

        let federal_provider_number = match key {
            ProviderKey::Valid(key) => key,
            ProviderKey::Overlong(key) => return RowOutcome::OverlongKey(key),
            ProviderKey::Absent => {
                let all_absent = provider_name.is_none()
                    && city.is_none()
                    && state.is_none()
                    && overall_rating.is_none()
                    && health_inspection_rating.is_none()
                    && staffing_rating.is_none()
                    && total_amount_of_fines_in_dollars.is_none()
                    && number_of_facility_reported_incidents.is_none();
                return if all_absent {
                    RowOutcome::Empty
                } else {
                    RowOutcome::MissingKey
                };
            }
        };

        RowOutcome::Keep(Provider {
            federal_provider_number,
            provider_name,
            city,
            state,
            overall_rating,
            health_inspection_rating,
            staffing_rating,
            total_amount_of_fines_in_dollars,
            number_of_facility_reported_incidents,
        })
    }

    /// Keep the first occurrence of each provider key, in source order
    fn finish(&self, rows: Vec<Provider>) -> Vec<Provider> {
        let mut seen = HashSet::with_capacity(rows.len());
        rows.into_iter()
            .filter(|p| seen.insert(p.federal_provider_number.clone()))
            .collect()
    }
}
