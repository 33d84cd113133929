use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants;

/// The three store collections, in load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Providers,
    Deficiencies,
    QualityMeasures,
}

impl Collection {
    /// Parent first; children reference providers by key
    pub const LOAD_ORDER: [Collection; 3] = [
        Collection::Providers,
        Collection::Deficiencies,
        Collection::QualityMeasures,
    ];

    /// Reverse of load order so no child row outlives its parent
    pub fn clear_order() -> [Collection; 3] {
        let mut order = Self::LOAD_ORDER;
        order.reverse();
        order
    }

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Providers => constants::PROVIDERS,
            Collection::Deficiencies => constants::DEFICIENCIES,
            Collection::QualityMeasures => constants::QUALITY_MEASURES,
        }
    }

    pub fn raw_file(&self) -> &'static str {
        match self {
            Collection::Providers => constants::PROVIDERS_RAW_FILE,
            Collection::Deficiencies => constants::DEFICIENCIES_RAW_FILE,
            Collection::QualityMeasures => constants::QUALITY_MEASURES_RAW_FILE,
        }
    }

    pub fn clean_file(&self) -> &'static str {
        match self {
            Collection::Providers => constants::PROVIDERS_CLEAN_FILE,
            Collection::Deficiencies => constants::DEFICIENCIES_CLEAN_FILE,
            Collection::QualityMeasures => constants::QUALITY_MEASURES_CLEAN_FILE,
        }
    }

    /// Whether rows of this collection must reference an existing provider
    pub fn references_provider(&self) -> bool {
        !matches!(self, Collection::Providers)
    }

    /// A filter that matches every row. PostgREST refuses an unfiltered DELETE.
    pub fn clear_filter(&self) -> RowFilter {
        match self {
            Collection::Providers => RowFilter {
                column: constants::PROVIDER_KEY,
                predicate: "neq.IMPOSSIBLE",
            },
            _ => RowFilter {
                column: constants::SURROGATE_ID,
                predicate: "gte.0",
            },
        }
    }

    pub fn from_name(name: &str) -> Option<Collection> {
        Self::LOAD_ORDER.into_iter().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A PostgREST horizontal filter, rendered as `column=predicate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowFilter {
    pub column: &'static str,
    pub predicate: &'static str,
}

/// A cleaned, schema-conformant row that can be written to the handoff table
pub trait CleanRow: Serialize {
    /// Target column names, in output order
    const COLUMNS: &'static [&'static str];

    /// Presence flag per column, aligned with `COLUMNS`
    fn presence(&self) -> Vec<bool>;
}

/// One nursing facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub federal_provider_number: String,
    pub provider_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub overall_rating: Option<i64>,
    pub health_inspection_rating: Option<i64>,
    pub staffing_rating: Option<i64>,
    pub total_amount_of_fines_in_dollars: Option<f64>,
    pub number_of_facility_reported_incidents: Option<i64>,
}

impl CleanRow for Provider {
    const COLUMNS: &'static [&'static str] = &[
        "federal_provider_number",
        "provider_name",
        "city",
        "state",
        "overall_rating",
        "health_inspection_rating",
        "staffing_rating",
        "total_amount_of_fines_in_dollars",
        "number_of_facility_reported_incidents",
    ];

    fn presence(&self) -> Vec<bool> {
        vec![
            true,
            self.provider_name.is_some(),
            self.city.is_some(),
            self.state.is_some(),
            self.overall_rating.is_some(),
            self.health_inspection_rating.is_some(),
            self.staffing_rating.is_some(),
            self.total_amount_of_fines_in_dollars.is_some(),
            self.number_of_facility_reported_incidents.is_some(),
        ]
    }
}

/// One citation issued to a provider during a survey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deficiency {
    pub federal_provider_number: String,
    pub deficiency_description: Option<String>,
    pub deficiency_category: Option<String>,
    pub scope_severity_code: Option<String>,
    pub survey_date: Option<NaiveDate>,
}

impl CleanRow for Deficiency {
    const COLUMNS: &'static [&'static str] = &[
        "federal_provider_number",
        "deficiency_description",
        "deficiency_category",
        "scope_severity_code",
        "survey_date",
    ];

    fn presence(&self) -> Vec<bool> {
        vec![
            true,
            self.deficiency_description.is_some(),
            self.deficiency_category.is_some(),
            self.scope_severity_code.is_some(),
            self.survey_date.is_some(),
        ]
    }
}

/// One (provider, measure) observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMeasure {
    pub federal_provider_number: String,
    pub measure_description: Option<String>,
    pub score: Option<f64>,
    /// Mean of `score` across every row sharing `measure_description`
    pub national_average: Option<f64>,
}

impl CleanRow for QualityMeasure {
    const COLUMNS: &'static [&'static str] = &[
        "federal_provider_number",
        "measure_description",
        "score",
        "national_average",
    ];

    fn presence(&self) -> Vec<bool> {
        vec![
            true,
            self.measure_description.is_some(),
            self.score.is_some(),
            self.national_average.is_some(),
        ]
    }
}
