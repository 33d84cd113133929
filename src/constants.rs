/// Collection and file name constants shared by the normalizer, loader and verifier.
/// The collection names must match the tables provisioned in the store.

// Store collections
pub const PROVIDERS: &str = "providers";
pub const DEFICIENCIES: &str = "deficiencies";
pub const QUALITY_MEASURES: &str = "quality_measures";

// Raw CMS exports (inputs to the normalizer)
pub const PROVIDERS_RAW_FILE: &str = "providers.csv";
pub const DEFICIENCIES_RAW_FILE: &str = "deficiencies.csv";
pub const QUALITY_MEASURES_RAW_FILE: &str = "quality_measures.csv";

// Cleaned tables (the handoff between normalizer and loader)
pub const PROVIDERS_CLEAN_FILE: &str = "providers_clean.csv";
pub const DEFICIENCIES_CLEAN_FILE: &str = "deficiencies_clean.csv";
pub const QUALITY_MEASURES_CLEAN_FILE: &str = "quality_measures_clean.csv";

/// Shared key column across all three collections
pub const PROVIDER_KEY: &str = "federal_provider_number";

/// Width the provider key is zero-padded to
pub const PROVIDER_KEY_WIDTH: usize = 6;

/// Surrogate identity column assigned by the store for child collections
pub const SURROGATE_ID: &str = "id";

// Loader defaults
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 3;
pub const DEFAULT_PROGRESS_EVERY: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Longest response body excerpt kept in a batch diagnostic
pub const ERROR_BODY_EXCERPT: usize = 300;

/// Provider columns sent to the store as JSON integers
pub fn default_int_columns() -> Vec<String> {
    vec![
        "overall_rating".to_string(),
        "health_inspection_rating".to_string(),
        "staffing_rating".to_string(),
        "number_of_facility_reported_incidents".to_string(),
    ]
}

/// Columns that always travel as strings (zero padding must survive)
pub fn default_text_columns() -> Vec<String> {
    vec![PROVIDER_KEY.to_string()]
}
