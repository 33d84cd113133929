pub mod deficiencies;
pub mod providers;
pub mod quality_measures;

pub use deficiencies::DeficiencyNormalizer;
pub use providers::ProviderNormalizer;
pub use quality_measures::QualityMeasureNormalizer;

/// Source header for the provider key, shared by all three exports
pub const CCN_HEADER: &str = "CMS Certification Number (CCN)";
