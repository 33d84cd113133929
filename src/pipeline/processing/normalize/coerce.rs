//! Cell-level coercions used by the table normalizers.
//!
//! Every function here is total: malformed input degrades to `None` (absent)
//! instead of failing the row.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::PROVIDER_KEY_WIDTH;

static CURRENCY_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$,]").expect("currency pattern is valid"));

/// Leading calendar date of an ISO-8601 date-time, e.g. `2023-04-05T10:00:00Z`
static ISO_DATETIME_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})[T ]\d{2}:\d{2}").expect("datetime pattern is valid")
});

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d"];

/// Outcome of normalizing a provider key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKey {
    Valid(String),
    Absent,
    /// Longer than the fixed key width; never truncated
    Overlong(String),
}

/// Trim surrounding whitespace; empty or whitespace-only text is absent.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Left-pad a provider key with zeros to the fixed width.
pub fn provider_key(raw: Option<&str>) -> ProviderKey {
    let Some(key) = clean_text(raw) else {
        return ProviderKey::Absent;
    };
    let len = key.chars().count();
    if len > PROVIDER_KEY_WIDTH {
        return ProviderKey::Overlong(key);
    }
    let mut padded = "0".repeat(PROVIDER_KEY_WIDTH - len);
    padded.push_str(&key);
    ProviderKey::Valid(padded)
}

/// Parse a real value. Non-finite results (`NaN`, `inf`) are treated as absent.
pub fn real(raw: Option<&str>) -> Option<f64> {
    let text = clean_text(raw)?;
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a whole number. `3.0` is accepted as `3`; `3.5` is absent.
pub fn whole(raw: Option<&str>) -> Option<i64> {
    let text = clean_text(raw)?;
    if let Ok(v) = text.parse::<i64>() {
        return Some(v);
    }
    let v = text.parse::<f64>().ok().filter(|v| v.is_finite())?;
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Parse a dollar amount such as `$1,234.50`.
pub fn currency(raw: Option<&str>) -> Option<f64> {
    let text = clean_text(raw)?;
    let stripped = CURRENCY_NOISE.replace_all(&text, "").into_owned();
    real(Some(stripped.as_str()))
}

/// Parse a calendar date from the shapes seen in CMS exports.
pub fn date(raw: Option<&str>) -> Option<NaiveDate> {
    let text = clean_text(raw)?;
    if let Some(caps) = ISO_DATETIME_PREFIX.captures(&text) {
        return NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok();
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
}
