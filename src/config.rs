use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::error::{PipelineError, Result};
use crate::pipeline::loader::LoaderOptions;

pub const DEFAULT_CONFIG_PATH: &str = "cms_loader.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub loader: LoaderConfig,
    pub verify: VerifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the raw CMS exports
    pub raw_dir: PathBuf,
    /// Directory the cleaned tables are written to and loaded from
    pub clean_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data"),
            clean_dir: PathBuf::from("outputs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub clear_before_load: bool,
    pub int_columns: Vec<String>,
    pub text_columns: Vec<String>,
    pub max_reported_errors: usize,
    pub progress_every: usize,
    pub request_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            clear_before_load: false,
            int_columns: constants::default_int_columns(),
            text_columns: constants::default_text_columns(),
            max_reported_errors: constants::DEFAULT_MAX_REPORTED_ERRORS,
            progress_every: constants::DEFAULT_PROGRESS_EVERY,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Provider rows pulled for the state breakdown
    pub state_limit: usize,
    /// Rows pulled for the deficiency-category breakdown
    pub sample_limit: usize,
    /// Entries shown per top-N breakdown
    pub top_n: usize,
    /// Quality-measure rows shown as a sample
    pub sample_rows: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            state_limit: 100_000,
            sample_limit: 50_000,
            top_n: 10,
            sample_rows: 5,
        }
    }
}

impl Config {
    /// Load from `path` (or `cms_loader.toml` if present), then apply environment overrides.
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    PipelineError::Config(format!("Failed to read config file '{}': {}", p.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => match fs::read_to_string(DEFAULT_CONFIG_PATH) {
                Ok(content) => Self::from_toml_str(&content)?,
                Err(_) => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `CMS_RAW_DIR`, `CMS_CLEAN_DIR` and `CMS_BATCH_SIZE` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("CMS_RAW_DIR") {
            self.paths.raw_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CMS_CLEAN_DIR") {
            self.paths.clean_dir = PathBuf::from(dir);
        }
        if let Some(size) = lookup("CMS_BATCH_SIZE") {
            self.loader.batch_size = size.trim().parse().map_err(|_| {
                PipelineError::Config(format!("CMS_BATCH_SIZE must be a positive integer, got '{}'", size))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.loader.batch_size == 0 {
            return Err(PipelineError::Config("loader.batch_size must be at least 1".into()));
        }
        if self.loader.request_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "loader.request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            clear_before_load: self.loader.clear_before_load,
            batch_size: self.loader.batch_size,
            int_columns: self.loader.int_columns.iter().cloned().collect(),
            text_columns: self.loader.text_columns.iter().cloned().collect(),
            max_reported_errors: self.loader.max_reported_errors,
            progress_every: self.loader.progress_every,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.loader.request_timeout_secs)
    }
}

/// Connection settings for the PostgREST gateway. Never read from the config file.
#[derive(Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub service_key: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl StoreConfig {
    /// Config via env:
    /// - SUPABASE_URL (e.g., https://xyzcompany.supabase.co) OR SUPABASE_PROJECT_REF
    /// - SUPABASE_SERVICE_ROLE_KEY (service role key)
    pub fn from_env(request_timeout: Duration) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), request_timeout)
    }

    pub fn from_lookup<F>(lookup: F, request_timeout: Duration) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Allow either a full URL or a project ref
        let base_url = match lookup("SUPABASE_URL").filter(|u| !u.trim().is_empty()) {
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => {
                let project_ref = lookup("SUPABASE_PROJECT_REF")
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| {
                        PipelineError::Config(
                            "set SUPABASE_URL or SUPABASE_PROJECT_REF to locate the store".into(),
                        )
                    })?;
                format!("https://{}.supabase.co", project_ref.trim())
            }
        };

        let service_key = lookup("SUPABASE_SERVICE_ROLE_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PipelineError::Config("SUPABASE_SERVICE_ROLE_KEY is not set".into()))?;

        Ok(Self {
            base_url,
            service_key,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.loader.batch_size, 500);
        assert_eq!(config.loader.max_reported_errors, 3);
        assert_eq!(config.loader.request_timeout_secs, 120);
        assert!(!config.loader.clear_before_load);
        assert_eq!(config.paths.clean_dir, PathBuf::from("outputs"));

        let options = config.loader_options();
        assert!(options.int_columns.contains("staffing_rating"));
        assert!(options.text_columns.contains("federal_provider_number"));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [paths]
            raw_dir = "/srv/cms/raw"

            [loader]
            batch_size = 250
            clear_before_load = true
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.raw_dir, PathBuf::from("/srv/cms/raw"));
        assert_eq!(config.paths.clean_dir, PathBuf::from("outputs"));
        assert_eq!(config.loader.batch_size, 250);
        assert!(config.loader.clear_before_load);
        assert_eq!(config.verify.sample_limit, 50_000);
        assert_eq!(config.verify.state_limit, 100_000);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("CMS_BATCH_SIZE", "1000"), ("CMS_CLEAN_DIR", "/tmp/clean")]))
            .unwrap();
        assert_eq!(config.loader.batch_size, 1000);
        assert_eq!(config.paths.clean_dir, PathBuf::from("/tmp/clean"));
    }

    #[test]
    fn invalid_batch_size_is_rejected() {
        let mut config = Config::default();
        assert!(config.apply_overrides(env(&[("CMS_BATCH_SIZE", "lots")])).is_err());

        config.loader.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn store_config_accepts_url_or_project_ref() {
        let timeout = Duration::from_secs(5);
        let from_url = StoreConfig::from_lookup(
            env(&[("SUPABASE_URL", "https://abc.supabase.co/"), ("SUPABASE_SERVICE_ROLE_KEY", "k")]),
            timeout,
        )
        .unwrap();
        assert_eq!(from_url.base_url, "https://abc.supabase.co");

        let from_ref = StoreConfig::from_lookup(
            env(&[("SUPABASE_PROJECT_REF", "xyz"), ("SUPABASE_SERVICE_ROLE_KEY", "k")]),
            timeout,
        )
        .unwrap();
        assert_eq!(from_ref.base_url, "https://xyz.supabase.co");
    }

    #[test]
    fn store_config_requires_a_key() {
        let err = StoreConfig::from_lookup(env(&[("SUPABASE_URL", "https://abc.supabase.co")]), Duration::from_secs(5));
        assert!(matches!(err, Err(PipelineError::Config(_))));
    }

    #[test]
    fn store_config_debug_redacts_key() {
        let config = StoreConfig::from_lookup(
            env(&[("SUPABASE_URL", "https://abc.supabase.co"), ("SUPABASE_SERVICE_ROLE_KEY", "secret")]),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
