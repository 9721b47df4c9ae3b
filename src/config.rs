use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "LabIngest";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_EXTRACTOR_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOG_FILTER: &str = "info,lab_ingest=debug";

const ENV_DB_PATH: &str = "LAB_INGEST_DB_PATH";
const ENV_EXTRACTOR_URL: &str = "LAB_INGEST_EXTRACTOR_URL";
const ENV_PROCESSOR_ID: &str = "LAB_INGEST_PROCESSOR_ID";
const ENV_EXTRACTOR_TIMEOUT: &str = "LAB_INGEST_EXTRACTOR_TIMEOUT_SECS";
const ENV_LOG: &str = "LAB_INGEST_LOG";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cannot determine home directory; set LAB_INGEST_DB_PATH")]
    NoHomeDir,

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Get the application data directory
/// ~/LabIngest/ on all platforms
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(APP_NAME))
}

/// Where the extraction service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub base_url: String,
    pub processor_id: String,
    pub timeout_secs: u64,
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub db_path: PathBuf,
    /// `None` means documents are read as already-extracted JSON graphs.
    pub extractor: Option<ExtractorConfig>,
    pub log_filter: String,
}

impl IngestConfig {
    /// Resolve from process environment. Call `dotenvy::dotenv()` first to
    /// pick up a local `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from any key lookup. Every invalid value is reported, not
    /// just the first.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut problems = Vec::new();

        let db_path = match get(ENV_DB_PATH) {
            Some(path) => PathBuf::from(path),
            None => app_data_dir()?.join("labs.db"),
        };

        let timeout_secs = match get(ENV_EXTRACTOR_TIMEOUT) {
            None => DEFAULT_EXTRACTOR_TIMEOUT_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) | Err(_) => {
                    problems.push(format!("{ENV_EXTRACTOR_TIMEOUT} must be a positive integer, got {raw:?}"));
                    DEFAULT_EXTRACTOR_TIMEOUT_SECS
                }
                Ok(secs) => secs,
            },
        };

        let extractor = match (get(ENV_EXTRACTOR_URL), get(ENV_PROCESSOR_ID)) {
            (Some(base_url), Some(processor_id)) => {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    problems.push(format!("{ENV_EXTRACTOR_URL} must be an http(s) URL, got {base_url:?}"));
                }
                Some(ExtractorConfig {
                    base_url,
                    processor_id,
                    timeout_secs,
                })
            }
            (Some(_), None) => {
                problems.push(format!("{ENV_PROCESSOR_ID} is required when {ENV_EXTRACTOR_URL} is set"));
                None
            }
            (None, Some(_)) => {
                problems.push(format!("{ENV_EXTRACTOR_URL} is required when {ENV_PROCESSOR_ID} is set"));
                None
            }
            (None, None) => None,
        };

        let log_filter = get(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        Ok(Self {
            db_path,
            extractor,
            log_filter,
        })
    }
}
