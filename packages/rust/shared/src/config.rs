//! Application configuration for sieve.
//!
//! User config lives at `~/.sieve/sieve.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SieveError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sieve.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sieve";

// ---------------------------------------------------------------------------
// Config structs (matching sieve.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record transformation settings.
    #[serde(default)]
    pub analyser: AnalyserSection,

    /// Page fetching settings.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Machine translation settings.
    #[serde(default)]
    pub translation: TranslationSection,

    /// Where run results are written.
    #[serde(default)]
    pub output: OutputSection,
}

/// What the join stage does with a record whose domain has no aggregate entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinMiss {
    /// Drop the record (intersection semantics).
    #[default]
    Drop,
    /// Keep the record with an occurrence count of zero.
    KeepZero,
}

/// `[analyser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyserSection {
    /// Literal substring removed from every url before grouping.
    #[serde(default = "default_strip_substring")]
    pub strip_substring: String,

    /// Records whose url contains any of these substrings are dropped.
    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<String>,

    /// Keywords searched for in titles and descriptions.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Join behaviour for domains missing from the aggregate side.
    #[serde(default)]
    pub join_on_missing: JoinMiss,

    /// Remove characters outside printable ASCII from fetched text.
    #[serde(default = "default_true")]
    pub ascii_only: bool,
}

impl Default for AnalyserSection {
    fn default() -> Self {
        Self {
            strip_substring: default_strip_substring(),
            blacklist: default_blacklist(),
            keywords: Vec::new(),
            join_on_missing: JoinMiss::default(),
            ascii_only: true,
        }
    }
}

fn default_strip_substring() -> String {
    "www.".into()
}
fn default_blacklist() -> Vec<String> {
    [
        "facebook.",
        "instagram.",
        "linkedin.",
        "youtube.",
        "twitter.",
        "wikipedia.",
        "tripadvisor.",
        "amazon.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_true() -> bool {
    true
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum in-flight page requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Headers sent with every request.
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            concurrency: default_concurrency(),
            headers: default_headers(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    300
}
fn default_concurrency() -> usize {
    50
}
fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "User-Agent".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/127.0.0.0 Safari/537.36"
                .to_string(),
        ),
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
    ])
}

/// `[translation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationSection {
    /// ISO 639-1 code of the language everything is translated into.
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Maximum in-flight translation requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Base URL of the translation endpoint.
    #[serde(default = "default_service_url")]
    pub service_url: String,
}

impl Default for TranslationSection {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            concurrency: default_concurrency(),
            service_url: default_service_url(),
        }
    }
}

fn default_target_language() -> String {
    "en".into()
}
fn default_service_url() -> String {
    "https://translate.googleapis.com".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Run directory template; `{timestamp}` is substituted at run time.
    #[serde(default = "default_run_dir")]
    pub run_dir: String,

    /// `chrono` format string used for `{timestamp}`.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// File name of the enriched NDJSON output.
    #[serde(default = "default_results_file")]
    pub results_file: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            timestamp_format: default_timestamp_format(),
            results_file: default_results_file(),
        }
    }
}

fn default_run_dir() -> String {
    "runs/{timestamp}".into()
}
fn default_timestamp_format() -> String {
    "%Y-%m-%d_%H-%M-%S".into()
}
fn default_results_file() -> String {
    "analysed_links.json".into()
}

impl OutputSection {
    /// Resolve the results path for a run started at `now`.
    ///
    /// Fails if `timestamp_format` holds an unknown specifier.
    pub fn results_path(&self, now: chrono::DateTime<chrono::Local>) -> Result<PathBuf> {
        check_timestamp_format(&self.timestamp_format)?;

        let mut stamp = String::new();
        write!(stamp, "{}", now.format(&self.timestamp_format)).map_err(|_| {
            SieveError::config(format!(
                "cannot format timestamp with '{}'",
                self.timestamp_format
            ))
        })?;

        Ok(PathBuf::from(self.run_dir.replace("{timestamp}", &stamp))
            .join("analyser")
            .join(&self.results_file))
    }
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings for the pure transform stages.
#[derive(Debug, Clone)]
pub struct AnalyserConfig {
    pub strip_substring: String,
    pub blacklist: Vec<String>,
    pub keywords: Vec<String>,
    pub join_on_missing: JoinMiss,
    pub ascii_only: bool,
}

impl From<&AppConfig> for AnalyserConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            strip_substring: config.analyser.strip_substring.clone(),
            blacklist: config.analyser.blacklist.clone(),
            keywords: config.analyser.keywords.clone(),
            join_on_missing: config.analyser.join_on_missing,
            ascii_only: config.analyser.ascii_only,
        }
    }
}

/// Runtime settings for the fetch adapter.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum in-flight requests.
    pub concurrency: usize,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            concurrency: config.fetch.concurrency,
            headers: config.fetch.headers.clone(),
        }
    }
}

/// Runtime settings for the translation adapter.
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub target_language: String,
    pub concurrency: usize,
    pub service_url: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for TranslationConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            target_language: config.translation.target_language.clone(),
            concurrency: config.translation.concurrency,
            service_url: config.translation.service_url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sieve/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SieveError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sieve/sieve.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SieveError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SieveError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject values that would make a run impossible.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.fetch.concurrency == 0 {
        return Err(SieveError::config("fetch.concurrency must be at least 1"));
    }
    if config.translation.concurrency == 0 {
        return Err(SieveError::config(
            "translation.concurrency must be at least 1",
        ));
    }
    if config.translation.target_language.trim().is_empty() {
        return Err(SieveError::config("translation.target_language is empty"));
    }
    check_timestamp_format(&config.output.timestamp_format)?;
    Ok(())
}

/// Reject strftime strings chrono cannot render.
fn check_timestamp_format(format: &str) -> Result<()> {
    let invalid = StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
    if invalid {
        return Err(SieveError::config(format!(
            "output.timestamp_format '{format}' is not a valid strftime format"
        )));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SieveError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SieveError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SieveError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
