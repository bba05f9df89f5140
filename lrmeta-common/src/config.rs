//! Configuration loading and path resolution
//!
//! Resolution priority:
//! 1. Command-line argument (applied by each binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is never fatal: a warning is logged and defaults apply.

use crate::model::ResourceType;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_CONFIG: &str = "LRMETA_CONFIG";
pub const ENV_METADATA_DIR: &str = "LRMETA_METADATA_DIR";
pub const ENV_STATIC_DIR: &str = "LRMETA_STATIC_DIR";
pub const ENV_PORT: &str = "LRMETA_PORT";
pub const ENV_NO_CACHE: &str = "LRMETA_NO_CACHE";
pub const ENV_SLACK_WEBHOOK: &str = "LRMETA_SLACK_WEBHOOK";

/// Settings file contents, every field optional in the file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub host: String,
    pub port: u16,
    /// Root of the metadata checkout
    pub metadata_dir: PathBuf,
    /// Record tree, relative to `metadata_dir`
    pub yaml_dir: PathBuf,
    pub schema_file: PathBuf,
    pub localizations_dir: PathBuf,
    /// Defaults to `<metadata_dir>/resource-texts`
    pub descriptions_dir: Option<PathBuf>,
    /// Defaults to `<metadata_dir>/resource-text-mapping.yaml`
    pub description_mapping: Option<PathBuf>,
    /// Normalizer output directory
    pub static_dir: PathBuf,
    /// Serve straight from `static_dir` on every request
    pub no_cache: bool,
    /// Schema validation for CLI runs; renewals through the API always validate
    pub validate: bool,
    /// Renewal queue capacity
    pub max_pending: usize,
    /// Changed-file count in a push payload above which a full renewal runs
    pub github_file_limit: usize,
    /// Incoming-webhook URL, empty disables notifications
    pub slack_webhook: String,
    /// Type name to blacklisted IDs
    pub blacklist: BTreeMap<String, Vec<String>>,
    pub citation: CitationConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        let mut blacklist = BTreeMap::new();
        blacklist.insert(
            ResourceType::Lexicon.as_str().to_string(),
            vec!["blisschar".to_string(), "blissword".to_string()],
        );

        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
            metadata_dir: PathBuf::from("metadata"),
            yaml_dir: PathBuf::from("yaml"),
            schema_file: PathBuf::from("schema/metadata.json"),
            localizations_dir: PathBuf::from("localizations"),
            descriptions_dir: None,
            description_mapping: None,
            static_dir: PathBuf::from("static"),
            no_cache: false,
            validate: false,
            max_pending: 3,
            github_file_limit: 3000,
            slack_webhook: String::new(),
            blacklist,
            citation: CitationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// BibTeX citation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CitationConfig {
    pub publisher: String,
    pub resource_url: String,
    pub analysis_url: String,
    /// Always listed first in `keywords`
    pub keyword: String,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            publisher: "Språkbanken Text".to_string(),
            resource_url: "https://spraakbanken.gu.se/resurser/".to_string(),
            analysis_url: "https://spraakbanken.gu.se/analyser/".to_string(),
            keyword: "Language Technology (Computational Linguistics)".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    pub fn yaml_root(&self) -> PathBuf {
        self.metadata_dir.join(&self.yaml_dir)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.metadata_dir.join(&self.schema_file)
    }

    pub fn localizations_root(&self) -> PathBuf {
        self.metadata_dir.join(&self.localizations_dir)
    }

    pub fn descriptions_root(&self) -> PathBuf {
        match &self.descriptions_dir {
            Some(dir) => self.metadata_dir.join(dir),
            None => self.metadata_dir.join("resource-texts"),
        }
    }

    pub fn description_mapping_path(&self) -> PathBuf {
        match &self.description_mapping {
            Some(file) => self.metadata_dir.join(file),
            None => self.metadata_dir.join("resource-text-mapping.yaml"),
        }
    }

    /// Blacklisted IDs for one type
    pub fn blacklisted(&self, resource_type: ResourceType) -> &[String] {
        self.blacklist
            .get(resource_type.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Apply `LRMETA_*` environment variables on top of file settings
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var(ENV_METADATA_DIR) {
            self.metadata_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(ENV_STATIC_DIR) {
            self.static_dir = PathBuf::from(dir);
        }
        if let Ok(port) = std::env::var(ENV_PORT) {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("{} is not a valid port: {}", ENV_PORT, port)))?;
        }
        if let Ok(flag) = std::env::var(ENV_NO_CACHE) {
            self.no_cache = parse_flag(&flag)
                .ok_or_else(|| Error::Config(format!("{} must be true or false: {}", ENV_NO_CACHE, flag)))?;
        }
        if let Ok(url) = std::env::var(ENV_SLACK_WEBHOOK) {
            self.slack_webhook = url;
        }
        Ok(())
    }
}

/// Parse a boolean flag as accepted in query strings and the environment
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Locates and loads the TOML config file
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
}

impl ConfigLoader {
    /// `explicit` is the `--config` argument, if any
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Find the config file to use
    ///
    /// An explicit path (argument or `LRMETA_CONFIG`) is returned even if it
    /// does not exist, so that `load` can report it. Otherwise the first
    /// existing of `~/.config/lrmeta/config.toml` and `/etc/lrmeta/config.toml`.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            return Some(PathBuf::from(path));
        }

        let user_config = dirs::config_dir().map(|d| d.join("lrmeta").join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }
        let system_config = PathBuf::from("/etc/lrmeta/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
        None
    }

    /// Load settings: file (if any) plus environment overrides
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match self.locate() {
            Some(path) => load_toml_file(&path)?,
            None => {
                warn!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }
}

/// Read one config file; a missing file yields defaults with a warning
pub fn load_toml_file(path: &Path) -> Result<TomlConfig> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config = TomlConfig::from_toml_str(&content)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file {} not found, using compiled defaults", path.display());
            Ok(TomlConfig::default())
        }
        Err(e) => Err(Error::Config(format!(
            "Read config {} failed: {}",
            path.display(),
            e
        ))),
    }
}
