use crate::filter::{DEFAULT_NODE_CAP, MAX_NODE_CAP, MIN_NODE_CAP};
use crate::layout::LayoutConfig;
use crate::session::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;
use wikigraph_stream::DEFAULT_API_URL;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/wikigraph/";
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/wikigraph/config.json";
pub const DEFAULT_WIKI_BASE_URL: &str = "https://en.wikipedia.org/wiki/";

/// Environment override for the crawler address.
pub const API_URL_ENV: &str = "WIKIGRAPH_API_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// User settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_url: String,
    pub wiki_base_url: String,
    pub retry_delay_ms: u64,
    /// 0 retries a busy crawler forever.
    pub max_conflict_retries: u32,
    /// 0 disables the stream watchdog.
    pub idle_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub node_cap: usize,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            wiki_base_url: DEFAULT_WIKI_BASE_URL.to_string(),
            retry_delay_ms: 2000,
            max_conflict_retries: 20,
            idle_timeout_secs: 60,
            settle_delay_ms: 300,
            node_cap: DEFAULT_NODE_CAP,
            request_timeout_secs: 10,
        }
    }
}

/// `~` expanded to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

pub fn config_dir() -> PathBuf {
    expand_path(DEFAULT_CONFIG_DIR)
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load `path` if it exists, defaults otherwise. A file that exists but
    /// cannot be parsed is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Layer the env var and then an explicit flag over the file value.
    pub fn resolve_api_url(mut self, env: Option<String>, flag: Option<&str>) -> Result<Self> {
        if let Some(url) = flag.map(str::to_string).or(env) {
            self = self.with_api_url(url)?;
        }
        Ok(self)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Result<Self> {
        self.api_url = api_url.into();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url)
            .map_err(|e| ConfigError::Invalid(format!("api_url '{}': {}", self.api_url, e)))?;
        Url::parse(&self.wiki_base_url).map_err(|e| {
            ConfigError::Invalid(format!("wiki_base_url '{}': {}", self.wiki_base_url, e))
        })?;
        if !(MIN_NODE_CAP..=MAX_NODE_CAP).contains(&self.node_cap) {
            return Err(ConfigError::Invalid(format!(
                "node_cap must be between {} and {}, got {}",
                MIN_NODE_CAP, MAX_NODE_CAP, self.node_cap
            )));
        }
        Ok(())
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_conflict_retries: (self.max_conflict_retries > 0)
                .then_some(self.max_conflict_retries),
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
            ..ControllerConfig::default()
        }
    }

    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            ..LayoutConfig::default()
        }
    }

    /// Article URL for a page id.
    pub fn page_url(&self, id: &str) -> String {
        format!("{}{}", self.wiki_base_url, id)
    }
}
