//! Configuration management for metacrawl
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API crawling configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Database introspection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// File crawling configuration
    #[serde(default)]
    pub files: FilesConfig,

    /// Interactive session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// API crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_http_user_agent")]
    pub user_agent: String,
}

/// Database introspection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Label recorded when no database kind is given
    #[serde(default = "default_database_kind")]
    pub default_kind: String,

    /// Maximum pool connections used while introspecting
    #[serde(default = "default_database_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a connection before giving up
    #[serde(default = "default_database_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

/// File crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Rows sampled from CSV and spreadsheet files
    #[serde(default = "default_files_sample_rows")]
    pub sample_rows: usize,

    /// Maximum characters kept for a sample value
    #[serde(default = "default_files_max_sample_chars")]
    pub max_sample_chars: usize,

    /// Walk directories recursively
    #[serde(default = "default_files_recursive")]
    pub recursive: bool,
}

/// Interactive session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How often finished crawls are collected (milliseconds)
    #[serde(default = "default_session_poll_interval")]
    pub poll_interval_ms: u64,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Workbook written when no path is given
    #[serde(default = "default_export_path")]
    pub default_path: String,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for metacrawl data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_http_user_agent(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_kind: default_database_kind(),
            max_connections: default_database_max_connections(),
            acquire_timeout_secs: default_database_acquire_timeout(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            sample_rows: default_files_sample_rows(),
            max_sample_chars: default_files_max_sample_chars(),
            recursive: default_files_recursive(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_session_poll_interval(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_path: default_export_path(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Get the default base directory for metacrawl (~/.metacrawl)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".metacrawl")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Build a config rooted at `base_dir` without touching the filesystem
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        let mut config = Config::default();
        config.init_paths(Some(base_dir));
        config
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(Error::Config(
                "http.timeout_secs must be positive".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }

        if self.files.sample_rows == 0 {
            return Err(Error::Config(
                "files.sample_rows must be positive".to_string(),
            ));
        }

        if self.files.max_sample_chars == 0 {
            return Err(Error::Config(
                "files.max_sample_chars must be positive".to_string(),
            ));
        }

        if self.session.poll_interval_ms == 0 {
            return Err(Error::Config(
                "session.poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
