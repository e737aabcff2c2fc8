//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. The file itself is located
//! following this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LQA_CONFIG`)
//! 3. User config directory (`~/.config/lqa/config.toml` on Linux)
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "LQA_CONFIG";

/// Environment variable naming the root data folder
pub const ROOT_FOLDER_ENV_VAR: &str = "LQA_ROOT_FOLDER";

/// Default bound on persisted, user-visible error messages (characters)
pub const DEFAULT_ERROR_MESSAGE_LIMIT: usize = 200;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for audit data (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Path to SQLite database file (relative to root folder or absolute)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Audit runtime settings
    #[serde(default)]
    pub audit: AuditSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Settings consumed by the audit state machine and prompt builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Maximum characters of an error message persisted on a failed audit
    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,

    /// Maximum glossary terms included in a prompt
    #[serde(default = "default_max_glossary_terms")]
    pub max_glossary_terms: usize,

    /// Maximum characters of scraped text included in a prompt
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Token pricing used to estimate model cost
    #[serde(default)]
    pub pricing: ModelPricing,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            error_message_limit: default_error_message_limit(),
            max_glossary_terms: default_max_glossary_terms(),
            max_content_chars: default_max_content_chars(),
            pricing: ModelPricing::default(),
        }
    }
}

/// Per-million-token model pricing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default = "default_input_price")]
    pub input_per_million_usd: f64,
    #[serde(default = "default_output_price")]
    pub output_per_million_usd: f64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_per_million_usd: default_input_price(),
            output_per_million_usd: default_output_price(),
        }
    }
}

impl ModelPricing {
    /// Estimated cost in USD, rounded to 4 decimal places
    pub fn cost_usd(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input = input_tokens as f64 / 1_000_000.0 * self.input_per_million_usd;
        let output = output_tokens as f64 / 1_000_000.0 * self.output_per_million_usd;
        ((input + output) * 10_000.0).round() / 10_000.0
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_error_message_limit() -> usize {
    DEFAULT_ERROR_MESSAGE_LIMIT
}

fn default_max_glossary_terms() -> usize {
    50
}

fn default_max_content_chars() -> usize {
    15_000
}

fn default_input_price() -> f64 {
    3.0
}

fn default_output_price() -> f64 {
    15.0
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Resolve and load configuration
    ///
    /// An explicitly named file (CLI or environment) must exist; the user
    /// config directory is optional and falls back to built-in defaults.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_arg {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        match user_config_file() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Database path resolved against the root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root_folder.join(path),
            None => root_folder.join("lqa.db"),
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config `root_folder`
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Per-user config file location
fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lqa").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("lqa"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lqa"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("lqa"))
            .unwrap_or_else(|| PathBuf::from("./lqa_data"))
    }
}
