//! Configuration management
//!
//! This module handles loading, validation, and management of the Barista configuration.
//! Configuration is stored in TOML format at ~/.barista/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, brand name, data directory
//! - **llm**: Model provider selection, call timeout and provider endpoints
//! - **tools**: Base URL and timeouts of the HTTP collaborators
//! - **memory**: History window sent to the model
//! - **outlets**: Local outlet catalogue location
//!
//! The OpenAI API key is never stored here. `llm.openai.api_key_env` names the
//! environment variable it is read from.
//!
//! # Examples
//!
//! ```no_run
//! use barista_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Brand: {}", config.core.brand);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// HTTP tool collaborators
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Conversation memory
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Outlet catalogue
    #[serde(default)]
    pub outlets: OutletsConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Brand the assistant speaks for
    #[serde(default = "default_brand")]
    pub brand: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (openai, ollama)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Upper bound for a single model call, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// OpenAI-compatible provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat-completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// Tool collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Base URL shared by the calculator, product and outlet services
    #[serde(default = "default_tools_base_url")]
    pub base_url: String,

    #[serde(default = "default_calculator_timeout")]
    pub calculator_timeout_secs: u64,

    #[serde(default = "default_product_timeout")]
    pub product_timeout_secs: u64,

    #[serde(default = "default_outlet_timeout")]
    pub outlet_timeout_secs: u64,

    /// Products requested per search when the model does not say
    #[serde(default = "default_product_top_k")]
    pub product_top_k: u64,

    /// Outlets requested per nearest search
    #[serde(default = "default_nearest_limit")]
    pub nearest_limit: u64,
}

/// Memory system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Token budget for the history window included in each model call
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,
}

/// Outlet catalogue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletsConfig {
    /// SQLite database path (supports ~ expansion)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_brand() -> String {
    "ZUS Coffee".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.barista")
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_tools_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_calculator_timeout() -> u64 {
    10
}

fn default_product_timeout() -> u64 {
    10
}

fn default_outlet_timeout() -> u64 {
    15
}

fn default_product_top_k() -> u64 {
    3
}

fn default_nearest_limit() -> u64 {
    3
}

fn default_max_history_tokens() -> usize {
    4096
}

fn default_database_path() -> PathBuf {
    PathBuf::from("~/.barista/outlets.db")
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            brand: default_brand(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            timeout_secs: default_llm_timeout(),
            temperature: 0.0,
            openai: OpenAIConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tools_base_url(),
            calculator_timeout_secs: default_calculator_timeout(),
            product_timeout_secs: default_product_timeout(),
            outlet_timeout_secs: default_outlet_timeout(),
            product_top_k: default_product_top_k(),
            nearest_limit: default_nearest_limit(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history_tokens: default_max_history_tokens(),
        }
    }
}

impl Default for OutletsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl LLMConfig {
    /// Model call timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default location (~/.barista/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    pub fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();

        // Serialize before path expansion so the file keeps the portable ~ form
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        config.validate_and_process()?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.barista/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".barista").join("config.toml"))
    }

    /// Validate and process configuration
    ///
    /// Validates enumerated fields and numeric ranges, expands ~ in paths and
    /// creates the data directory if it doesn't exist.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["openai", "ollama"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.core.brand.trim().is_empty() {
            return Err(EngineError::Config("brand must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EngineError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        let timeouts = [
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("tools.calculator_timeout_secs", self.tools.calculator_timeout_secs),
            ("tools.product_timeout_secs", self.tools.product_timeout_secs),
            ("tools.outlet_timeout_secs", self.tools.outlet_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                return Err(EngineError::Config(format!("{} must be at least 1", name)));
            }
        }

        if self.tools.product_top_k == 0 || self.tools.nearest_limit == 0 {
            return Err(EngineError::Config(
                "product_top_k and nearest_limit must be at least 1".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.outlets.database_path = expand_path(&self.outlets.database_path)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
