//! Configuration models for solace.
//!
//! Every tunable of a run lives here and is resolved once, at start-up, from
//! a TOML file. The resulting value is passed explicitly into the client and
//! the batch driver.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Top-level configuration for solace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Completion endpoint
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Model and sampling parameters
    pub model: ModelConfig,

    /// Persona applied to every request
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Input dataset and output log
    pub dataset: DatasetConfig,
}

/// OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// API key (can also be set via `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL, without the `/chat/completions` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds, stream included
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "DASHSCOPE_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}

fn default_timeout() -> u64 {
    180
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Model identifier plus sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model ID as understood by the endpoint
    pub id: String,

    #[serde(flatten)]
    pub sampling: SamplingConfig,
}

/// Sampling options recognized by the completion call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Maximum output length in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f64,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.6
}

fn default_top_p() -> f64 {
    0.95
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// Persona applied when building requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Appended to every record title before prompting
    #[serde(default)]
    pub title_suffix: String,

    /// Template file with `{title}` and `{description}` placeholders
    #[serde(default)]
    pub prompt_template: Option<PathBuf>,

    /// Optional system message sent ahead of the prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// JSON array of records
    pub input: PathBuf,

    /// Append-only JSONL result log
    pub output: PathBuf,

    /// First record index to process (inclusive)
    #[serde(default)]
    pub start: Option<usize>,

    /// Last record index to process (exclusive)
    #[serde(default)]
    pub end: Option<usize>,

    /// Leave records with an empty answer unpersisted
    #[serde(default)]
    pub skip_empty_answers: bool,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.endpoint.api_key {
            return Ok(expand_env_vars(key));
        }

        std::env::var(&self.endpoint.api_key_env).map_err(|_| ConfigError::MissingApiKey {
            env_var: self.endpoint.api_key_env.clone(),
        })
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.id.trim().is_empty() {
            return Err(ConfigError::Invalid("model.id must not be empty".to_string()));
        }
        let sampling = &self.model.sampling;
        if sampling.max_tokens == 0 {
            return Err(ConfigError::Invalid("model.max_tokens must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&sampling.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature {} outside [0, 2]",
                sampling.temperature
            )));
        }
        if !(sampling.top_p > 0.0 && sampling.top_p <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "model.top_p {} outside (0, 1]",
                sampling.top_p
            )));
        }
        if let (Some(start), Some(end)) = (self.dataset.start, self.dataset.end) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "dataset.start {start} is after dataset.end {end}"
                )));
            }
        }
        Ok(())
    }
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or endpoint.api_key in config")]
    MissingApiKey { env_var: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
