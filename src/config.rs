use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::analysis::BatchLimits;
use crate::backend::{AzureOpenAiSettings, ProcessCommand, SupervisorPolicy};

const DEFAULT_API_VERSION: &str = "2024-02-01";
const DEFAULT_BACKEND_COMMAND: &str = "npx";
const DEFAULT_BACKEND_ARGS: &str = "@azure/mcp@latest server start";
const DEFAULT_STORAGE_ROOT: &str = "uploads";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docquery server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Azure OpenAI resource answering analysis requests.
    pub openai_endpoint: String,
    /// API key sent in the `api-key` header.
    pub openai_api_key: String,
    /// API version query parameter appended to every completion call.
    pub openai_api_version: String,
    /// Deployment (model) name used for chat completions.
    pub openai_deployment: String,
    /// Executable launched as the long-running backend process.
    pub backend_command: String,
    /// Arguments passed to the backend executable.
    pub backend_args: Vec<String>,
    /// Time the backend process is given to start before it is considered connected.
    pub backend_settle: Duration,
    /// Fixed delay between reconnect attempts.
    pub backend_reconnect_delay: Duration,
    /// Number of reconnect attempts made before settling into `Disconnected`.
    pub backend_max_reconnect_attempts: u32,
    /// Upper bound on a single completion call.
    pub backend_request_timeout: Duration,
    /// Per-file character budget applied when batching files into one request.
    pub batch_max_content_chars: usize,
    /// Directory the local artifact store reads from.
    pub storage_root: PathBuf,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            openai_endpoint: load_env("AZURE_OPENAI_ENDPOINT")?,
            openai_api_key: load_env("AZURE_OPENAI_API_KEY")?,
            openai_api_version: load_env_optional("AZURE_OPENAI_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            openai_deployment: load_env("AZURE_OPENAI_DEPLOYMENT_NAME")?,
            backend_command: load_env_optional("BACKEND_COMMAND")
                .unwrap_or_else(|| DEFAULT_BACKEND_COMMAND.to_string()),
            backend_args: split_args(
                &load_env_optional("BACKEND_ARGS")
                    .unwrap_or_else(|| DEFAULT_BACKEND_ARGS.to_string()),
            ),
            backend_settle: Duration::from_millis(parse_or("BACKEND_SETTLE_MS", 3_000)?),
            backend_reconnect_delay: Duration::from_millis(parse_or(
                "BACKEND_RECONNECT_DELAY_MS",
                5_000,
            )?),
            backend_max_reconnect_attempts: parse_or("BACKEND_MAX_RECONNECT_ATTEMPTS", 3)?,
            backend_request_timeout: Duration::from_secs(parse_or(
                "BACKEND_REQUEST_TIMEOUT_SECS",
                60,
            )?),
            batch_max_content_chars: parse_or("BATCH_MAX_CONTENT_CHARS", 8_000)?,
            storage_root: load_env_optional("STORAGE_ROOT")
                .unwrap_or_else(|| DEFAULT_STORAGE_ROOT.to_string())
                .into(),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Connection settings for the completion API client.
    pub fn openai_settings(&self) -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint: self.openai_endpoint.clone(),
            api_key: self.openai_api_key.clone(),
            api_version: self.openai_api_version.clone(),
            deployment: self.openai_deployment.clone(),
        }
    }

    /// Command line used to spawn the backend process.
    pub fn process_command(&self) -> ProcessCommand {
        ProcessCommand {
            program: self.backend_command.clone(),
            args: self.backend_args.clone(),
        }
    }

    /// Lifecycle policy for the backend supervisor.
    pub fn supervisor_policy(&self) -> SupervisorPolicy {
        SupervisorPolicy {
            settle_interval: self.backend_settle,
            reconnect_delay: self.backend_reconnect_delay,
            max_reconnect_attempts: self.backend_max_reconnect_attempts,
        }
    }

    /// Budget applied to multi-file requests.
    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_content_chars: self.batch_max_content_chars,
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        endpoint = %config.openai_endpoint,
        deployment = %config.openai_deployment,
        backend_command = %config.backend_command,
        storage_root = %config.storage_root.display(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
