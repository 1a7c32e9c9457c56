use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Default base URL for the embedding and chat-completion APIs.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Default chat model used to synthesize answers.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4";

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

/// Runtime configuration for the DocuHub server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the secret store that holds service credentials.
    pub secret_store_url: String,
    /// Optional bearer token presented to the secret store.
    pub secret_store_token: Option<String>,
    /// Name of the secret holding the embedding/chat API key.
    pub embedding_secret_name: String,
    /// Name of the secret holding the vector index credentials.
    pub index_secret_name: String,
    /// Storage bucket that uploaded documents land in.
    pub bucket_name: String,
    /// Name of the vector index collection used for document storage.
    pub index_name: String,
    /// Base URL of the document-analysis service.
    pub analysis_url: String,
    /// Optional override for the embedding API base URL.
    pub embedding_url: Option<String>,
    /// Optional override for the chat-completion API base URL.
    pub chat_url: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional override for the chat model used to answer queries.
    pub chat_model: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_store_url: load_env("SECRET_STORE_URL")?,
            secret_store_token: load_env_optional("SECRET_STORE_TOKEN"),
            embedding_secret_name: load_env("EMBEDDING_SECRET_NAME")?,
            index_secret_name: load_env("VECTOR_INDEX_SECRET_NAME")?,
            bucket_name: load_env("BUCKET_NAME")?,
            index_name: load_env("VECTOR_INDEX_NAME")?,
            analysis_url: load_env("ANALYSIS_URL")?,
            embedding_url: load_env_optional("EMBEDDING_URL"),
            chat_url: load_env_optional("CHAT_URL"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?.parse().map_err(|_| {
                ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string())
            })?,
            chat_model: load_env_optional("CHAT_MODEL"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
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
        secret_store = %config.secret_store_url,
        analysis = %config.analysis_url,
        bucket = %config.bucket_name,
        index = %config.index_name,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
