use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration for the Fournil assistant.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// API key for the Groq chat-completion endpoint.
    pub groq_api_key: String,
    /// Chat model identifier passed to Groq.
    pub groq_model: String,
    /// Optional override for the Groq-compatible base URL.
    pub groq_base_url: Option<String>,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document storage.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional base URL of a local Ollama runtime.
    pub ollama_url: Option<String>,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters of overlap carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Maximum cosine distance for a retrieved chunk to count as relevant.
    pub relevance_max_distance: f32,
    /// Number of chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Directory scanned for `.txt` documents at startup.
    pub documents_dir: String,
    /// Optional API key enabling the Tavily price-lookup tool.
    pub tavily_api_key: Option<String>,
    /// Optional override for the Tavily base URL.
    pub tavily_base_url: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the retrieval pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime reached over HTTP.
    Ollama,
    /// Deterministic byte-folding encoder, no external service.
    Hash,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            groq_api_key: load_env("GROQ_API_KEY")?,
            groq_model: load_env_optional("GROQ_MODEL")
                .unwrap_or_else(|| "llama-3.1-8b-instant".to_string()),
            groq_base_url: load_env_optional("GROQ_BASE_URL"),
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            chunk_size: parse_or_default("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_or_default("CHUNK_OVERLAP", 200)?,
            relevance_max_distance: parse_or_default("RELEVANCE_MAX_DISTANCE", 0.4)?,
            retrieval_top_k: parse_or_default("RETRIEVAL_TOP_K", 3)?,
            documents_dir: load_env_optional("DOCUMENTS_DIR").unwrap_or_else(|| "data".to_string()),
            tavily_api_key: load_env_optional("TAVILY_API_KEY"),
            tavily_base_url: load_env_optional("TAVILY_BASE_URL"),
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

fn parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
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
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        model = %config.groq_model,
        embedding_provider = ?config.embedding_provider,
        documents_dir = %config.documents_dir,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
