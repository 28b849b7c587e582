use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "documents";

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const FALLBACK_CHAT_MODEL: &str = "openai/gpt-3.5-turbo";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("docchat").join("config.toml"))
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.apply_env();
            return Ok(config);
        }
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// API keys and model overrides come from the environment, never from the
    /// config file on disk.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if self.embedding.api_key.is_none() {
                self.embedding.api_key = Some(key.clone());
            }
            if self.chat.api_key.is_none() {
                self.chat.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("OPENROUTER_MODEL")
            && !model.trim().is_empty()
        {
            self.chat.model = model;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimensionality produced by the model. Fixed by configuration;
    /// mixing dimensionalities within one collection is undefined behavior.
    #[serde(default = "default_dimension")]
    pub dimension: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u64 {
    1536
}

fn default_timeout() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_fallback_model() -> String {
    FALLBACK_CHAT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_chat_model(),
            fallback_model: default_fallback_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ChatConfig {
    /// Resolve the chat model, self-healing the common misconfiguration of
    /// pointing the chat model at an embedding-only model identifier.
    ///
    /// This is a diagnostic notice, not an error: the system silently
    /// substitutes the default chat model and keeps serving.
    pub fn resolved_model(&self) -> String {
        if self.model.contains("embedding") {
            tracing::warn!(
                configured = %self.model,
                substituted = DEFAULT_CHAT_MODEL,
                "chat model is an embedding model identifier; using default chat model"
            );
            DEFAULT_CHAT_MODEL.to_string()
        } else {
            self.model.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Characters of duplicated content between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_top_k() -> u32 {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.api_base, DEFAULT_API_BASE);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn test_chat_config_default_models() {
        let config = ChatConfig::default();
        assert_eq!(config.model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.fallback_model, FALLBACK_CHAT_MODEL);
        assert_eq!(config.resolved_model(), DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_embedding_model_rejected_as_chat_model() {
        let config = ChatConfig {
            model: "openai/text-embedding-3-small".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolved_model(), DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[chat]\nmodel = \"openai/gpt-4o\"\n").unwrap();
        assert_eq!(config.chat.model, "openai/gpt-4o");
        assert_eq!(config.chat.fallback_model, FALLBACK_CHAT_MODEL);
        assert_eq!(config.embedding.dimension, 1536);
    }
}
