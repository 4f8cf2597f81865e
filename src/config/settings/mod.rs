#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::embeddings::openai::DEFAULT_EMBEDDING_DIMENSION;
use crate::segmenter::SegmenterConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Override for the directory holding downloaded books. Defaults to
    /// `<config dir>/stories`.
    #[serde(default)]
    pub books_dir: Option<PathBuf>,
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub embedding_dimension: u32,
    pub batch_size: u32,
}

impl Default for OpenAiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid host: {0} (cannot be empty)")]
    InvalidHost(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid minimum story length: {0} (must be between 50 and 5000)")]
    InvalidMinStoryChars(usize),
    #[error("Invalid maximum story length: {0} (must be between 1000 and 100000)")]
    InvalidMaxStoryChars(usize),
    #[error("Invalid chunk size: {0} (must be between 200 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Maximum story length ({0}) must be greater than minimum story length ({1})")]
    MaxStoryCharsTooSmall(usize, usize),
    #[error("Chunk size ({0}) must lie between the minimum and maximum story lengths ({1}..{2})")]
    ChunkSizeOutOfRange(usize, usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".story-search"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("story-search"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Get the base directory for the application, honoring a test or
    /// operator override.
    #[inline]
    pub fn get_base_dir(&self) -> Result<PathBuf, ConfigError> {
        self.base_dir.clone().map_or_else(Self::config_dir, Ok)
    }

    #[inline]
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the directory where downloaded books are stored.
    #[inline]
    pub fn books_dir_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.books_dir {
            return Ok(dir.clone());
        }
        Ok(self.get_base_dir()?.join("stories"))
    }

    /// Get the path for the vector database directory.
    #[inline]
    pub fn vector_store_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.get_base_dir()?.join("vectors"))
    }

    #[inline]
    pub fn load() -> Result<Self> {
        let config_path =
            Self::config_file_path().context("Failed to determine config file path")?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self
            .get_base_dir()
            .context("Failed to determine config directory")?;

        fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.validate()?;
        self.server.validate()?;
        self.validate_segmenter_config()?;
        Ok(())
    }

    fn validate_segmenter_config(&self) -> Result<(), ConfigError> {
        let config = &self.segmenter;

        if !(50..=5000).contains(&config.min_story_chars) {
            return Err(ConfigError::InvalidMinStoryChars(config.min_story_chars));
        }

        if !(1000..=100_000).contains(&config.max_story_chars) {
            return Err(ConfigError::InvalidMaxStoryChars(config.max_story_chars));
        }

        if !(200..=8192).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.max_story_chars <= config.min_story_chars {
            return Err(ConfigError::MaxStoryCharsTooSmall(
                config.max_story_chars,
                config.min_story_chars,
            ));
        }

        if config.chunk_size <= config.min_story_chars
            || config.chunk_size > config.max_story_chars
        {
            return Err(ConfigError::ChunkSizeOutOfRange(
                config.chunk_size,
                config.min_story_chars,
                config.max_story_chars,
            ));
        }

        Ok(())
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_base)
            .map_err(|_| ConfigError::InvalidUrl(self.api_base.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.api_base.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_base).map_err(|_| ConfigError::InvalidUrl(self.api_base.clone()))
    }

    pub fn set_api_base(&mut self, api_base: String) -> Result<(), ConfigError> {
        let temp_config = OpenAiConfig {
            api_base: api_base.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.api_base = api_base;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.chat_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        if host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(host));
        }
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }
}
