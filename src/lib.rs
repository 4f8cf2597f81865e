use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoryError>;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Segmentation error: {0}")]
    Segmentation(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod acquirer;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod search;
pub mod segmenter;
pub mod server;
pub mod store;
