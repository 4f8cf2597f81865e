// Embeddings module
// This module handles the OpenAI API integration for embeddings and chat

pub mod openai;

pub use openai::{DEFAULT_EMBEDDING_DIMENSION, OpenAiClient};
