// Search module
// Embeds a query, finds the closest stories, and explains the matches


use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::StoryError;
use crate::config::Config;
use crate::embeddings::OpenAiClient;
use crate::store::{SearchResult, VectorStore};

/// Number of stories returned for a query
pub const RESULT_LIMIT: usize = 3;

/// Longest story excerpt included in the explanation prompt, in characters
const PROMPT_EXCERPT_CHARS: usize = 2000;

/// Explanation used when the store has nothing to offer
const NO_MATCHES_EXPLANATION: &str = "No matching stories were found.";

/// Errors surfaced by the search engine
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("failed to embed query: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("vector store error: {0}")]
    Store(#[from] StoryError),

    #[error("failed to generate explanation: {0}")]
    Explanation(#[source] anyhow::Error),
}

/// A single matched story in a search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryHit {
    pub title: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// Response to a story search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<StoryHit>,
    pub explanation: String,
}

/// Search engine combining the vector store with the language model
pub struct SearchEngine {
    vector_store: VectorStore,
    openai_client: OpenAiClient,
}

impl SearchEngine {
    /// Create a search engine using the API key from the environment
    #[inline]
    pub async fn new(config: Config) -> Result<Self, SearchError> {
        let openai_client = OpenAiClient::new(&config)
            .context("Failed to initialize OpenAI client")
            .map_err(SearchError::Embedding)?;

        Self::with_client(config, openai_client).await
    }

    /// Create a search engine with an already constructed API client
    #[inline]
    pub async fn with_client(
        config: Config,
        openai_client: OpenAiClient,
    ) -> Result<Self, SearchError> {
        let vector_store = VectorStore::new(&config).await?;

        Ok(Self {
            vector_store,
            openai_client,
        })
    }

    /// Find the stories closest to a free-text description and explain
    /// what they have in common with it.
    ///
    /// The query is validated before any network request is made. When the
    /// store is empty the response carries no results and the language
    /// model is not consulted.
    #[inline]
    pub async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        debug!("Searching stories for query: {}", query);

        let client = self.openai_client.clone();
        let query_text = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || client.embed_query(&query_text))
            .await
            .map_err(|e| SearchError::Embedding(anyhow::anyhow!("embedding task failed: {}", e)))?
            .map_err(SearchError::Embedding)?;

        let results = self
            .vector_store
            .search_similar(&query_vector, RESULT_LIMIT)
            .await?;

        if results.is_empty() {
            info!("No stories matched the query");
            return Ok(SearchResponse {
                results: Vec::new(),
                explanation: NO_MATCHES_EXPLANATION.to_string(),
            });
        }

        let prompt = build_explanation_prompt(query, &results);
        let client = self.openai_client.clone();
        let explanation = tokio::task::spawn_blocking(move || client.chat_completion(&prompt))
            .await
            .map_err(|e| {
                SearchError::Explanation(anyhow::anyhow!("explanation task failed: {}", e))
            })?
            .map_err(SearchError::Explanation)?;

        let hits = results
            .into_iter()
            .map(|result| StoryHit {
                title: result.story_metadata.title,
                source: result.story_metadata.source,
                text: result.story_metadata.content,
                score: result.similarity_score,
            })
            .collect::<Vec<_>>();

        info!("Returning {} matching stories", hits.len());
        Ok(SearchResponse {
            results: hits,
            explanation,
        })
    }

    /// Total number of stories available for searching
    #[inline]
    pub async fn story_count(&self) -> Result<u64, SearchError> {
        Ok(self.vector_store.count_stories().await?)
    }
}

/// Compose the prompt asking the chat model why the matches fit the query
fn build_explanation_prompt(query: &str, results: &[SearchResult]) -> String {
    let mut prompt = format!(
        "A reader is looking for stories like this: \"{}\"\n\nThese are the closest matches:\n\n",
        query
    );

    for (i, result) in results.iter().enumerate() {
        let meta = &result.story_metadata;
        prompt.push_str(&format!(
            "{}. \"{}\" from {}:\n{}\n\n",
            i + 1,
            meta.title,
            meta.source,
            excerpt(&meta.content, PROMPT_EXCERPT_CHARS)
        ));
    }

    prompt.push_str(
        "In a short paragraph, explain what these stories have in common with what the reader asked for.",
    );
    prompt
}

/// Take the first `max_chars` characters of a text, on a character boundary
fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text.get(..idx).unwrap_or(text),
        None => text,
    }
}
