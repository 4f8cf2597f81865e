// Vector store module
// Handles story persistence and similarity search over embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Story record stored in the vector database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRecord {
    /// Unique identifier for this row
    pub id: String,
    /// The vector embedding of the story text
    pub vector: Vec<f32>,
    /// Metadata about the story this embedding represents
    pub metadata: StoryMetadata,
}

/// Metadata for a story stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryMetadata {
    /// Stable identifier of the story within its source
    pub story_id: String,
    /// Source collection the story was segmented from
    pub source: String,
    /// Display title of the story
    pub title: String,
    /// The full text of the story
    pub content: String,
    /// Length of the story text in characters
    pub char_count: u32,
    /// Position of the story within its source collection
    pub story_index: u32,
    /// Which kind of unit the segmenter produced (chapter, story, chunk, ...)
    pub kind: String,
    /// Timestamp when this record was created
    pub created_at: String,
}
