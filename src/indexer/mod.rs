// Indexer module
// Segments downloaded books into stories and stores their embeddings


use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::OpenAiClient;
use crate::segmenter::{self, StoryUnit};
use crate::store::{StoryMetadata, StoryRecord, VectorStore};

/// Statistics about an indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub books_processed: usize,
    pub books_failed: usize,
    pub stories_stored: usize,
    pub duration: Duration,
}

/// Indexer that turns downloaded books into searchable story embeddings
pub struct StoryIndexer {
    config: Config,
    vector_store: VectorStore,
    openai_client: OpenAiClient,
}

impl StoryIndexer {
    /// Create a new indexer using the API key from the environment
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let openai_client =
            OpenAiClient::new(&config).context("Failed to initialize OpenAI client")?;

        Self::with_client(config, openai_client).await
    }

    /// Create a new indexer with an already constructed API client
    #[inline]
    pub async fn with_client(config: Config, openai_client: OpenAiClient) -> Result<Self> {
        let vector_store = VectorStore::new(&config)
            .await
            .context("Failed to initialize LanceDB vector store")?;

        Ok(Self {
            config,
            vector_store,
            openai_client,
        })
    }

    /// Index every downloaded book found in the books directory.
    ///
    /// Each book is segmented into stories, embedded in batches, and stored
    /// in the vector store. Stories from a previous run of the same book are
    /// replaced, so re-indexing never duplicates records. A book that fails
    /// is logged and counted but does not abort the run.
    #[inline]
    pub async fn index_books(&mut self) -> Result<IndexStats> {
        let books_dir = self
            .config
            .books_dir_path()
            .context("Failed to determine books directory")?;
        let book_files = find_book_files(&books_dir)?;

        if book_files.is_empty() {
            bail!(
                "No books found in {}. Run `story-search collect` first.",
                books_dir.display()
            );
        }

        info!(
            "Indexing {} books from {}",
            book_files.len(),
            books_dir.display()
        );

        let start_time = Instant::now();
        let mut stats = IndexStats::default();

        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };
        bar.set_position(0);
        bar.set_length(book_files.len() as u64);

        for path in &book_files {
            let source = source_name(path);
            bar.set_message(source.clone());

            match self.index_one_book(path, &source).await {
                Ok(stored) => {
                    stats.books_processed += 1;
                    stats.stories_stored += stored;
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", source, e);
                    stats.books_failed += 1;
                }
            }

            bar.inc(1);
        }

        stats.duration = start_time.elapsed();
        bar.finish_and_clear();

        if stats.books_processed == 0 && stats.books_failed > 0 {
            bail!("All {} books failed to index", stats.books_failed);
        }

        Ok(stats)
    }

    /// Segment, embed, and store a single book. Returns the number of
    /// stories stored.
    async fn index_one_book(&mut self, path: &Path, source: &str) -> Result<usize> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read book file: {}", path.display()))?;

        let units = segmenter::segment_book(source, &content, &self.config.segmenter)?;

        if units.is_empty() {
            debug!("No stories found in {}", source);
            // Clear any stale records left over from a previous run
            self.vector_store.delete_source(source).await?;
            return Ok(0);
        }

        debug!("Segmented {} into {} stories", source, units.len());

        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let embeddings = self
            .openai_client
            .embed_batch(&texts)
            .with_context(|| format!("Failed to embed stories from {}", source))?;

        let created_at = Utc::now().to_rfc3339();
        let records: Vec<StoryRecord> = units
            .iter()
            .zip(embeddings)
            .map(|(unit, vector)| build_record(unit, vector, &created_at))
            .collect();

        // Replace records from a previous run before inserting the new ones
        self.vector_store
            .delete_source(source)
            .await
            .with_context(|| format!("Failed to clear old stories for {}", source))?;

        let stored = records.len();
        self.vector_store
            .store_stories_batch(records)
            .await
            .with_context(|| format!("Failed to store stories from {}", source))?;

        Ok(stored)
    }

    /// Total number of stories currently stored
    #[inline]
    pub async fn story_count(&self) -> Result<u64> {
        Ok(self.vector_store.count_stories().await?)
    }
}

/// Build the stored record for one segmented story
fn build_record(unit: &StoryUnit, vector: Vec<f32>, created_at: &str) -> StoryRecord {
    let story_id = format!("{}_{}", unit.source, unit.index);

    StoryRecord {
        id: story_id.clone(),
        vector,
        metadata: StoryMetadata {
            story_id,
            source: unit.source.clone(),
            title: unit.display_title(),
            content: unit.text.clone(),
            char_count: unit.text.chars().count() as u32,
            story_index: unit.index,
            kind: unit.kind.as_str().to_string(),
            created_at: created_at.to_string(),
        },
    }
}

/// List the plain-text book files in the books directory, in a stable order
fn find_book_files(books_dir: &Path) -> Result<Vec<PathBuf>> {
    if !books_dir.exists() {
        bail!(
            "Books directory {} does not exist. Run `story-search collect` first.",
            books_dir.display()
        );
    }

    let mut files: Vec<PathBuf> = fs::read_dir(books_dir)
        .with_context(|| format!("Failed to read books directory: {}", books_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .collect();

    files.sort();
    Ok(files)
}

/// Derive the source collection name from a book file path
fn source_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |stem| {
            stem.to_string_lossy().into_owned()
        })
}
