#[cfg(test)]
mod tests;

use super::{StoryMetadata, StoryRecord};
use crate::{StoryError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
    configured_dimension: usize,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub story_metadata: StoryMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Create a new VectorStore instance
    ///
    /// # Arguments
    /// * `config` - Application configuration containing database paths
    ///
    /// # Returns
    /// * `Result<Self, StoryError>` - New VectorStore instance or error
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, StoryError> {
        let db_path = config
            .vector_store_path()
            .map_err(|e| StoryError::Config(format!("Failed to get vector store path: {}", e)))?;
        debug!("Initializing LanceDB at path: {:?}", db_path);

        // Ensure the directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoryError::Store(format!("Failed to create vector store directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());

        // Attempt to connect with corruption recovery
        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                // Check if this looks like a corruption error
                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Store corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(&db_path)?;

                    // Retry connection after recovery
                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        StoryError::Store(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(StoryError::Store(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let table_name = "stories".to_string();

        let mut store = Self {
            connection,
            table_name,
            vector_dimension: None,
            configured_dimension: config.openai.embedding_dimension as usize,
        };

        // Initialize the table if it doesn't exist with corruption handling
        store.initialize_table_with_recovery().await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    /// Initialize the stories table with the correct schema
    async fn initialize_table(&mut self) -> Result<(), StoryError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Stories table already exists, detecting vector dimension");
            // Try to detect the vector dimension from existing table
            match self.detect_existing_vector_dimension().await {
                Ok(dim) => {
                    self.vector_dimension = Some(dim);
                    info!("Detected existing vector dimension: {}", dim);
                }
                Err(e) => {
                    warn!(
                        "Could not detect vector dimension from existing table: {}",
                        e
                    );
                    self.vector_dimension = Some(self.configured_dimension);
                }
            }
            return Ok(());
        }

        info!(
            "Creating stories table with the configured {} dimensions (recreated automatically if the first insert differs)",
            self.configured_dimension
        );

        let schema = self.create_schema(self.configured_dimension);

        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to create table: {}", e)))?;

        self.vector_dimension = Some(self.configured_dimension);
        info!(
            "Stories table created successfully with {} dimensions",
            self.configured_dimension
        );
        Ok(())
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, StoryError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to open existing table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to get table schema: {}", e)))?;

        // Find the vector column and extract its dimension
        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(StoryError::Store(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(&self, vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("story_id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("char_count", DataType::UInt32, false),
            Field::new("story_index", DataType::UInt32, false),
            Field::new("kind", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Store a batch of story records
    ///
    /// # Arguments
    /// * `records` - Vector of story records to store
    ///
    /// # Returns
    /// * `Result<(), StoryError>` - Success or error
    #[inline]
    pub async fn store_stories_batch(
        &mut self,
        records: Vec<StoryRecord>,
    ) -> Result<(), StoryError> {
        if records.is_empty() {
            debug!("No stories to store");
            return Ok(());
        }

        debug!("Storing batch of {} stories", records.len());

        // Auto-detect vector dimension from first record and recreate table if needed
        let vector_dim = records[0].vector.len();
        if self.vector_dimension != Some(vector_dim) {
            info!(
                "Vector dimension changed from {:?} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.recreate_table_with_dimension(vector_dim).await?;
            self.vector_dimension = Some(vector_dim);
        }

        let record_batch = self.create_record_batch(&records)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to open table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to insert stories: {}", e)))?;

        info!("Successfully stored {} stories", records.len());
        Ok(())
    }

    /// Recreate table with new vector dimension
    async fn recreate_table_with_dimension(&self, vector_dim: usize) -> Result<(), StoryError> {
        info!("Recreating table with vector dimension: {}", vector_dim);

        // Drop existing table
        self.drop_table_if_exists().await?;

        // Create new table with correct schema
        let schema = self.create_schema(vector_dim);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| {
                StoryError::Store(format!("Failed to create table with new dimensions: {}", e))
            })?;

        info!(
            "Table recreated successfully with {} dimensions",
            vector_dim
        );
        Ok(())
    }

    /// Create a RecordBatch from story records
    fn create_record_batch(&self, records: &[StoryRecord]) -> Result<RecordBatch, StoryError> {
        let len = records.len();
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| StoryError::Store("Vector dimension not set".to_string()))?;

        let mut ids = Vec::with_capacity(len);
        let mut vectors = Vec::with_capacity(len);
        let mut story_ids = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut char_counts = Vec::with_capacity(len);
        let mut story_indices = Vec::with_capacity(len);
        let mut kinds = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            vectors.push(record.vector.clone());
            story_ids.push(record.metadata.story_id.as_str());
            sources.push(record.metadata.source.as_str());
            titles.push(record.metadata.title.as_str());
            contents.push(record.metadata.content.as_str());
            char_counts.push(record.metadata.char_count);
            story_indices.push(record.metadata.story_index);
            kinds.push(record.metadata.kind.as_str());
            created_ats.push(record.metadata.created_at.as_str());
        }

        let schema = self.create_schema(vector_dim);

        // Create vector array using FixedSizeListArray
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for vector in &vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    StoryError::Store(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(story_ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(char_counts)),
            Arc::new(UInt32Array::from(story_indices)),
            Arc::new(StringArray::from(kinds)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| StoryError::Store(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the most similar stories using cosine similarity
    ///
    /// # Arguments
    /// * `query_vector` - The query vector to search for
    /// * `limit` - Maximum number of results to return
    ///
    /// # Returns
    /// * `Result<Vec<SearchResult>, StoryError>` - Search results or error
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, StoryError> {
        debug!("Searching for similar stories with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to open table: {}", e)))?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| StoryError::Store(format!("Failed to create vector search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .column("vector")
            .limit(limit);

        let results = query
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to execute search: {}", e)))?;

        self.parse_search_results_stream(results).await
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, StoryError> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to read result stream: {}", e)))?
        {
            let parsed_batch = self.parse_search_batch(&batch_result)?;
            search_results.extend(parsed_batch);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(&self, batch: &RecordBatch) -> Result<Vec<SearchResult>, StoryError> {
        let mut search_results = Vec::new();
        let num_rows = batch.num_rows();

        // Extract columns
        let story_ids = batch
            .column_by_name("story_id")
            .ok_or_else(|| StoryError::Store("Missing story_id column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoryError::Store("Invalid story_id column type".to_string()))?;

        let sources = batch
            .column_by_name("source")
            .ok_or_else(|| StoryError::Store("Missing source column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoryError::Store("Invalid source column type".to_string()))?;

        let titles = batch
            .column_by_name("title")
            .ok_or_else(|| StoryError::Store("Missing title column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoryError::Store("Invalid title column type".to_string()))?;

        let contents = batch
            .column_by_name("content")
            .ok_or_else(|| StoryError::Store("Missing content column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoryError::Store("Invalid content column type".to_string()))?;

        let char_counts = batch
            .column_by_name("char_count")
            .ok_or_else(|| StoryError::Store("Missing char_count column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| StoryError::Store("Invalid char_count column type".to_string()))?;

        let story_indices = batch
            .column_by_name("story_index")
            .ok_or_else(|| StoryError::Store("Missing story_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| StoryError::Store("Invalid story_index column type".to_string()))?;

        let kinds = batch
            .column_by_name("kind")
            .ok_or_else(|| StoryError::Store("Missing kind column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoryError::Store("Invalid kind column type".to_string()))?;

        let created_ats = batch
            .column_by_name("created_at")
            .ok_or_else(|| StoryError::Store("Missing created_at column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoryError::Store("Invalid created_at column type".to_string()))?;

        // Extract distance scores if available
        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        for row in 0..num_rows {
            let story_metadata = StoryMetadata {
                story_id: story_ids.value(row).to_string(),
                source: sources.value(row).to_string(),
                title: titles.value(row).to_string(),
                content: contents.value(row).to_string(),
                char_count: char_counts.value(row),
                story_index: story_indices.value(row),
                kind: kinds.value(row).to_string(),
                created_at: created_ats.value(row).to_string(),
            };

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            // Convert cosine distance to similarity score (higher is better)
            let similarity_score = 1.0 - distance;

            search_results.push(SearchResult {
                story_metadata,
                similarity_score,
                distance,
            });
        }

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    /// Delete all stories that came from a specific source collection
    ///
    /// # Arguments
    /// * `source` - Source collection to delete stories for
    ///
    /// # Returns
    /// * `Result<(), StoryError>` - Success or error
    #[inline]
    pub async fn delete_source(&mut self, source: &str) -> Result<(), StoryError> {
        debug!("Deleting stories for source: {}", source);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to open table: {}", e)))?;

        let predicate = format!("source = '{}'", source);
        table
            .delete(&predicate)
            .await
            .map_err(|e| StoryError::Store(format!("Failed to delete source stories: {}", e)))?;

        info!("Deleted stories for source: {}", source);
        Ok(())
    }

    /// Get the total number of stories stored
    ///
    /// # Returns
    /// * `Result<u64, StoryError>` - Total count or error
    #[inline]
    pub async fn count_stories(&self) -> Result<u64, StoryError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| StoryError::Store(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| StoryError::Store(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Attempt to recover from database corruption
    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), StoryError> {
        warn!("Attempting store corruption recovery at {:?}", db_path);

        // Create backup of corrupted database if it exists
        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted store: {}", e);
            } else {
                info!("Corrupted store backed up to {:?}", backup_path);
            }
        }

        // Remove any remaining corrupt files
        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                StoryError::Store(format!("Failed to remove corrupted store: {}", e))
            })?;
        }

        info!("Store corruption recovery completed");
        Ok(())
    }

    /// Initialize table with corruption recovery support
    async fn initialize_table_with_recovery(&mut self) -> Result<(), StoryError> {
        match self.initialize_table().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("schema")
                {
                    warn!("Table corruption detected during initialization: {}", e);

                    // Try to drop and recreate the table
                    if let Err(drop_err) = self.drop_table_if_exists().await {
                        warn!("Failed to drop corrupted table: {}", drop_err);
                    }

                    // Retry table creation
                    self.initialize_table().await.map_err(|e| {
                        StoryError::Store(format!(
                            "Failed to recreate table after corruption: {}",
                            e
                        ))
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Drop the stories table if it exists
    async fn drop_table_if_exists(&self) -> Result<(), StoryError> {
        let table_names =
            self.connection.table_names().execute().await.map_err(|e| {
                StoryError::Store(format!("Failed to list tables for drop: {}", e))
            })?;

        if table_names.contains(&self.table_name) {
            info!("Dropping existing stories table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| StoryError::Store(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}
