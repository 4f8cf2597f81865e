use crate::config::OpenAiConfig;

use super::*;
use tempfile::TempDir;

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: Some(temp_dir.path().to_path_buf()),
        openai: OpenAiConfig {
            embedding_dimension: 5,
            ..OpenAiConfig::default()
        },
        ..Config::default()
    };
    (config, temp_dir)
}

fn create_test_story_record(id: &str, source: &str) -> StoryRecord {
    // Create a consistent test vector with the same dimensions for all tests
    let mut test_vector = vec![0.1, 0.2, 0.3, 0.4, 0.5];
    // Add some variation based on the id to make vectors slightly different
    let id_num: f32 = id.parse().unwrap_or(1.0);
    for (i, val) in test_vector.iter_mut().enumerate() {
        *val += id_num.mul_add(0.01, i as f32 * 0.001);
    }

    StoryRecord {
        id: format!("{}_{}", source, id),
        vector: test_vector, // 5-dimensional vector for testing
        metadata: StoryMetadata {
            story_id: format!("{}_{}", source, id),
            source: source.to_string(),
            title: format!("Story {}", id),
            content: format!("Once upon a time there was story number {}.", id),
            char_count: 42,
            story_index: id.parse().unwrap_or(0),
            kind: "story".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

#[tokio::test]
async fn vector_store_initialization() {
    let (config, _temp_dir) = create_test_config();

    let result = VectorStore::new(&config).await;
    assert!(
        result.is_ok(),
        "Failed to initialize VectorStore: {:?}",
        result.err()
    );

    let store = result.expect("should get result successfully");
    assert_eq!(store.table_name, "stories");
    assert_eq!(store.vector_dimension, Some(5));
}

#[tokio::test]
async fn store_batch_stories() {
    let (config, _temp_dir) = create_test_config();
    let mut store = VectorStore::new(&config)
        .await
        .expect("should create vector store");

    let records = vec![
        create_test_story_record("1", "Grimms_Fairy_Tales"),
        create_test_story_record("2", "Grimms_Fairy_Tales"),
        create_test_story_record("3", "Andersens_Fairy_Tales"),
    ];

    let result = store.store_stories_batch(records).await;
    assert!(
        result.is_ok(),
        "Failed to store stories batch: {:?}",
        result.err()
    );

    // Verify all stories were stored
    let count = store
        .count_stories()
        .await
        .expect("should count stories successfully");
    assert_eq!(count, 3);
}

#[tokio::test]
async fn search_similar_stories() {
    let (config, _temp_dir) = create_test_config();
    let mut store = VectorStore::new(&config)
        .await
        .expect("should create vector store");

    // Store some test stories
    let records = vec![
        create_test_story_record("1", "Grimms_Fairy_Tales"),
        create_test_story_record("2", "Grimms_Fairy_Tales"),
        create_test_story_record("3", "Andersens_Fairy_Tales"),
    ];

    store
        .store_stories_batch(records)
        .await
        .expect("should store stories successfully");

    // Search for similar stories
    let query_vector = vec![0.1, 0.2, 0.3, 0.4, 0.5];
    let results = store
        .search_similar(&query_vector, 10)
        .await
        .expect("search should succeed");

    assert!(!results.is_empty(), "Should find similar stories");
    assert!(results.len() <= 3, "Should not return more than stored");

    // Results come back best match first
    for pair in results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }

    // Verify result structure
    for result in &results {
        assert!(!result.story_metadata.story_id.is_empty());
        assert!(!result.story_metadata.content.is_empty());
        assert!((-1.0..=1.0).contains(&result.similarity_score));
    }
}

#[tokio::test]
async fn search_respects_limit() {
    let (config, _temp_dir) = create_test_config();
    let mut store = VectorStore::new(&config)
        .await
        .expect("should create vector store");

    let records = vec![
        create_test_story_record("1", "Grimms_Fairy_Tales"),
        create_test_story_record("2", "Grimms_Fairy_Tales"),
        create_test_story_record("3", "Grimms_Fairy_Tales"),
        create_test_story_record("4", "Grimms_Fairy_Tales"),
    ];

    store
        .store_stories_batch(records)
        .await
        .expect("should store stories successfully");

    let query_vector = vec![0.1, 0.2, 0.3, 0.4, 0.5];
    let results = store
        .search_similar(&query_vector, 3)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn delete_source_stories() {
    let (config, _temp_dir) = create_test_config();
    let mut store = VectorStore::new(&config)
        .await
        .expect("should create vector store");

    // Store stories from different sources
    let records = vec![
        create_test_story_record("1", "Grimms_Fairy_Tales"),
        create_test_story_record("2", "Grimms_Fairy_Tales"),
        create_test_story_record("3", "Andersens_Fairy_Tales"),
    ];

    store
        .store_stories_batch(records)
        .await
        .expect("should store stories successfully");

    // Verify initial count
    let initial_count = store
        .count_stories()
        .await
        .expect("should count stories successfully");
    assert_eq!(initial_count, 3);

    // Delete stories for one source
    let result = store.delete_source("Grimms_Fairy_Tales").await;
    assert!(
        result.is_ok(),
        "Failed to delete source stories: {:?}",
        result.err()
    );

    // Verify only the other source remains
    let count = store
        .count_stories()
        .await
        .expect("should count stories successfully");
    assert_eq!(count, 1);

    let query_vector = vec![0.1, 0.2, 0.3, 0.4, 0.5];
    let remaining_results = store
        .search_similar(&query_vector, 10)
        .await
        .expect("search should succeed");

    for result in &remaining_results {
        assert_eq!(result.story_metadata.source, "Andersens_Fairy_Tales");
    }
}

#[tokio::test]
async fn empty_batch_handling() {
    let (config, _temp_dir) = create_test_config();
    let mut store = VectorStore::new(&config)
        .await
        .expect("should create vector store");

    let result = store.store_stories_batch(vec![]).await;
    assert!(result.is_ok(), "Should handle empty batch gracefully");

    let count = store
        .count_stories()
        .await
        .expect("should count stories successfully");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn dimension_mismatch_recreates_table() {
    let (config, _temp_dir) = create_test_config();
    let mut store = VectorStore::new(&config)
        .await
        .expect("should create vector store");

    store
        .store_stories_batch(vec![create_test_story_record("1", "Grimms_Fairy_Tales")])
        .await
        .expect("should store stories successfully");

    // Inserting records with a different vector width replaces the table
    let mut short_record = create_test_story_record("2", "Andersens_Fairy_Tales");
    short_record.vector = vec![0.1, 0.2, 0.3];

    store
        .store_stories_batch(vec![short_record])
        .await
        .expect("should store stories successfully");

    let count = store
        .count_stories()
        .await
        .expect("should count stories successfully");
    assert_eq!(count, 1);
    assert_eq!(store.vector_dimension, Some(3));
}

#[tokio::test]
async fn reopen_detects_existing_dimension() {
    let (config, _temp_dir) = create_test_config();

    {
        let mut store = VectorStore::new(&config)
            .await
            .expect("should create vector store");
        store
            .store_stories_batch(vec![create_test_story_record("1", "Grimms_Fairy_Tales")])
            .await
            .expect("should store stories successfully");
    }

    // A fresh connection picks up the table and its vector width from disk
    let store = VectorStore::new(&config)
        .await
        .expect("should reopen vector store");

    assert_eq!(store.vector_dimension, Some(5));
    let count = store
        .count_stories()
        .await
        .expect("should count stories successfully");
    assert_eq!(count, 1);
}
