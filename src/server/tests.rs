use super::*;

use anyhow::anyhow;

#[test]
fn api_error_status_codes() {
    let bad_request = ApiError::BadRequest("query must not be empty".to_string());
    assert_eq!(bad_request.into_response().status(), StatusCode::BAD_REQUEST);

    let upstream = ApiError::Upstream("model service unreachable".to_string());
    assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);

    let internal = ApiError::Internal("table is gone".to_string());
    assert_eq!(
        internal.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn search_errors_map_to_api_errors() {
    assert!(matches!(
        ApiError::from(SearchError::EmptyQuery),
        ApiError::BadRequest(_)
    ));
    assert!(matches!(
        ApiError::from(SearchError::Embedding(anyhow!("down"))),
        ApiError::Upstream(_)
    ));
    assert!(matches!(
        ApiError::from(SearchError::Explanation(anyhow!("down"))),
        ApiError::Upstream(_)
    ));
    assert!(matches!(
        ApiError::from(SearchError::Store(StoryError::Store(
            "corrupt".to_string()
        ))),
        ApiError::Internal(_)
    ));
}

mod integration_tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use crate::config::OpenAiConfig;
    use crate::embeddings::OpenAiClient;
    use crate::store::{StoryMetadata, StoryRecord, VectorStore};

    use super::*;

    fn test_config(server: &MockServer, temp_dir: &TempDir) -> Config {
        Config {
            base_dir: Some(temp_dir.path().to_path_buf()),
            openai: OpenAiConfig {
                api_base: server.uri(),
                embedding_dimension: 4,
                ..OpenAiConfig::default()
            },
            ..Config::default()
        }
    }

    async fn seed_stories(config: &Config, count: u32) {
        let mut store = VectorStore::new(config)
            .await
            .expect("should create vector store");

        let records: Vec<StoryRecord> = (0..count)
            .map(|i| StoryRecord {
                id: format!("Test_Tales_{}", i),
                vector: vec![1.0, i as f32 * 0.1, 0.0, 0.0],
                metadata: StoryMetadata {
                    story_id: format!("Test_Tales_{}", i),
                    source: "Test_Tales".to_string(),
                    title: format!("Story {}", i),
                    content: format!("Once upon a time, story {} happened.", i),
                    char_count: 40,
                    story_index: i,
                    kind: "story".to_string(),
                    created_at: "2024-01-01T00:00:00Z".to_string(),
                },
            })
            .collect();

        store
            .store_stories_batch(records)
            .await
            .expect("should seed stories");
    }

    async fn test_router(server: &MockServer, temp_dir: &TempDir) -> Router {
        let config = test_config(server, temp_dir);
        let client = OpenAiClient::with_api_key(&config, "test-key".to_string())
            .with_retry_attempts(1);
        let engine = SearchEngine::with_client(config, client)
            .await
            .expect("engine should initialize");
        router(Arc::new(AppState::new(engine)))
    }

    fn search_request(query: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/search")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "query": query }).to_string()))
            .expect("should build request")
    }

    async fn response_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("should collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    fn mock_query_embedding() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 0, "embedding": [1.0, 0.0, 0.0, 0.0] }
            ]
        }))
    }

    #[tokio::test]
    async fn index_page_is_served() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().expect("should create temp dir");
        let app = test_router(&server, &temp_dir).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .expect("should build request"),
            )
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("should collect body")
            .to_bytes();
        let page = String::from_utf8(bytes.to_vec()).expect("page should be UTF-8");
        assert!(page.contains("<form"));
        assert!(page.contains("Story Search"));
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_upstream_calls() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(mock_query_embedding())
            .expect(0)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().expect("should create temp dir");
        let app = test_router(&server, &temp_dir).await;

        let response = app
            .oneshot(search_request("   \n "))
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .expect("error should be a string")
                .contains("empty")
        );
    }

    #[tokio::test]
    async fn search_returns_ranked_stories_and_explanation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(mock_query_embedding())
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "All of them feature talking animals." } }
                ]
            })))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = test_config(&server, &temp_dir);
        seed_stories(&config, 5).await;
        let app = test_router(&server, &temp_dir).await;

        let response = app
            .oneshot(search_request("a fable about animals"))
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        let results = body["results"].as_array().expect("results should be a list");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["title"], "Story 0");
        assert_eq!(body["explanation"], "All of them feature talking animals.");
    }

    #[tokio::test]
    async fn failed_explanation_leaves_server_serving() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(mock_query_embedding())
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = test_config(&server, &temp_dir);
        seed_stories(&config, 3).await;
        let app = test_router(&server, &temp_dir).await;

        let response = app
            .clone()
            .oneshot(search_request("a fable about animals"))
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        // The failure left the store untouched and the server answering
        let health = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("should build request"),
            )
            .await
            .expect("request should complete");

        assert_eq!(health.status(), StatusCode::OK);

        let body = response_json(health).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stories"], 3);
    }

    #[tokio::test]
    async fn health_reports_story_count() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = test_config(&server, &temp_dir);
        seed_stories(&config, 2).await;
        let app = test_router(&server, &temp_dir).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("should build request"),
            )
            .await
            .expect("request should complete");

        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stories"], 2);
    }
}
