use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.openai.api_base, "https://api.openai.com/v1");
    assert_eq!(config.openai.embedding_model, "text-embedding-ada-002");
    assert_eq!(config.openai.chat_model, "gpt-3.5-turbo");
    assert_eq!(config.openai.embedding_dimension, 1536);
    assert_eq!(config.openai.batch_size, 64);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.segmenter.min_story_chars, 300);
    assert_eq!(config.segmenter.max_story_chars, 8000);
    assert_eq!(config.segmenter.chunk_size, 1200);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.openai.api_base = "ftp://example.com".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.server.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.segmenter.min_story_chars = 10;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.segmenter.max_story_chars = 100;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn segmenter_size_relationships() {
    let mut config = Config::default();
    config.segmenter.min_story_chars = 2000;
    config.segmenter.max_story_chars = 1500;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MaxStoryCharsTooSmall(1500, 2000))
    ));

    let mut config = Config::default();
    config.segmenter.min_story_chars = 1300;
    config.segmenter.max_story_chars = 8000;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ChunkSizeOutOfRange(1200, 1300, 8000))
    ));
}

#[test]
fn api_base_url_generation() {
    let config = Config::default();
    let url = config
        .openai
        .api_base_url()
        .expect("should generate api base url successfully");
    assert_eq!(url.as_str(), "https://api.openai.com/v1");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
[openai]
chat_model = "gpt-4o-mini"

[server]
port = 8080
"#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.openai.chat_model, "gpt-4o-mini");
    assert_eq!(parsed.openai.embedding_model, "text-embedding-ada-002");
    assert_eq!(parsed.server.port, 8080);
    assert_eq!(parsed.server.host, "127.0.0.1");
    assert_eq!(parsed.segmenter.chunk_size, 1200);
}

#[test]
fn setter_validation() {
    let mut config = OpenAiConfig::default();

    assert!(config.set_api_base("http://localhost:9000/v1".to_string()).is_ok());
    assert!(config.set_embedding_model("text-embedding-3-small".to_string()).is_ok());
    assert!(config.set_chat_model("gpt-4o".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());
    assert!(config.set_embedding_dimension(768).is_ok());

    assert!(config.set_api_base("not a url".to_string()).is_err());
    assert!(config.set_embedding_model(String::new()).is_err());
    assert!(config.set_chat_model("   ".to_string()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());
    assert!(config.set_embedding_dimension(32).is_err());

    let mut server = ServerConfig::default();
    assert!(server.set_host("0.0.0.0".to_string()).is_ok());
    assert!(server.set_port(8080).is_ok());
    assert!(server.set_host(String::new()).is_err());
    assert!(server.set_port(0).is_err());
}

#[test]
fn base_dir_override_paths() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config {
        base_dir: Some(temp_dir.path().to_path_buf()),
        ..Default::default()
    };

    let books = config
        .books_dir_path()
        .expect("should resolve books dir");
    assert_eq!(books, temp_dir.path().join("stories"));

    let vectors = config
        .vector_store_path()
        .expect("should resolve vector store path");
    assert_eq!(vectors, temp_dir.path().join("vectors"));
}

#[test]
fn explicit_books_dir_wins() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let custom = temp_dir.path().join("library");

    let config = Config {
        books_dir: Some(custom.clone()),
        base_dir: Some(temp_dir.path().to_path_buf()),
        ..Default::default()
    };

    let books = config
        .books_dir_path()
        .expect("should resolve books dir");
    assert_eq!(books, custom);
}
