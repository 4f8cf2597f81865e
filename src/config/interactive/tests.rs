use super::load_existing_config as load_existing_config_impl;

#[test]
fn load_existing_config() {
    let config = load_existing_config_impl().expect("config loaded successfully");
    assert!(!config.openai.api_base.is_empty());
    assert!(!config.openai.embedding_model.is_empty());
    assert!(!config.openai.chat_model.is_empty());
    assert!(config.openai.batch_size > 0);
    assert!(config.server.port > 0);
}
