use bujo_core::ai::models::default_model_name;
use bujo_core::config::{ConfigError, JournalConfig};
use bujo_core::AiProvider;
use std::collections::HashMap;
use std::path::PathBuf;

fn resolve(pairs: &[(&str, &str)]) -> Result<JournalConfig, ConfigError> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    JournalConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn defaults_from_home() {
    let config = resolve(&[("HOME", "/home/ada")]).unwrap();

    assert!(!config.ai_enabled);
    assert_eq!(config.ai_provider, AiProvider::Local);
    assert_eq!(config.remote_api_key, None);
    assert_eq!(config.local_model_name, default_model_name());
    assert_eq!(config.editor_command, "vi");
    assert_eq!(config.data_dir, PathBuf::from("/home/ada/.bujo"));
    assert_eq!(config.prompt_dir, PathBuf::from("/home/ada/.bujo/prompts"));
    assert_eq!(config.database_path(), PathBuf::from("/home/ada/.bujo/bujo.db"));
    assert_eq!(config.models_dir(), PathBuf::from("/home/ada/.bujo/models"));
    assert_eq!(config.log_dir(), PathBuf::from("/home/ada/.bujo/logs"));
}

#[test]
fn remote_key_selects_remote_provider() {
    let config = resolve(&[
        ("BUJO_DATA_DIR", "/data"),
        ("BUJO_REMOTE_API_KEY", "sk-test"),
        ("BUJO_AI_ENABLED", "yes"),
    ])
    .unwrap();
    assert!(config.ai_enabled);
    assert_eq!(config.ai_provider, AiProvider::Remote);
    assert!(!format!("{config:?}").contains("sk-test"));
}

#[test]
fn explicit_local_provider_wins_over_key() {
    let config = resolve(&[
        ("BUJO_DATA_DIR", "/data"),
        ("BUJO_REMOTE_API_KEY", "sk-test"),
        ("BUJO_AI_PROVIDER", "LOCAL"),
        ("BUJO_LOCAL_MODEL", "phi-2"),
    ])
    .unwrap();
    assert_eq!(config.ai_provider, AiProvider::Local);
    assert_eq!(config.local_model_name, "phi-2");
}

#[test]
fn remote_without_key_is_rejected() {
    let err = resolve(&[("BUJO_DATA_DIR", "/data"), ("BUJO_AI_PROVIDER", "remote")]).unwrap_err();
    assert_eq!(err, ConfigError::MissingRemoteApiKey);
}

#[test]
fn invalid_values_are_reported() {
    assert!(matches!(
        resolve(&[("HOME", "/h"), ("BUJO_AI_ENABLED", "maybe")]),
        Err(ConfigError::InvalidBool { .. })
    ));
    assert!(matches!(
        resolve(&[("HOME", "/h"), ("BUJO_AI_PROVIDER", "cloud")]),
        Err(ConfigError::InvalidProvider(_))
    ));
    assert_eq!(resolve(&[]).unwrap_err(), ConfigError::MissingDataDir);
}

#[test]
fn editor_prefers_visual_then_editor() {
    let both = resolve(&[("HOME", "/h"), ("VISUAL", "code -w"), ("EDITOR", "nano")]).unwrap();
    assert_eq!(both.editor_command, "code -w");

    let editor_only = resolve(&[("HOME", "/h"), ("EDITOR", "nano"), ("VISUAL", "  ")]).unwrap();
    assert_eq!(editor_only.editor_command, "nano");
}

#[test]
fn prompt_dir_can_be_overridden() {
    let config = resolve(&[("BUJO_DATA_DIR", "/data"), ("BUJO_PROMPT_DIR", "/prompts")]).unwrap();
    assert_eq!(config.prompt_dir, PathBuf::from("/prompts"));
}
