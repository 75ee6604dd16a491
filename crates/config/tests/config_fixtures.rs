//! Integration tests for parsing config fixtures from the workspace testkit.

use code_agent_config::{
    CURRENT_CONFIG_VERSION, StoreBackend, VectorStoreBackend, parse_agent_service_config_json,
    parse_agent_service_config_toml,
};
use code_agent_domain::AiProvider;
use code_agent_shared::{ErrorCategory, ErrorCode};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_dir.to_path_buf())
}

fn read_fixture(relative: &str) -> Result<String, Box<dyn Error>> {
    let path = workspace_root()
        .join("crates")
        .join("testkit")
        .join("fixtures")
        .join(relative);
    Ok(fs::read_to_string(path)?)
}

#[test]
fn parses_valid_fixture_and_normalizes() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/agent-service.valid.json")?;
    let config = parse_agent_service_config_json(&contents)?;

    assert_eq!(config.version, CURRENT_CONFIG_VERSION);
    assert_eq!(config.store.backend, StoreBackend::Document);
    assert_eq!(
        config.store.path.as_deref(),
        Some("/var/lib/code-agent/records"),
        "path should be trimmed"
    );
    assert_eq!(config.provisioning.vector_store.dimension, 768);
    assert_eq!(config.default_branch().as_str(), "develop");
    assert_eq!(config.observability.log_level.as_ref(), "debug");

    let providers: Vec<AiProvider> = config.provider_profiles().keys().copied().collect();
    assert_eq!(providers, vec![AiProvider::Local, AiProvider::OpenAi]);
    Ok(())
}

#[test]
fn parses_default_toml_fixture() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/agent-service.default.toml")?;
    let config = parse_agent_service_config_toml(&contents)?;

    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.store.table.as_ref(), "agents");
    assert_eq!(
        config.provisioning.vector_store.backend,
        VectorStoreBackend::Sqlite
    );
    assert_eq!(config.provisioning.vector_store.dimension, 1536);
    assert_eq!(config.providers.default, AiProvider::Local);
    Ok(())
}

#[test]
fn invalid_fixture_reports_error_code() -> Result<(), Box<dyn Error>> {
    let contents = read_fixture("config/agent-service.invalid.json")?;
    let error = parse_agent_service_config_json(&contents)
        .err()
        .ok_or_else(|| std::io::Error::other("expected invalid fixture error"))?;

    assert_eq!(error.code, ErrorCode::new("config", "invalid_table_name"));
    assert_eq!(error.category(), ErrorCategory::Validation);
    assert_eq!(
        error.metadata.get("section").map(String::as_str),
        Some("store")
    );
    Ok(())
}

#[test]
fn unknown_provider_profile_fields_are_rejected() {
    let input = r#"{
      "providers": { "local": { "ollama_url": "http://x:1", "model": "m", "api_key": "k" } }
    }"#;
    let error = parse_agent_service_config_json(input).err();
    assert_eq!(
        error.map(|e| e.code),
        Some(ErrorCode::new("config", "invalid_json"))
    );
}

#[test]
fn unsupported_version_is_rejected() {
    let error = parse_agent_service_config_json(r#"{ "version": 2 }"#).err();
    assert_eq!(
        error.map(|e| e.code),
        Some(ErrorCode::new("config", "unsupported_version"))
    );
}
