//! Integration tests for request fixture validation.

use code_agent_config::{
    parse_create_agent_request_json, parse_list_agents_request_json,
    parse_update_agent_request_json, request_schemas,
};
use code_agent_domain::{AgentId, AiProvider, BranchName};
use code_agent_shared::{ErrorCategory, ErrorCode};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

fn read_fixture(relative: &str) -> Result<String, Box<dyn Error>> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let path: PathBuf = manifest_dir
        .join("..")
        .join("testkit")
        .join("fixtures")
        .join(relative);
    Ok(fs::read_to_string(path)?)
}

#[test]
fn validates_request_fixtures() -> Result<(), Box<dyn Error>> {
    let create = parse_create_agent_request_json(&read_fixture("requests/create-agent.valid.json")?)?;
    assert_eq!(
        create.agent_id.as_ref().map(AgentId::as_str),
        Some("reviewer-01")
    );
    assert_eq!(
        create.branch.as_ref().map(BranchName::as_str),
        Some("release/2.4")
    );
    assert_eq!(create.ai_provider, Some(AiProvider::Local));
    assert!(create.ai_config.is_some());

    let update = parse_update_agent_request_json(&read_fixture("requests/update-agent.valid.json")?)?;
    assert_eq!(update.agent_id.as_str(), "reviewer-01");
    assert_eq!(
        update.branch.as_ref().map(BranchName::as_str),
        Some("main")
    );
    assert!(update.repository_url.is_none());
    Ok(())
}

#[test]
fn invalid_list_fixture_is_a_validation_error() -> Result<(), Box<dyn Error>> {
    let error = parse_list_agents_request_json(&read_fixture("requests/list-agents.invalid.json")?)
        .err()
        .ok_or_else(|| std::io::Error::other("expected list error"))?;

    assert_eq!(error.code, ErrorCode::new("request", "out_of_range"));
    assert_eq!(error.category(), ErrorCategory::Validation);
    assert_eq!(error.metadata.get("value").map(String::as_str), Some("500"));
    Ok(())
}

#[test]
fn every_request_kind_exports_a_schema() {
    let kinds: Vec<&str> = request_schemas().into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(kinds, ["createAgent", "updateAgent", "listAgents", "agentId"]);
}
