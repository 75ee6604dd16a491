//! `schema` command handler.

use crate::CliOutput;
use crate::error::CliError;
use crate::format::{OutputMode, ok_output, pretty_json};
use clap::ValueEnum;
use code_agent_config::request_schemas;
use code_agent_infra::RequestKind;

/// Request kinds addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaKind {
    CreateAgent,
    UpdateAgent,
    ListAgents,
    AgentId,
}

impl From<SchemaKind> for RequestKind {
    fn from(value: SchemaKind) -> Self {
        match value {
            SchemaKind::CreateAgent => Self::CreateAgent,
            SchemaKind::UpdateAgent => Self::UpdateAgent,
            SchemaKind::ListAgents => Self::ListAgents,
            SchemaKind::AgentId => Self::AgentId,
        }
    }
}

/// Print JSON Schemas of the request payloads (all kinds, or just `kind`).
///
/// Schemas are JSON documents, so both output formats print JSON.
pub fn run_schema(mode: OutputMode, kind: Option<SchemaKind>) -> Result<CliOutput, CliError> {
    let wanted = kind.map(RequestKind::from);
    let mut schemas = serde_json::Map::new();
    for (name, schema) in request_schemas() {
        if wanted.is_none_or(|kind| kind.as_str() == name) {
            schemas.insert(name.to_owned(), serde_json::to_value(schema)?);
        }
    }

    let payload = match wanted {
        Some(kind) => schemas.remove(kind.as_str()).unwrap_or_default(),
        None => serde_json::Value::Object(schemas),
    };
    Ok(ok_output(mode, pretty_json(&payload)?, "schema export completed"))
}
