//! CLI command handlers.

pub mod agents;
pub mod config;
pub mod info;
pub mod schema;
pub mod validate;

pub use agents::{AgentCommands, run_agents};
pub use config::{run_config_check, run_config_show};
pub use info::run_info;
pub use schema::{SchemaKind, run_schema};
pub use validate::run_validate_request;

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;

/// Where the effective config comes from.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSource<'a> {
    /// `CODE_AGENT_*` variables.
    pub env: &'a BTreeMap<String, String>,
    /// Config file (JSON/TOML).
    pub path: Option<&'a Path>,
    /// Partial JSON config applied over the file.
    pub overrides_json: Option<&'a str>,
}

/// Inline JSON, or stdin when the argument is `-`.
pub fn read_json_argument(value: &str) -> io::Result<String> {
    if value.trim() != "-" {
        return Ok(value.to_owned());
    }
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(input)
}
