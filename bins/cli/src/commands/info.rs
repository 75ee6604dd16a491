//! `info` command handler.

use crate::CliOutput;
use crate::error::CliError;
use crate::format::{OutputMode, ok_output, pretty_json};
use code_agent_config::config_crate_version;
use code_agent_infra::infra_crate_version;

/// Print build and crate versions.
pub fn run_info(mode: OutputMode) -> Result<CliOutput, CliError> {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let infra = infra_crate_version();
    let config = config_crate_version();

    let stdout = if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "build": {
                "name": name,
                "version": version,
                "infraVersion": infra,
                "configVersion": config,
            }
        }))?
    } else {
        format!("status: ok\nname: {name}\nversion: {version}\ninfra: {infra}\nconfig: {config}\n")
    };
    Ok(ok_output(mode, stdout, "info completed"))
}
