//! `validate-request` command handler.

use super::SchemaKind;
use super::read_json_argument;
use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, format_error_output_with_code, ok_output, pretty_json};
use code_agent_infra::{RequestKind, validate_request_json};

/// Validate a request payload without running it.
pub fn run_validate_request(
    mode: OutputMode,
    kind: SchemaKind,
    input_json: &str,
) -> Result<CliOutput, CliError> {
    let kind = RequestKind::from(kind);
    let input = read_json_argument(input_json)?;
    if let Err(error) = validate_request_json(kind, &input) {
        return Ok(format_error_output_with_code(mode, &error, ExitCode::InvalidInput));
    }

    let stdout = if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "kind": kind.as_str(),
        }))?
    } else {
        format!("status: ok\nkind: {kind}\n")
    };
    Ok(ok_output(mode, stdout, "request validation completed"))
}
