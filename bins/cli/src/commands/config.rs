//! `config` command handlers.

use super::ConfigSource;
use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, format_error_output_with_code, ok_output, pretty_json};
use code_agent_infra::{load_effective_config, load_effective_config_json};

/// Validate the effective config and print a one-line verdict.
pub fn run_config_check(mode: OutputMode, source: ConfigSource<'_>) -> Result<CliOutput, CliError> {
    let config = match load_effective_config(source.env, source.path, source.overrides_json) {
        Ok(config) => config,
        Err(error) => {
            return Ok(format_error_output_with_code(mode, &error, ExitCode::InvalidInput));
        },
    };

    let stdout = if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "configPath": source.path.map(|path| path.to_string_lossy().into_owned()),
            "store": config.store.backend.as_str(),
            "vectorStore": config.provisioning.vector_store.backend.as_str(),
            "defaultProvider": config.providers.default.as_str(),
        }))?
    } else {
        let mut out = format!(
            "status: ok\nconfig: ok\nstore: {}\nvector_store: {}\ndefault_provider: {}\n",
            config.store.backend.as_str(),
            config.provisioning.vector_store.backend.as_str(),
            config.providers.default,
        );
        if let Some(path) = source.path {
            out.push_str(&format!("path: {}\n", path.to_string_lossy()));
        }
        out
    };
    Ok(ok_output(mode, stdout, "config check completed"))
}

/// Print the effective config with secrets redacted.
pub fn run_config_show(mode: OutputMode, source: ConfigSource<'_>) -> Result<CliOutput, CliError> {
    let config_json =
        match load_effective_config_json(source.env, source.path, source.overrides_json) {
            Ok(config) => config,
            Err(error) => {
                return Ok(format_error_output_with_code(mode, &error, ExitCode::InvalidInput));
            },
        };

    let stdout = if mode.is_json() {
        let config_value: serde_json::Value = serde_json::from_str(config_json.trim())?;
        pretty_json(&serde_json::json!({
            "status": "ok",
            "configPath": source.path.map(|path| path.to_string_lossy().into_owned()),
            "effectiveConfig": config_value,
        }))?
    } else {
        format!("status: ok\nconfig:\n{config_json}")
    };
    Ok(ok_output(mode, stdout, "config show completed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    const QUIET_TEXT: OutputMode = OutputMode {
        format: OutputFormat::Text,
        quiet: true,
    };

    #[test]
    fn missing_config_file_is_invalid_input() -> Result<(), CliError> {
        let env = BTreeMap::new();
        let missing = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("missing-config.json");
        let output = run_config_check(
            QUIET_TEXT,
            ConfigSource {
                env: &env,
                path: Some(missing.as_path()),
                overrides_json: None,
            },
        )?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stdout.contains("status: error"));
        Ok(())
    }

    #[test]
    fn env_overrides_reach_the_shown_config() -> Result<(), Box<dyn std::error::Error>> {
        let env = BTreeMap::from([(
            "CODE_AGENT_STORE_BACKEND".to_owned(),
            "sqlite".to_owned(),
        )]);
        let mode = OutputMode {
            format: OutputFormat::Json,
            quiet: true,
        };
        let output = run_config_show(
            mode,
            ConfigSource {
                env: &env,
                path: None,
                overrides_json: None,
            },
        )?;
        let value: serde_json::Value = serde_json::from_str(output.stdout.trim())?;
        let backend = value
            .get("effectiveConfig")
            .and_then(|config| config.get("store"))
            .and_then(|store| store.get("backend"))
            .and_then(serde_json::Value::as_str);
        assert_eq!(backend, Some("sqlite"));
        assert_eq!(output.exit_code, ExitCode::Ok);
        Ok(())
    }
}
