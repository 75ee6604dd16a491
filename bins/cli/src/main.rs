//! CLI binary entrypoint.

mod commands;
mod error;
mod format;

use clap::{Parser, Subcommand};
use commands::{
    AgentCommands, ConfigSource, SchemaKind, run_agents, run_config_check, run_config_show,
    run_info, run_schema, run_validate_request,
};
use error::{CliError, ExitCode};
use format::{OutputArgs, OutputMode};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const ENV_PREFIX: &str = "CODE_AGENT_";

#[derive(Debug, Parser)]
#[command(
    name = "code-agent",
    version,
    about = "Provision repository-backed code analysis agents",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    /// Config file path (JSON/TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Partial JSON config merged over the file (env still wins).
    #[arg(long, global = true)]
    overrides_json: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show build and version details.
    Info,
    /// Agent lifecycle commands.
    Agents {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print JSON Schemas of the request payloads.
    Schema {
        /// Only this request kind.
        #[arg(long, value_enum)]
        kind: Option<SchemaKind>,
    },
    /// Validate a request payload without running it.
    ValidateRequest {
        /// Request kind.
        #[arg(long, value_enum)]
        kind: SchemaKind,
        /// Request JSON (`-` reads stdin).
        #[arg(long)]
        input_json: String,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Validate the effective config.
    Check,
    /// Print the effective config with secrets redacted.
    Show,
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);
    let env = collect_scoped_env(ENV_PREFIX);

    match run(&cli, mode, &env) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

/// `RUST_LOG`-filtered diagnostics on stderr; stdout carries only command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(cli: &Cli, mode: OutputMode, env: &BTreeMap<String, String>) -> Result<CliOutput, CliError> {
    let source = ConfigSource {
        env,
        path: cli.config.as_deref(),
        overrides_json: cli.overrides_json.as_deref(),
    };
    tracing::debug!(command = ?cli.command, "dispatching command");

    match &cli.command {
        Commands::Info => run_info(mode),
        Commands::Agents { command } => run_agents(mode, source, command),
        Commands::Config { command } => match command {
            ConfigCommands::Check => run_config_check(mode, source),
            ConfigCommands::Show => run_config_show(mode, source),
        },
        Commands::Schema { kind } => run_schema(mode, *kind),
        Commands::ValidateRequest { kind, input_json } => {
            run_validate_request(mode, *kind, input_json)
        },
    }
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["code-agent", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );
        assert!(is_version, "expected clap to render version");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "code-agent",
            "agents",
            "list",
            "--page-size",
            "5",
            "--output",
            "json",
            "--config",
            "agent-service.toml",
        ])?;
        assert_eq!(cli.output.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("agent-service.toml")));
        assert!(matches!(
            cli.command,
            Commands::Agents {
                command: AgentCommands::List(_)
            }
        ));
        Ok(())
    }

    #[test]
    fn create_input_json_excludes_flags() {
        let result = Cli::try_parse_from([
            "code-agent",
            "agents",
            "create",
            "--input-json",
            "{}",
            "--repository-url",
            "https://github.com/acme/widgets",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn exit_codes_for_cli_errors() -> Result<(), Box<dyn std::error::Error>> {
        let io_error = CliError::Io(io::Error::other("io"));
        let serialization_error = match serde_json::from_str::<serde_json::Value>("not-json") {
            Ok(_) => return Err("expected serialization error".into()),
            Err(error) => CliError::Serialization(error),
        };
        assert_eq!(io_error.exit_code(), ExitCode::Io);
        assert_eq!(serialization_error.exit_code(), ExitCode::Internal);
        Ok(())
    }

    #[test]
    fn only_prefixed_variables_are_collected() {
        let env = collect_scoped_env("CODE_AGENT_TEST_NO_SUCH_PREFIX_");
        assert!(env.is_empty());
    }
}
