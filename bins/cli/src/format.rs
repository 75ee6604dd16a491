//! Output format helpers for CLI commands.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use clap::{Args, ValueEnum};
use code_agent_shared::{ErrorEnvelope, REDACTED_VALUE, is_secret_key};

/// Output format choices for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-friendly `key: value` lines.
    Text,
    /// Pretty-printed JSON document.
    Json,
}

/// Output-related CLI flags.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output format for command responses.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
    /// Suppress `info:` progress lines on stderr.
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Output mode derived from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputMode {
    #[must_use]
    pub const fn from_args(args: &OutputArgs) -> Self {
        Self {
            format: args.output,
            quiet: args.quiet,
        }
    }

    /// Returns true when JSON output is requested.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Append an `info:` line unless quiet.
    pub fn log_info(self, stderr: &mut String, message: &str) {
        if self.quiet {
            return;
        }
        stderr.push_str("info: ");
        stderr.push_str(message);
        stderr.push('\n');
    }
}

/// Pretty JSON with a trailing newline.
pub fn pretty_json(payload: &serde_json::Value) -> Result<String, CliError> {
    let mut output = serde_json::to_string_pretty(payload)?;
    output.push('\n');
    Ok(output)
}

/// Successful output with `stdout` and an `info:` line naming what completed.
#[must_use]
pub fn ok_output(mode: OutputMode, stdout: String, completed: &str) -> CliOutput {
    let mut stderr = String::new();
    mode.log_info(&mut stderr, completed);
    CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    }
}

/// Render a service failure; the exit code follows the error kind.
#[must_use]
pub fn format_error_output(mode: OutputMode, error: &ErrorEnvelope) -> CliOutput {
    format_error_output_with_code(mode, error, ExitCode::for_envelope(error))
}

/// Render a service failure with an explicit exit code.
#[must_use]
pub fn format_error_output_with_code(
    mode: OutputMode,
    error: &ErrorEnvelope,
    exit_code: ExitCode,
) -> CliOutput {
    let error = sanitize_error(error.clone());
    let mut stderr = String::new();
    mode.log_info(&mut stderr, "command failed");

    let stdout = if mode.is_json() {
        let payload = serde_json::json!({
            "status": "error",
            "category": error.category().as_str(),
            "error": error,
        });

        // This is a CLI boundary, so JSON serialization errors are internal.
        pretty_json(&payload).unwrap_or_else(|_| {
            "{\"status\":\"error\",\"category\":\"internal\",\"error\":{\"message\":\"internal error\"}}\n"
                .to_owned()
        })
    } else {
        format_error_text(&error)
    };

    CliOutput {
        stdout,
        stderr,
        exit_code,
    }
}

fn sanitize_error(mut error: ErrorEnvelope) -> ErrorEnvelope {
    for (key, value) in &mut error.metadata {
        if is_secret_key(key) {
            REDACTED_VALUE.clone_into(value);
        }
    }
    error
}

fn format_error_text(error: &ErrorEnvelope) -> String {
    let mut out = format!(
        "status: error\ncode: {}\ncategory: {}\nkind: {}\nmessage: {}\n",
        error.code,
        error.category(),
        error.kind,
        error.message
    );
    if !error.metadata.is_empty() {
        out.push_str("meta:\n");
        for (key, value) in &error.metadata {
            out.push_str("  ");
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
    }
    out
}
