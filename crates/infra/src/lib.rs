//! # code-agent-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// One-shot agent use cases for the CLI.
pub mod cli_local;
/// Composition root for the agent use cases.
mod composition;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Logger and telemetry construction.
pub mod observability;
/// Request validation helpers used by CLI surfaces.
pub mod request_check;
/// Record store and vector schema selection.
mod store_factory;

pub use cli_local::{AgentAction, AgentOutcome, run_agent_action_local};
pub use composition::build_agent_orchestrator;
pub use config_check::{load_effective_config, load_effective_config_json};
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use observability::{Observability, build_observability, build_observability_with_sink};
pub use request_check::{RequestKind, ValidatedRequest, validate_request_json};
pub use store_factory::{build_record_store, build_vector_schema};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_adapters::adapters_crate_version;
    use code_agent_app::app_crate_version;
    use code_agent_config::config_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                continue;
            }
            if in_deps && line.starts_with("code-agent-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_string());
            }
        }

        deps
    }

    #[test]
    fn infra_is_the_composition_root() {
        let deps = workspace_deps();
        for required in ["code-agent-app", "code-agent-adapters", "code-agent-config"] {
            assert!(deps.iter().any(|dep| dep == required), "missing {required}");
        }
        assert!(!deps.iter().any(|dep| dep == "code-agent-testkit"));
    }

    #[test]
    fn infra_crate_compiles() {
        assert!(!infra_crate_version().is_empty());
        assert!(!adapters_crate_version().is_empty());
        assert!(!app_crate_version().is_empty());
        assert!(!config_crate_version().is_empty());
    }
}
