//! # code-agent-app
//!
//! Agent provisioning use cases: create, update, delete, get and list.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod agents;
pub mod observability;
pub mod provisioning;

pub use agents::{
    AgentDefaults, AgentDeps, AgentOrchestrator, create_agent, delete_agent, get_agent,
    list_agents, update_agent,
};
pub use observability::Observer;
pub use provisioning::{
    AgentBinding, AgentBuilder, BuiltKnowledgeBase, KnowledgeBaseBuilder, Provisioned,
    Provisioner, ProvisionerSet, ProvisioningError, ProvisioningStep,
};

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_agent_domain::domain_crate_version;
    use code_agent_ports::ports_crate_version;
    use code_agent_shared::shared_crate_version;

    #[test]
    fn app_crate_compiles() {
        assert!(!app_crate_version().is_empty());
    }

    #[test]
    fn app_depends_only_on_inner_layers() {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let runtime_deps = cargo_toml
            .split("[dev-dependencies]")
            .next()
            .unwrap_or_default();
        for forbidden in ["code-agent-adapters", "code-agent-infra", "code-agent-config"] {
            assert!(
                !runtime_deps.contains(forbidden),
                "app must not depend on {forbidden}"
            );
        }
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
