//! Provisioning pipelines built from port collaborators.

mod agent;
mod knowledge_base;
mod provisioner;
mod steps;

pub use agent::AgentBuilder;
pub use knowledge_base::{BuiltKnowledgeBase, KnowledgeBaseBuilder, snapshot_prefix};
pub use provisioner::{AgentBinding, Provisioned, Provisioner, ProvisionerSet};
pub use steps::{ProvisioningError, ProvisioningStep, step_failed};
