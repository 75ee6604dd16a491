//! Agent lifecycle use cases.

mod create;
mod delete;
mod deps;
mod orchestrator;
mod query;
mod resources;
mod update;

pub use create::create_agent;
pub use delete::delete_agent;
pub use deps::{AgentDefaults, AgentDeps};
pub use orchestrator::AgentOrchestrator;
pub use query::{get_agent, list_agents};
pub use update::update_agent;
