//! The Gantry editor model: an in-memory representation of a workflow's
//! pipeline documents, built for a visual editor sitting on top of it.
//!
//! A [`workflow::Workflow`] owns one [`pipeline::Pipeline`] per document.
//! Each pipeline parses its text into an ordered mapping, builds the typed
//! object graph (blocks, jobs, agents, promotions, config value objects) on
//! top of it, and serializes back through the same mapping so unrecognized
//! keys and the original line-ending style survive the round trip.
//!
//! All mutation goes through [`action::Action`] dispatch; validation is
//! pull-based via [`workflow::Workflow::validate`].

pub mod action;
pub mod agent;
pub mod block;
pub mod dependencies;
pub mod env_vars;
pub mod errors;
pub mod graph;
pub mod job;
pub mod pipeline;
pub mod promotion;
pub mod secrets;
pub mod selection;
pub mod settings;
pub mod workflow;

pub use action::{Action, AgentScope};
pub use agent::{Agent, EnvironmentType};
pub use block::Block;
pub use dependencies::{BlockDependencies, DependencyRef};
pub use errors::Errors;
pub use job::{Job, MatrixEntry};
pub use pipeline::Pipeline;
pub use promotion::{Parameter, Promotion};
pub use settings::TimeUnit;
pub use workflow::Workflow;
