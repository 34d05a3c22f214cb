//! Shared types for the Gantry pipeline-editor model.
//!
//! This crate provides the foundation used across the other Gantry crates:
//! - `GantryError` — unified error taxonomy
//! - `Uid` — stable entity identifier for cross-reference lookup
//! - `Catalogs` — externally injected machine/secret/deployment catalogs
//! - `SchemaFailure` — the record shape produced by the external schema validator

pub mod catalog;
pub mod schema;

pub use catalog::{AgentCatalog, AgentTypeEntry, Catalogs, Platform};
pub use schema::{LocatedSchemaFailure, SchemaFailure, SchemaParams};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unified error type for the Gantry editor model.
///
/// These are caller-facing faults, kept strictly separate from the per-entity
/// validation channel (`gantry_model::Errors`) and from the per-document
/// parse-error flag.
#[derive(Debug, thiserror::Error)]
pub enum GantryError {
    #[error("no pipeline with path '{path}' in this workflow")]
    PipelineNotFound { path: String },

    #[error("no entity registered under uid {uid}")]
    EntityNotFound { uid: Uid },

    #[error("the initial pipeline '{path}' cannot be deleted")]
    CannotDeleteInitialPipeline { path: String },

    #[error("the initial pipeline '{path}' cannot change its file path")]
    CannotMoveInitialPipeline { path: String },

    #[error("'{target}' is not a selectable environment type")]
    UnsupportedEnvironmentTarget { target: String },

    #[error("the document failed to parse; structural editing is disabled")]
    DocumentUnparsed,

    #[error("YAML serialization failed: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// A convenience alias for `Result<T, GantryError>`.
pub type Result<T> = std::result::Result<T, GantryError>;

/// Stable, process-wide unique identifier assigned to every addressable
/// entity (pipeline, block, promotion) at construction.
///
/// Cross-entity references (dependency edges, expansion state, selection)
/// are kept by `Uid` rather than by name, so renames never break them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid(Uuid);

impl Uid {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Uid(Uuid::new_v4())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_unique() {
        let a = Uid::new();
        let b = Uid::new();
        assert_ne!(a, b);
    }

    #[test]
    fn error_display_initial_pipeline_guard() {
        let err = GantryError::CannotDeleteInitialPipeline {
            path: ".semaphore/semaphore.yml".into(),
        };
        assert_eq!(
            err.to_string(),
            "the initial pipeline '.semaphore/semaphore.yml' cannot be deleted"
        );
    }

    #[test]
    fn error_display_environment_target() {
        let err = GantryError::UnsupportedEnvironmentTarget {
            target: "unknown".into(),
        };
        assert_eq!(
            err.to_string(),
            "'unknown' is not a selectable environment type"
        );
    }
}
