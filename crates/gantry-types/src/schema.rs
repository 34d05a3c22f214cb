//! Wire shape of the external schema validator's output.
//!
//! The validator itself lives outside this model; it receives the parsed
//! document structure and returns a list of failure records. The model only
//! consumes this shape and maps each record onto a text position.

use serde::{Deserialize, Serialize};

/// One structural validation failure reported by the external validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFailure {
    /// Slash-separated path of object keys / array indices locating the
    /// offending node, e.g. `/blocks/0/task`.
    pub instance_path: String,
    #[serde(default)]
    pub schema_path: String,
    #[serde(default)]
    pub keyword: String,
    pub params: SchemaParams,
    #[serde(default)]
    pub message: String,
}

/// Failure parameters: exactly one of a missing required key or a disallowed
/// extra key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaParams {
    MissingProperty(String),
    AdditionalProperty(String),
}

impl SchemaParams {
    pub fn property(&self) -> &str {
        match self {
            SchemaParams::MissingProperty(p) | SchemaParams::AdditionalProperty(p) => p,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SchemaParams::MissingProperty(_))
    }
}

/// A schema failure resolved to a 1-based line/column in the re-serialized
/// document. Line and column are both `-1` for failures that point at the
/// top of the document (empty instance path, missing key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedSchemaFailure {
    pub failure: SchemaFailure,
    pub line: i64,
    pub column: i64,
}
