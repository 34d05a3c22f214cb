//! Document-level utilities for the Gantry editor model.
//!
//! Everything here operates on text or on ordered YAML mappings and knows
//! nothing about the object graph: line-ending detection and enforcement,
//! promotion path resolution, preferred key ordering, and the best-effort
//! mapping of schema failures onto line/column positions.

pub mod line_endings;
pub mod locate;
pub mod mapping;
pub mod paths;

pub use line_endings::LineEnding;
pub use locate::locate_failure;
