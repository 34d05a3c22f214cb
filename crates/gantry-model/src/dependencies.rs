//! Block dependency lists.
//!
//! A block either inherits the implicit sequential chain (no `dependencies`
//! key in the document) or carries an explicit list of block names. Explicit
//! entries also hold the uid of the block they were resolved to, so renames
//! can rewrite referring lists without guessing by name.

use gantry_types::Uid;

/// One explicit dependency: the name written in the document plus the uid of
/// the block it resolved to, when one with that name exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub name: String,
    pub target: Option<Uid>,
}

impl DependencyRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        DependencyRef {
            name: name.into(),
            target: None,
        }
    }

    pub fn resolved(name: impl Into<String>, target: Uid) -> Self {
        DependencyRef {
            name: name.into(),
            target: Some(target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BlockDependencies {
    /// Run after the previous block in document order.
    #[default]
    Implicit,
    /// Run after the named blocks; an empty list is a root block.
    Explicit(Vec<DependencyRef>),
}

impl BlockDependencies {
    pub fn is_implicit(&self) -> bool {
        matches!(self, BlockDependencies::Implicit)
    }

    pub fn explicit_names(&self) -> Vec<&str> {
        match self {
            BlockDependencies::Implicit => Vec::new(),
            BlockDependencies::Explicit(refs) => refs.iter().map(|r| r.name.as_str()).collect(),
        }
    }
}
