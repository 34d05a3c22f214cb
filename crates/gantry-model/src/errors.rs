//! Per-entity validation error collector.
//!
//! Every validated entity owns one of these. `validate()` resets and refills
//! it, so no error survives two validation passes unless its condition still
//! holds. Child entities nest their own collectors under a display name
//! (e.g. a block nests its secrets' and dependencies' errors).

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Errors {
    fields: BTreeMap<String, Vec<String>>,
    nested: BTreeMap<String, Errors>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything collected so far.
    pub fn reset(&mut self) {
        self.fields.clear();
        self.nested.clear();
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_default().push(message.into());
    }

    /// Attach a child collector under `name`. Empty children are ignored.
    pub fn add_nested(&mut self, name: impl Into<String>, child: Errors) {
        if child.exists() {
            self.nested.insert(name.into(), child);
        }
    }

    /// True when any error was collected, here or in a nested child.
    pub fn exists(&self) -> bool {
        !self.fields.is_empty() || self.nested.values().any(Errors::exists)
    }

    pub fn list(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nested(&self, name: &str) -> Option<&Errors> {
        self.nested.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_collector_has_no_errors() {
        let errors = Errors::new();
        assert!(!errors.exists());
        assert!(errors.list("name").is_empty());
    }

    #[test]
    fn add_and_list() {
        let mut errors = Errors::new();
        errors.add("name", "Block name can't be blank.");
        errors.add("name", "Name must be unique in pipeline.");
        assert!(errors.exists());
        assert_eq!(errors.list("name").len(), 2);
        assert!(errors.list("other").is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut errors = Errors::new();
        errors.add("name", "bad");
        let mut child = Errors::new();
        child.add("x", "bad");
        errors.add_nested("secrets", child);

        errors.reset();
        assert!(!errors.exists());
        assert!(errors.nested("secrets").is_none());
    }

    #[test]
    fn nested_errors_count_as_existing() {
        let mut errors = Errors::new();
        let mut child = Errors::new();
        child.add("name", "unavailable");
        errors.add_nested("secrets", child);

        assert!(errors.exists());
        assert_eq!(errors.nested("secrets").unwrap().list("name").len(), 1);
    }

    #[test]
    fn empty_nested_child_is_dropped() {
        let mut errors = Errors::new();
        errors.add_nested("secrets", Errors::new());
        assert!(!errors.exists());
        assert!(errors.nested("secrets").is_none());
    }
}
