//! Secret references attached to blocks.
//!
//! Stored as a deduplicated, lexicographically sorted name list. Validation
//! checks every name against the injected secret catalog; an unknown name is
//! an error on that secret, not on the collection.

use gantry_doc::mapping;
use gantry_types::Catalogs;
use serde_yaml::{Mapping, Value};

use crate::errors::Errors;

#[derive(Debug, Clone)]
pub struct Secret {
    structure: Mapping,
    pub name: String,
    pub errors: Errors,
}

impl Secret {
    fn named(name: impl Into<String>) -> Self {
        Secret {
            structure: Mapping::new(),
            name: name.into(),
            errors: Errors::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    items: Vec<Secret>,
}

impl Secrets {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let items = structure
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(Value::as_mapping)
                    .map(|m| Secret {
                        structure: m.clone(),
                        name: mapping::get_str(m, "name").unwrap_or_default().to_string(),
                        errors: Errors::new(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Secrets { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn includes(&self, name: &str) -> bool {
        self.items.iter().any(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn items(&self) -> &[Secret] {
        &self.items
    }

    /// Add a secret by name, keeping the list unique and sorted.
    pub fn add(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.includes(&name) {
            return;
        }
        self.items.push(Secret::named(name));
        self.items.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn remove(&mut self, name: &str) {
        self.items.retain(|s| s.name != name);
    }

    pub fn validate(&mut self, catalogs: &Catalogs) {
        for secret in &mut self.items {
            secret.errors.reset();
            if !catalogs.has_secret(&secret.name) {
                secret.errors.add(
                    "name",
                    "Secret is not available for this project or does not exist in the organization",
                );
            }
        }
    }

    /// Errors of all member secrets, keyed by secret name.
    pub fn collected_errors(&self) -> Errors {
        let mut collected = Errors::new();
        for secret in &self.items {
            collected.add_nested(secret.name.clone(), secret.errors.clone());
        }
        collected
    }

    pub fn to_json(&self) -> Value {
        Value::Sequence(
            self.items
                .iter()
                .map(|s| {
                    let mut m = s.structure.clone();
                    mapping::set(&mut m, "name", Value::String(s.name.clone()));
                    Value::Mapping(m)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_catalogs() -> Catalogs {
        Catalogs {
            secret_names: vec!["a".into()],
            ..Catalogs::default()
        }
    }

    fn from_yaml(yaml: &str) -> Secrets {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        Secrets::from_structure(Some(&value))
    }

    #[test]
    fn reads_initial_structure() {
        let secrets = from_yaml("- name: a\n- name: b\n");
        assert_eq!(secrets.names(), vec!["a", "b"]);
    }

    #[test]
    fn is_empty_reflects_contents() {
        assert!(Secrets::default().is_empty());
        assert!(!from_yaml("- name: abc\n").is_empty());
    }

    #[test]
    fn includes_finds_by_name() {
        let secrets = from_yaml("- name: A\n");
        assert!(secrets.includes("A"));
        assert!(!secrets.includes("B"));
    }

    #[test]
    fn add_keeps_names_unique() {
        let mut secrets = Secrets::default();
        secrets.add("abc");
        secrets.add("abc");
        secrets.add("abc");
        assert_eq!(secrets.names(), vec!["abc"]);
    }

    #[test]
    fn add_keeps_names_sorted() {
        let mut secrets = Secrets::default();
        secrets.add("b");
        secrets.add("a");
        secrets.add("c");
        assert_eq!(secrets.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_by_name() {
        let mut secrets = from_yaml("- name: a\n- name: b\n");
        secrets.remove("a");
        assert_eq!(secrets.names(), vec!["b"]);
        secrets.remove("b");
        assert!(secrets.is_empty());
    }

    #[test]
    fn unknown_secret_name_is_an_error() {
        let mut secrets = from_yaml("- name: a\n- name: b\n");
        secrets.validate(&test_catalogs());

        assert!(secrets.items()[0].errors.list("name").is_empty());
        assert_eq!(
            secrets.items()[1].errors.list("name"),
            ["Secret is not available for this project or does not exist in the organization"]
        );
    }

    #[test]
    fn passthrough_keys_survive_serialization() {
        let secrets = from_yaml("- name: a\n  env_var_names:\n  - FOO\n");
        let json = secrets.to_json();
        let first = json.as_sequence().unwrap()[0].as_mapping().unwrap();
        assert!(mapping::get(first, "env_var_names").is_some());
    }
}
