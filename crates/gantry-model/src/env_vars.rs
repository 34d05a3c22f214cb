//! Environment-variable collections attached to blocks.

use gantry_doc::mapping;
use serde_yaml::{Mapping, Value};

use crate::errors::Errors;

#[derive(Debug, Clone, PartialEq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    items: Vec<EnvVar>,
    pub errors: Errors,
}

impl EnvVars {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let items = structure
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(Value::as_mapping)
                    .map(|m| EnvVar {
                        name: mapping::get_str(m, "name").unwrap_or_default().to_string(),
                        value: mapping::get_str(m, "value").unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        EnvVars {
            items,
            errors: Errors::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[EnvVar] {
        &self.items
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.items.push(EnvVar {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn change(&mut self, index: usize, name: impl Into<String>, value: impl Into<String>) {
        if let Some(var) = self.items.get_mut(index) {
            var.name = name.into();
            var.value = value.into();
        }
    }

    pub fn remove(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
        }
    }

    pub fn validate(&mut self) {
        self.errors.reset();
        for var in &self.items {
            if var.name.is_empty() {
                self.errors
                    .add("name", "Environment variable name can't be blank.");
            }
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Sequence(
            self.items
                .iter()
                .map(|var| {
                    let mut m = Mapping::new();
                    mapping::set(&mut m, "name", Value::String(var.name.clone()));
                    mapping::set(&mut m, "value", Value::String(var.value.clone()));
                    Value::Mapping(m)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> EnvVars {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        EnvVars::from_structure(Some(&value))
    }

    #[test]
    fn reads_name_value_pairs() {
        let vars = from_yaml("- name: RACK_ENV\n  value: test\n");
        assert_eq!(vars.items().len(), 1);
        assert_eq!(vars.items()[0].name, "RACK_ENV");
        assert_eq!(vars.items()[0].value, "test");
    }

    #[test]
    fn absent_structure_is_empty() {
        let vars = EnvVars::from_structure(None);
        assert!(vars.is_empty());
    }

    #[test]
    fn change_updates_in_place() {
        let mut vars = from_yaml("- name: A\n  value: '1'\n");
        vars.change(0, "B", "2");
        assert_eq!(vars.items()[0], EnvVar { name: "B".into(), value: "2".into() });
    }

    #[test]
    fn blank_name_is_an_error() {
        let mut vars = EnvVars::default();
        vars.add("", "value");
        vars.validate();
        assert_eq!(
            vars.errors.list("name"),
            ["Environment variable name can't be blank."]
        );
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut vars = EnvVars::default();
        vars.add("B", "2");
        vars.add("A", "1");
        let json = vars.to_json();
        let names: Vec<_> = json
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_mapping().and_then(|m| mapping::get_str(m, "name")).unwrap())
            .collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
