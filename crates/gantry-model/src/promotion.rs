//! Promotions — named edges from one pipeline document to another.
//!
//! The `pipeline_file` reference is resolved against the owning pipeline's
//! path, so the promotion target survives pipeline renames at the workflow
//! level.

use gantry_doc::{mapping, paths};
use gantry_types::{Catalogs, Uid};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::errors::Errors;

pub const DEFAULT_AUTO_PROMOTE_CONDITION: &str = "branch = 'master' AND result = 'passed'";

/// One promotion parameter, prompted for when the promotion is triggered
/// by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            description: String::new(),
            default_value: String::new(),
            options: Vec::new(),
            required: true,
        }
    }
}

/// The `auto_promote` section. `None` condition means manual-only.
#[derive(Debug, Clone, Default)]
pub struct AutoPromote {
    structure: Mapping,
    condition: Option<String>,
}

impl AutoPromote {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let map = structure
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let condition = if structure.is_some() {
            Some(mapping::get_str(&map, "when").unwrap_or_default().to_string())
        } else {
            None
        };
        AutoPromote { structure: map, condition }
    }

    pub fn is_enabled(&self) -> bool {
        self.condition.is_some()
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn enable(&mut self) {
        if self.condition.is_none() {
            self.condition = Some(DEFAULT_AUTO_PROMOTE_CONDITION.to_string());
        }
    }

    pub fn disable(&mut self) {
        self.condition = None;
    }

    pub fn set_condition(&mut self, condition: impl Into<String>) {
        self.condition = Some(condition.into());
    }

    fn validate(&self) -> Errors {
        let mut errors = Errors::new();
        if let Some(condition) = &self.condition {
            if condition.is_empty() {
                errors.add("when", "When condition can't be empty.");
            }
        }
        errors
    }

    fn to_json(&self) -> Option<Value> {
        let condition = self.condition.as_ref()?;
        let mut m = self.structure.clone();
        mapping::set(&mut m, "when", Value::String(condition.clone()));
        Some(Value::Mapping(m))
    }
}

#[derive(Debug, Clone)]
pub struct Promotion {
    pub uid: Uid,
    structure: Mapping,
    pub name: String,
    /// The reference exactly as written in the document.
    pub target_pipeline_file: String,
    pub deployment_target: String,
    pub auto_promote: AutoPromote,
    pub parameters: Vec<Parameter>,
    pub errors: Errors,
}

impl Promotion {
    pub fn from_structure(structure: Mapping) -> Self {
        let name = mapping::get_str(&structure, "name")
            .unwrap_or_default()
            .to_string();
        let target_pipeline_file = mapping::get_str(&structure, "pipeline_file")
            .unwrap_or_default()
            .to_string();
        let deployment_target = mapping::get_str(&structure, "deployment_target")
            .unwrap_or_default()
            .to_string();
        let auto_promote = AutoPromote::from_structure(mapping::get(&structure, "auto_promote"));
        let parameters = mapping::get_path(&structure, &["parameters", "env_vars"])
            .and_then(|v| serde_yaml::from_value::<Vec<Parameter>>(v.clone()).ok())
            .unwrap_or_default();

        Promotion {
            uid: Uid::new(),
            name,
            target_pipeline_file,
            deployment_target,
            auto_promote,
            parameters,
            errors: Errors::new(),
            structure,
        }
    }

    pub fn new(name: impl Into<String>, pipeline_file: impl Into<String>) -> Self {
        let mut promotion = Promotion::from_structure(Mapping::new());
        promotion.name = name.into();
        promotion.target_pipeline_file = pipeline_file.into();
        promotion
    }

    /// The workflow-relative path of the target document, resolved against
    /// the owning pipeline's path.
    pub fn target_pipeline_path(&self, owner_path: &str) -> String {
        paths::resolve_reference(owner_path, &self.target_pipeline_file)
    }

    /// Point this promotion at a (possibly moved) target document.
    pub fn retarget(&mut self, owner_path: &str, target_path: &str) {
        self.target_pipeline_file = paths::reference_for(owner_path, target_path);
    }

    pub fn change_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn change_deployment_target(&mut self, target: impl Into<String>) {
        self.deployment_target = target.into();
    }

    pub fn add_parameter(&mut self, name: impl Into<String>) {
        self.parameters.push(Parameter::named(name));
    }

    pub fn update_parameter(&mut self, index: usize, parameter: Parameter) {
        if let Some(slot) = self.parameters.get_mut(index) {
            *slot = parameter;
        }
    }

    pub fn remove_parameter(&mut self, index: usize) {
        if index < self.parameters.len() {
            self.parameters.remove(index);
        }
    }

    pub fn validate(&mut self, catalogs: &Catalogs) {
        self.errors.reset();

        if self.name.is_empty() {
            self.errors.add("name", "Promotion name can't be blank.");
        }

        if !self.deployment_target.is_empty()
            && !catalogs.has_deployment_target(&self.deployment_target)
        {
            self.errors.add(
                "deployment_target",
                format!(
                    "Deployment target \"{}\" is not available for this project",
                    self.deployment_target
                ),
            );
        }

        self.errors
            .add_nested("Auto Promotion", self.auto_promote.validate());
    }

    pub fn to_json(&self) -> Value {
        let mut json = self.structure.clone();

        mapping::set(&mut json, "name", Value::String(self.name.clone()));
        mapping::set(
            &mut json,
            "pipeline_file",
            Value::String(self.target_pipeline_file.clone()),
        );

        if self.deployment_target.is_empty() {
            mapping::remove(&mut json, "deployment_target");
        } else {
            mapping::set(
                &mut json,
                "deployment_target",
                Value::String(self.deployment_target.clone()),
            );
        }

        match self.auto_promote.to_json() {
            Some(value) => mapping::set(&mut json, "auto_promote", value),
            None => mapping::remove(&mut json, "auto_promote"),
        }

        if self.parameters.is_empty() {
            mapping::remove(&mut json, "parameters");
        } else {
            // Parameter serializes to plain mappings, which cannot fail
            let env_vars = serde_yaml::to_value(&self.parameters).unwrap_or(Value::Null);
            let parameters = mapping::ensure_map(&mut json, "parameters");
            mapping::set(parameters, "env_vars", env_vars);
        }

        Value::Mapping(json)
    }
}
