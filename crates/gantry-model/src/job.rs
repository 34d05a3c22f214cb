//! Jobs — the leaf execution units inside a block.

use gantry_doc::mapping;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::errors::Errors;

/// One axis of a job matrix: a variable and the values it ranges over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub env_var: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Job {
    structure: Mapping,
    pub index: usize,
    pub name: String,
    pub commands: Vec<String>,
    pub parallelism: Option<i64>,
    pub matrix: Option<Vec<MatrixEntry>>,
    pub errors: Errors,
}

impl Job {
    pub fn from_structure(index: usize, structure: Mapping) -> Self {
        let name = mapping::get_str(&structure, "name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Nameless {}", index + 1));
        let commands = mapping::strings_at(&structure, &["commands"]);
        let parallelism = mapping::get(&structure, "parallelism").and_then(Value::as_i64);
        let matrix = mapping::get(&structure, "matrix")
            .and_then(|v| serde_yaml::from_value::<Vec<MatrixEntry>>(v.clone()).ok());

        Job {
            structure,
            index,
            name,
            commands,
            parallelism,
            matrix,
            errors: Errors::new(),
        }
    }

    pub fn new(index: usize, name: impl Into<String>, commands: Vec<String>) -> Self {
        Job {
            structure: Mapping::new(),
            index,
            name: name.into(),
            commands,
            parallelism: None,
            matrix: None,
            errors: Errors::new(),
        }
    }

    pub fn change_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn change_commands(&mut self, commands: Vec<String>) {
        self.commands = commands;
    }

    pub fn change_parallelism(&mut self, count: i64) {
        self.parallelism = Some(count);
    }

    pub fn disable_parallelism(&mut self) {
        self.parallelism = None;
    }

    pub fn change_matrix(&mut self, matrix: Vec<MatrixEntry>) {
        self.matrix = Some(matrix);
    }

    pub fn disable_matrix(&mut self) {
        self.matrix = None;
    }

    pub fn validate(&mut self) {
        self.errors.reset();

        if let Some(parallelism) = self.parallelism {
            if parallelism < 1 {
                self.errors
                    .add("parallelism", "Parallelism must be larger than 0");
            }
        }

        if let Some(matrix) = &self.matrix {
            for entry in matrix {
                if entry.env_var.is_empty() {
                    self.errors
                        .add("matrix", "Matrix variable name can't be blank.");
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        let mut json = self.structure.clone();

        mapping::set(&mut json, "name", Value::String(self.name.clone()));
        mapping::set(&mut json, "commands", mapping::string_sequence(&self.commands));

        match self.parallelism {
            Some(count) => mapping::set(&mut json, "parallelism", Value::from(count)),
            None => mapping::remove(&mut json, "parallelism"),
        }

        match &self.matrix {
            Some(matrix) => {
                // MatrixEntry serializes to plain mappings, which cannot fail
                let value = serde_yaml::to_value(matrix).unwrap_or(Value::Null);
                mapping::set(&mut json, "matrix", value);
            }
            None => mapping::remove(&mut json, "matrix"),
        }

        Value::Mapping(json)
    }
}
