//! Pipeline-level value objects: execution time limit, fail-fast,
//! auto-cancel, global job config, and the after-pipeline task.
//!
//! Each one reads itself out of the parsed structure, answers `is_defined`,
//! and serializes back to exactly the keys it owns; the pipeline omits the
//! whole section when a value object is undefined.

use gantry_doc::mapping;
use serde_yaml::{Mapping, Value};

use crate::job::Job;

/// Unit of an execution time limit. `hours` and `minutes` are mutually
/// exclusive in the document; the enum makes any other unit unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Minutes,
}

impl TimeUnit {
    fn key(&self) -> &'static str {
        match self {
            TimeUnit::Hours => "hours",
            TimeUnit::Minutes => "minutes",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionTimeLimit {
    value: Option<i64>,
    unit: TimeUnit,
}

impl ExecutionTimeLimit {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let map = structure.and_then(Value::as_mapping);

        if let Some(hours) = map.and_then(|m| mapping::get(m, "hours")).and_then(Value::as_i64) {
            return ExecutionTimeLimit { value: Some(hours), unit: TimeUnit::Hours };
        }
        if let Some(minutes) = map.and_then(|m| mapping::get(m, "minutes")).and_then(Value::as_i64)
        {
            return ExecutionTimeLimit { value: Some(minutes), unit: TimeUnit::Minutes };
        }
        ExecutionTimeLimit { value: None, unit: TimeUnit::Hours }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn set(&mut self, value: i64, unit: TimeUnit) {
        self.value = Some(value);
        self.unit = unit;
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn to_json(&self) -> Value {
        let mut m = Mapping::new();
        if let Some(value) = self.value {
            mapping::set(&mut m, self.unit.key(), Value::from(value));
        }
        Value::Mapping(m)
    }
}

/// `fail_fast`: stop or cancel the rest of the pipeline when a block fails.
#[derive(Debug, Clone, Default)]
pub struct FailFast {
    pub stop_when: String,
    pub cancel_when: String,
}

impl FailFast {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let map = structure.and_then(Value::as_mapping);
        FailFast {
            stop_when: when_at(map, "stop"),
            cancel_when: when_at(map, "cancel"),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.stop_when.is_empty() || !self.cancel_when.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut m = Mapping::new();
        set_when(&mut m, "stop", &self.stop_when);
        set_when(&mut m, "cancel", &self.cancel_when);
        Value::Mapping(m)
    }
}

/// `auto_cancel`: cancel queued or running pipelines superseded by a newer one.
#[derive(Debug, Clone, Default)]
pub struct AutoCancel {
    pub running_when: String,
    pub queued_when: String,
}

impl AutoCancel {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let map = structure.and_then(Value::as_mapping);
        AutoCancel {
            running_when: when_at(map, "running"),
            queued_when: when_at(map, "queued"),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.running_when.is_empty() || !self.queued_when.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut m = Mapping::new();
        set_when(&mut m, "running", &self.running_when);
        set_when(&mut m, "queued", &self.queued_when);
        Value::Mapping(m)
    }
}

fn when_at(map: Option<&Mapping>, section: &str) -> String {
    map.and_then(|m| mapping::str_at(m, &[section, "when"]))
        .unwrap_or_default()
        .to_string()
}

fn set_when(map: &mut Mapping, section: &str, condition: &str) {
    if condition.is_empty() {
        return;
    }
    let mut inner = Mapping::new();
    mapping::set(&mut inner, "when", Value::String(condition.to_string()));
    mapping::set(map, section, Value::Mapping(inner));
}

/// `global_job_config`: prologue/epilogue command lists shared by all blocks.
#[derive(Debug, Clone, Default)]
pub struct GlobalJobConfig {
    pub prologue: Vec<String>,
    pub epilogue_always: Vec<String>,
    pub epilogue_on_pass: Vec<String>,
    pub epilogue_on_fail: Vec<String>,
}

impl GlobalJobConfig {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let map = structure.and_then(Value::as_mapping);
        let commands = |path: &[&str]| {
            map.map(|m| mapping::strings_at(m, path)).unwrap_or_default()
        };

        GlobalJobConfig {
            prologue: commands(&["prologue", "commands"]),
            epilogue_always: commands(&["epilogue", "always", "commands"]),
            epilogue_on_pass: commands(&["epilogue", "on_pass", "commands"]),
            epilogue_on_fail: commands(&["epilogue", "on_fail", "commands"]),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.prologue.is_empty()
            || !self.epilogue_always.is_empty()
            || !self.epilogue_on_pass.is_empty()
            || !self.epilogue_on_fail.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut m = Mapping::new();

        if !self.prologue.is_empty() {
            let mut prologue = Mapping::new();
            mapping::set(&mut prologue, "commands", mapping::string_sequence(&self.prologue));
            mapping::set(&mut m, "prologue", Value::Mapping(prologue));
        }

        let mut epilogue = Mapping::new();
        for (key, commands) in [
            ("always", &self.epilogue_always),
            ("on_pass", &self.epilogue_on_pass),
            ("on_fail", &self.epilogue_on_fail),
        ] {
            if !commands.is_empty() {
                let mut section = Mapping::new();
                mapping::set(&mut section, "commands", mapping::string_sequence(commands));
                mapping::set(&mut epilogue, key, Value::Mapping(section));
            }
        }
        if !epilogue.is_empty() {
            mapping::set(&mut m, "epilogue", Value::Mapping(epilogue));
        }

        Value::Mapping(m)
    }
}

/// `after_pipeline`: jobs that run once every block has finished.
#[derive(Debug, Clone, Default)]
pub struct AfterPipeline {
    pub jobs: Vec<Job>,
}

impl AfterPipeline {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let jobs = structure
            .and_then(Value::as_mapping)
            .and_then(|m| mapping::get_path(m, &["task", "jobs"]))
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .enumerate()
                    .map(|(i, v)| {
                        Job::from_structure(i, v.as_mapping().cloned().unwrap_or_default())
                    })
                    .collect()
            })
            .unwrap_or_default();

        AfterPipeline { jobs }
    }

    pub fn is_defined(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut task = Mapping::new();
        mapping::set(
            &mut task,
            "jobs",
            Value::Sequence(self.jobs.iter().map(Job::to_json).collect()),
        );
        let mut m = Mapping::new();
        mapping::set(&mut m, "task", Value::Mapping(task));
        Value::Mapping(m)
    }
}
