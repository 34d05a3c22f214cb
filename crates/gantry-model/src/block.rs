//! Blocks — groups of jobs with shared setup, secrets, and conditions.

use gantry_doc::mapping;
use gantry_types::{Catalogs, Uid};
use serde_yaml::{Mapping, Value};

use crate::agent::Agent;
use crate::dependencies::{BlockDependencies, DependencyRef};
use crate::env_vars::EnvVars;
use crate::errors::Errors;
use crate::job::Job;
use crate::secrets::Secrets;

#[derive(Debug, Clone)]
pub struct Block {
    pub uid: Uid,
    structure: Mapping,
    pub name: String,
    pub dependencies: BlockDependencies,
    pub jobs: Vec<Job>,
    pub agent: Agent,
    /// When set, `agent` is serialized under `task.agent` and overrides the
    /// pipeline-level agent for this block.
    pub override_global_agent: bool,
    pub secrets: Secrets,
    pub env_vars: EnvVars,
    pub prologue: Vec<String>,
    pub epilogue_always: Vec<String>,
    pub epilogue_on_pass: Vec<String>,
    pub epilogue_on_fail: Vec<String>,
    pub skip_condition: String,
    pub run_condition: String,
    pub errors: Errors,
}

impl Block {
    pub fn from_structure(structure: Mapping) -> Self {
        let name = mapping::get_str(&structure, "name")
            .unwrap_or_default()
            .to_string();

        let dependencies = match mapping::get(&structure, "dependencies") {
            None => BlockDependencies::Implicit,
            Some(value) => BlockDependencies::Explicit(
                value
                    .as_sequence()
                    .map(|seq| {
                        seq.iter()
                            .filter_map(Value::as_str)
                            .map(DependencyRef::unresolved)
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
        };

        let task = mapping::get(&structure, "task").and_then(Value::as_mapping);

        let jobs = task
            .and_then(|t| mapping::get(t, "jobs"))
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .enumerate()
                    .map(|(i, v)| Job::from_structure(i, v.as_mapping().cloned().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        let block_agent = task.and_then(|t| mapping::get(t, "agent"));
        let agent = Agent::from_structure(block_agent);
        let override_global_agent = block_agent.is_some();

        let secrets = Secrets::from_structure(task.and_then(|t| mapping::get(t, "secrets")));
        let env_vars = EnvVars::from_structure(task.and_then(|t| mapping::get(t, "env_vars")));

        let commands = |path: &[&str]| {
            task.map(|t| mapping::strings_at(t, path)).unwrap_or_default()
        };

        Block {
            uid: Uid::new(),
            name,
            dependencies,
            jobs,
            agent,
            override_global_agent,
            secrets,
            env_vars,
            prologue: commands(&["prologue", "commands"]),
            epilogue_always: commands(&["epilogue", "always", "commands"]),
            epilogue_on_pass: commands(&["epilogue", "on_pass", "commands"]),
            epilogue_on_fail: commands(&["epilogue", "on_fail", "commands"]),
            skip_condition: mapping::str_at(&structure, &["skip", "when"])
                .unwrap_or_default()
                .to_string(),
            run_condition: mapping::str_at(&structure, &["run", "when"])
                .unwrap_or_default()
                .to_string(),
            errors: Errors::new(),
            structure,
        }
    }

    /// A freshly created block: one empty starter job.
    pub fn new(name: impl Into<String>, dependencies: BlockDependencies) -> Self {
        let mut block = Block::from_structure(Mapping::new());
        block.name = name.into();
        block.dependencies = dependencies;
        block.jobs = vec![Job::new(0, "Job #1", Vec::new())];
        block
    }

    pub fn add_job(&mut self) {
        let index = self.jobs.len();
        self.jobs.push(Job::new(index, format!("Job #{}", index + 1), Vec::new()));
    }

    pub fn remove_job(&mut self, index: usize) {
        if index < self.jobs.len() {
            self.jobs.remove(index);
            for (i, job) in self.jobs.iter_mut().enumerate() {
                job.index = i;
            }
        }
    }

    /// Skip and run conditions are mutually exclusive; setting one clears
    /// the other.
    pub fn change_skip_condition(&mut self, condition: impl Into<String>) {
        self.run_condition = String::new();
        self.skip_condition = condition.into();
    }

    pub fn change_run_condition(&mut self, condition: impl Into<String>) {
        self.skip_condition = String::new();
        self.run_condition = condition.into();
    }

    pub fn clear_conditions(&mut self) {
        self.skip_condition = String::new();
        self.run_condition = String::new();
    }

    pub fn enable_agent_override(&mut self) {
        self.override_global_agent = true;
    }

    pub fn disable_agent_override(&mut self) {
        self.override_global_agent = false;
    }

    /// Validate this block and everything inside it. `duplicate_name` is
    /// decided by the pipeline, which sees all sibling names.
    pub fn validate(&mut self, catalogs: &Catalogs, duplicate_name: bool) {
        self.errors.reset();

        if self.name.is_empty() {
            self.errors.add("name", "Block name can't be blank.");
        } else if duplicate_name {
            self.errors.add("name", "Name must be unique in pipeline.");
        }

        for job in &mut self.jobs {
            job.validate();
        }
        self.env_vars.validate();
        self.secrets.validate(catalogs);

        for job in &self.jobs {
            self.errors
                .add_nested(format!("Job {}", job.index), job.errors.clone());
        }
        self.errors.add_nested("secrets", self.secrets.collected_errors());
        self.errors.add_nested("env_vars", self.env_vars.errors.clone());
    }

    /// True when the block or any of its members failed validation. Member
    /// errors are nested into the block's collector during `validate`.
    pub fn has_errors(&self) -> bool {
        self.errors.exists()
    }

    pub fn to_json(&self) -> Value {
        let mut json = self.structure.clone();

        mapping::set(&mut json, "name", Value::String(self.name.clone()));

        match &self.dependencies {
            BlockDependencies::Implicit => mapping::remove(&mut json, "dependencies"),
            BlockDependencies::Explicit(refs) => {
                let names: Vec<String> = refs.iter().map(|r| r.name.clone()).collect();
                mapping::set(&mut json, "dependencies", mapping::string_sequence(&names));
            }
        }

        set_condition(&mut json, "skip", &self.skip_condition);
        set_condition(&mut json, "run", &self.run_condition);

        let task = mapping::ensure_map(&mut json, "task");

        if self.override_global_agent {
            mapping::set(task, "agent", self.agent.to_json());
        } else {
            mapping::remove(task, "agent");
        }

        if self.secrets.is_empty() {
            mapping::remove(task, "secrets");
        } else {
            mapping::set(task, "secrets", self.secrets.to_json());
        }

        if self.env_vars.is_empty() {
            mapping::remove(task, "env_vars");
        } else {
            mapping::set(task, "env_vars", self.env_vars.to_json());
        }

        set_command_section(task, "prologue", &self.prologue);
        set_epilogue(
            task,
            &self.epilogue_always,
            &self.epilogue_on_pass,
            &self.epilogue_on_fail,
        );

        mapping::set(
            task,
            "jobs",
            Value::Sequence(self.jobs.iter().map(Job::to_json).collect()),
        );

        Value::Mapping(json)
    }
}

fn set_condition(map: &mut Mapping, k: &str, condition: &str) {
    if condition.is_empty() {
        mapping::remove(map, k);
    } else {
        let mut inner = Mapping::new();
        mapping::set(&mut inner, "when", Value::String(condition.to_string()));
        mapping::set(map, k, Value::Mapping(inner));
    }
}

fn set_command_section(map: &mut Mapping, k: &str, commands: &[String]) {
    if commands.is_empty() {
        mapping::remove(map, k);
    } else {
        let mut inner = Mapping::new();
        mapping::set(&mut inner, "commands", mapping::string_sequence(commands));
        mapping::set(map, k, Value::Mapping(inner));
    }
}

fn set_epilogue(map: &mut Mapping, always: &[String], on_pass: &[String], on_fail: &[String]) {
    let mut epilogue = Mapping::new();
    for (k, commands) in [("always", always), ("on_pass", on_pass), ("on_fail", on_fail)] {
        if !commands.is_empty() {
            let mut section = Mapping::new();
            mapping::set(&mut section, "commands", mapping::string_sequence(commands));
            mapping::set(&mut epilogue, k, Value::Mapping(section));
        }
    }
    if epilogue.is_empty() {
        mapping::remove(map, "epilogue");
    } else {
        mapping::set(map, "epilogue", Value::Mapping(epilogue));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(yaml: &str) -> Block {
        Block::from_structure(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn missing_dependencies_key_is_implicit() {
        let b = block("name: A\ntask:\n  jobs: []\n");
        assert!(b.dependencies.is_implicit());
    }

    #[test]
    fn empty_dependency_list_is_explicit_root() {
        let b = block("name: A\ndependencies: []\n");
        assert_eq!(b.dependencies, BlockDependencies::Explicit(vec![]));
    }

    #[test]
    fn explicit_dependencies_keep_document_order() {
        let b = block("name: C\ndependencies: [B, A]\n");
        assert_eq!(b.dependencies.explicit_names(), vec!["B", "A"]);
    }

    #[test]
    fn reads_task_contents() {
        let b = block(
            "name: A\ntask:\n  prologue:\n    commands:\n    - checkout\n  jobs:\n  - name: Test\n    commands:\n    - make test\n",
        );
        assert_eq!(b.prologue, vec!["checkout"]);
        assert_eq!(b.jobs.len(), 1);
        assert_eq!(b.jobs[0].name, "Test");
    }

    #[test]
    fn block_agent_enables_override() {
        let b = block(
            "name: A\ntask:\n  agent:\n    machine:\n      type: e1-standard-2\n  jobs: []\n",
        );
        assert!(b.override_global_agent);
        assert_eq!(b.agent.machine_type, "e1-standard-2");
    }

    #[test]
    fn blank_name_is_an_error() {
        let mut b = block("task:\n  jobs: []\n");
        b.validate(&Catalogs::default(), false);
        assert_eq!(b.errors.list("name"), ["Block name can't be blank."]);
    }

    #[test]
    fn duplicate_name_is_an_error() {
        let mut b = block("name: A\n");
        b.validate(&Catalogs::default(), true);
        assert_eq!(b.errors.list("name"), ["Name must be unique in pipeline."]);
    }

    #[test]
    fn job_errors_surface_through_has_errors() {
        let mut b = block("name: A\ntask:\n  jobs:\n  - name: J\n    parallelism: 0\n");
        b.validate(&Catalogs::default(), false);
        assert!(b.errors.list("name").is_empty());
        assert!(b.has_errors());
    }

    #[test]
    fn new_block_starts_with_one_job() {
        let b = Block::new(
            "Block #2",
            BlockDependencies::Explicit(vec![DependencyRef::unresolved("Block #1")]),
        );
        assert_eq!(b.jobs.len(), 1);
        assert_eq!(b.jobs[0].name, "Job #1");
        assert_eq!(b.dependencies.explicit_names(), vec!["Block #1"]);
    }

    #[test]
    fn implicit_dependencies_stay_out_of_output() {
        let b = block("name: A\ntask:\n  jobs: []\n");
        let json = b.to_json();
        assert!(mapping::get(json.as_mapping().unwrap(), "dependencies").is_none());
    }

    #[test]
    fn skip_condition_round_trips() {
        let mut b = block("name: A\nskip:\n  when: branch = 'master'\n");
        assert_eq!(b.skip_condition, "branch = 'master'");
        b.change_skip_condition("");
        let json = b.to_json();
        assert!(mapping::get(json.as_mapping().unwrap(), "skip").is_none());
    }

    #[test]
    fn unrecognized_task_keys_survive_serialization() {
        let b = block("name: A\ntask:\n  ppl_priority: high\n  jobs: []\n");
        let json = b.to_json();
        let task = json
            .as_mapping()
            .and_then(|m| mapping::get(m, "task"))
            .and_then(Value::as_mapping)
            .unwrap();
        assert_eq!(mapping::get_str(task, "ppl_priority"), Some("high"));
    }

    #[test]
    fn removing_a_job_reindexes_the_rest() {
        let mut b = block(
            "name: A\ntask:\n  jobs:\n  - name: J1\n  - name: J2\n  - name: J3\n",
        );
        b.remove_job(0);
        assert_eq!(b.jobs[0].name, "J2");
        assert_eq!(b.jobs[0].index, 0);
        assert_eq!(b.jobs[1].index, 1);
    }
}
