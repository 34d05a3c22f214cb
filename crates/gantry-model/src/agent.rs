//! Agents — where a pipeline (or a single block) runs.
//!
//! The agent is a machine type / OS image pair plus an optional container
//! list. Its environment type is derived, never stored: the presence of
//! containers means docker, otherwise the machine type's platform in the
//! injected catalog decides.

use gantry_doc::mapping;
use gantry_types::{AgentCatalog, GantryError, Platform, Result};
use serde_yaml::{Mapping, Value};

pub const DEFAULT_LINUX_MACHINE_TYPE: &str = "e1-standard-2";
pub const DEFAULT_MAC_MACHINE_TYPE: &str = "a1-standard-4";
pub const DEFAULT_DOCKER_IMAGE: &str = "semaphoreci/ubuntu:20.04";

/// Derived runtime environment of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentType {
    Docker,
    LinuxVm,
    MacVm,
    SelfHosted,
    /// No machine-type catalog was injected; nothing can be derived.
    Unavailable,
    /// The machine type is not listed in the catalog.
    Unknown,
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::Docker => "docker",
            EnvironmentType::LinuxVm => "linux-vm",
            EnvironmentType::MacVm => "mac-vm",
            EnvironmentType::SelfHosted => "self-hosted",
            EnvironmentType::Unavailable => "unavailable",
            EnvironmentType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Container {
    structure: Mapping,
    pub name: String,
    pub image: String,
}

impl Container {
    fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Container {
            structure: Mapping::new(),
            name: name.into(),
            image: image.into(),
        }
    }

    fn from_structure(structure: &Mapping) -> Self {
        Container {
            structure: structure.clone(),
            name: mapping::get_str(structure, "name").unwrap_or_default().to_string(),
            image: mapping::get_str(structure, "image").unwrap_or_default().to_string(),
        }
    }

    fn to_json(&self) -> Value {
        let mut m = self.structure.clone();
        mapping::set(&mut m, "name", Value::String(self.name.clone()));
        if self.image.is_empty() {
            mapping::remove(&mut m, "image");
        } else {
            mapping::set(&mut m, "image", Value::String(self.image.clone()));
        }
        Value::Mapping(m)
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    structure: Mapping,
    pub machine_type: String,
    pub os_image: String,
    containers: Vec<Container>,
}

impl Agent {
    pub fn from_structure(structure: Option<&Value>) -> Self {
        let map = structure
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();

        let machine_type = mapping::str_at(&map, &["machine", "type"])
            .unwrap_or_default()
            .to_string();
        let os_image = mapping::str_at(&map, &["machine", "os_image"])
            .unwrap_or_default()
            .to_string();
        let containers = mapping::get(&map, "containers")
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(Value::as_mapping)
                    .map(Container::from_structure)
                    .collect()
            })
            .unwrap_or_default();

        Agent {
            structure: map,
            machine_type,
            os_image,
            containers,
        }
    }

    /// The agent a freshly created pipeline starts with.
    pub fn new_default(catalog: &AgentCatalog) -> Self {
        Agent {
            structure: Mapping::new(),
            machine_type: DEFAULT_LINUX_MACHINE_TYPE.to_string(),
            os_image: catalog.default_os_image(DEFAULT_LINUX_MACHINE_TYPE).to_string(),
            containers: Vec::new(),
        }
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn environment_type(&self, catalog: &AgentCatalog) -> EnvironmentType {
        if catalog.is_empty() {
            return EnvironmentType::Unavailable;
        }
        if !self.containers.is_empty() {
            return EnvironmentType::Docker;
        }
        if catalog.has_machine_type(Platform::Linux, &self.machine_type) {
            return EnvironmentType::LinuxVm;
        }
        if catalog.has_machine_type(Platform::Mac, &self.machine_type) {
            return EnvironmentType::MacVm;
        }
        if catalog.is_self_hosted(&self.machine_type) {
            return EnvironmentType::SelfHosted;
        }
        EnvironmentType::Unknown
    }

    /// Move the agent into another environment, installing that environment's
    /// defaults. `Unavailable` and `Unknown` are derived states, not valid
    /// targets.
    pub fn change_environment_type(
        &mut self,
        target: EnvironmentType,
        catalog: &AgentCatalog,
    ) -> Result<()> {
        match target {
            EnvironmentType::Docker => {
                self.machine_type = DEFAULT_LINUX_MACHINE_TYPE.to_string();
                self.os_image = catalog.default_os_image(&self.machine_type).to_string();
                self.containers = vec![Container::new("main", DEFAULT_DOCKER_IMAGE)];
            }
            EnvironmentType::LinuxVm => {
                self.machine_type = DEFAULT_LINUX_MACHINE_TYPE.to_string();
                self.os_image = catalog.default_os_image(&self.machine_type).to_string();
                self.containers.clear();
            }
            EnvironmentType::MacVm => {
                self.machine_type = DEFAULT_MAC_MACHINE_TYPE.to_string();
                self.os_image = catalog.default_os_image(&self.machine_type).to_string();
                self.containers.clear();
            }
            EnvironmentType::SelfHosted => {
                self.machine_type = catalog
                    .machine_types(Platform::SelfHosted)
                    .first()
                    .map(|t| t.to_string())
                    .unwrap_or_default();
                self.os_image = String::new();
                self.containers.clear();
            }
            EnvironmentType::Unavailable | EnvironmentType::Unknown => {
                return Err(GantryError::UnsupportedEnvironmentTarget {
                    target: target.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Switch machine type, keeping the OS image when the new type still
    /// offers it.
    pub fn change_machine_type(&mut self, machine_type: impl Into<String>, catalog: &AgentCatalog) {
        self.machine_type = machine_type.into();

        if catalog.is_self_hosted(&self.machine_type) {
            self.os_image = String::new();
        } else if !catalog.os_images(&self.machine_type).contains(&self.os_image.as_str()) {
            self.os_image = catalog.default_os_image(&self.machine_type).to_string();
        }
    }

    pub fn change_os_image(&mut self, os_image: impl Into<String>) {
        self.os_image = os_image.into();
    }

    /// Append a container. The first is named `main`, the rest `c2`, `c3`…
    pub fn add_container(&mut self) {
        let name = if self.containers.is_empty() {
            "main".to_string()
        } else {
            format!("c{}", self.containers.len() + 1)
        };
        self.containers.push(Container::new(name, ""));
    }

    pub fn remove_container(&mut self, index: usize) {
        if index < self.containers.len() {
            self.containers.remove(index);
        }
    }

    pub fn change_container_name(&mut self, index: usize, name: impl Into<String>) {
        if let Some(container) = self.containers.get_mut(index) {
            container.name = name.into();
        }
    }

    pub fn change_container_image(&mut self, index: usize, image: impl Into<String>) {
        if let Some(container) = self.containers.get_mut(index) {
            container.image = image.into();
        }
    }

    pub fn to_json(&self) -> Value {
        let mut json = self.structure.clone();

        let machine = mapping::ensure_map(&mut json, "machine");
        mapping::set(machine, "type", Value::String(self.machine_type.clone()));
        mapping::set(machine, "os_image", Value::String(self.os_image.clone()));

        if self.containers.is_empty() {
            mapping::remove(&mut json, "containers");
        } else {
            mapping::set(
                &mut json,
                "containers",
                Value::Sequence(self.containers.iter().map(Container::to_json).collect()),
            );
        }

        Value::Mapping(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_types::AgentTypeEntry;

    fn catalog() -> AgentCatalog {
        AgentCatalog {
            agent_types: vec![
                AgentTypeEntry {
                    machine_type: "e1-standard-2".into(),
                    spec: "2 vCPU, 4 GB ram".into(),
                    os_image: "ubuntu1804".into(),
                    platform: Platform::Linux,
                },
                AgentTypeEntry {
                    machine_type: "e1-standard-2".into(),
                    spec: "2 vCPU, 4 GB ram".into(),
                    os_image: "ubuntu2004".into(),
                    platform: Platform::Linux,
                },
                AgentTypeEntry {
                    machine_type: "a1-standard-4".into(),
                    spec: "4 vCPU, 8 GB ram".into(),
                    os_image: "macos-xcode13".into(),
                    platform: Platform::Mac,
                },
                AgentTypeEntry {
                    machine_type: "s1-aws".into(),
                    spec: String::new(),
                    os_image: String::new(),
                    platform: Platform::SelfHosted,
                },
            ],
            default_linux_os_image: "ubuntu2004".into(),
            default_mac_os_image: "macos-xcode13".into(),
        }
    }

    fn agent(yaml: &str) -> Agent {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        Agent::from_structure(Some(&value))
    }

    #[test]
    fn reads_machine_type_and_os_image() {
        let a = agent("machine:\n  type: e1-standard-2\n  os_image: ubuntu1804\n");
        assert_eq!(a.machine_type, "e1-standard-2");
        assert_eq!(a.os_image, "ubuntu1804");
        assert_eq!(a.environment_type(&catalog()), EnvironmentType::LinuxVm);
    }

    #[test]
    fn containers_mean_docker() {
        let a = agent(
            "machine:\n  type: e1-standard-2\n  os_image: ubuntu1804\ncontainers:\n- name: main\n  image: ruby:2.6\n",
        );
        assert_eq!(a.environment_type(&catalog()), EnvironmentType::Docker);
        assert_eq!(a.containers()[0].image, "ruby:2.6");
    }

    #[test]
    fn empty_catalog_means_unavailable() {
        let a = agent("machine:\n  type: e1-standard-2\n");
        assert_eq!(
            a.environment_type(&AgentCatalog::default()),
            EnvironmentType::Unavailable
        );
    }

    #[test]
    fn unlisted_machine_type_means_unknown() {
        let a = agent("machine:\n  type: z9-mystery\n");
        assert_eq!(a.environment_type(&catalog()), EnvironmentType::Unknown);
    }

    #[test]
    fn switching_to_docker_installs_a_main_container() {
        let mut a = agent("machine:\n  type: a1-standard-4\n  os_image: macos-xcode13\n");
        a.change_environment_type(EnvironmentType::Docker, &catalog()).unwrap();
        assert_eq!(a.machine_type, DEFAULT_LINUX_MACHINE_TYPE);
        assert_eq!(a.containers().len(), 1);
        assert_eq!(a.containers()[0].name, "main");
        assert_eq!(a.containers()[0].image, DEFAULT_DOCKER_IMAGE);
    }

    #[test]
    fn switching_to_linux_vm_installs_linux_defaults() {
        let mut a = agent(
            "machine:\n  type: a1-standard-4\n  os_image: macos-xcode13\ncontainers:\n- name: main\n  image: ruby:2.6\n",
        );
        a.change_environment_type(EnvironmentType::LinuxVm, &catalog()).unwrap();
        assert_eq!(a.machine_type, DEFAULT_LINUX_MACHINE_TYPE);
        assert_eq!(a.os_image, "ubuntu2004");
        assert!(a.containers().is_empty());
        assert_eq!(a.environment_type(&catalog()), EnvironmentType::LinuxVm);
    }

    #[test]
    fn switching_to_mac_vm_installs_mac_defaults() {
        let mut a = agent("machine:\n  type: e1-standard-2\n  os_image: ubuntu2004\n");
        a.change_environment_type(EnvironmentType::MacVm, &catalog()).unwrap();
        assert_eq!(a.machine_type, DEFAULT_MAC_MACHINE_TYPE);
        assert_eq!(a.os_image, "macos-xcode13");
        assert_eq!(a.environment_type(&catalog()), EnvironmentType::MacVm);
    }

    #[test]
    fn switching_to_self_hosted_takes_first_catalog_entry() {
        let mut a = agent("machine:\n  type: e1-standard-2\n  os_image: ubuntu2004\n");
        a.change_environment_type(EnvironmentType::SelfHosted, &catalog()).unwrap();
        assert_eq!(a.machine_type, "s1-aws");
        assert_eq!(a.os_image, "");
        assert_eq!(a.environment_type(&catalog()), EnvironmentType::SelfHosted);
    }

    #[test]
    fn derived_states_are_not_valid_targets() {
        let mut a = agent("machine:\n  type: e1-standard-2\n");
        assert!(a
            .change_environment_type(EnvironmentType::Unknown, &catalog())
            .is_err());
        assert!(a
            .change_environment_type(EnvironmentType::Unavailable, &catalog())
            .is_err());
    }

    #[test]
    fn machine_type_change_keeps_still_valid_os_image() {
        let mut a = agent("machine:\n  type: e1-standard-2\n  os_image: ubuntu1804\n");
        a.change_machine_type("e1-standard-2", &catalog());
        assert_eq!(a.os_image, "ubuntu1804");
    }

    #[test]
    fn machine_type_change_resets_invalid_os_image() {
        let mut a = agent("machine:\n  type: a1-standard-4\n  os_image: macos-xcode13\n");
        a.change_machine_type("e1-standard-2", &catalog());
        assert_eq!(a.os_image, "ubuntu2004");
    }

    #[test]
    fn containers_are_named_sequentially() {
        let mut a = agent("machine:\n  type: e1-standard-2\n");
        a.add_container();
        a.add_container();
        assert_eq!(a.containers()[0].name, "main");
        assert_eq!(a.containers()[1].name, "c2");
    }

    #[test]
    fn serialization_preserves_unrecognized_machine_keys() {
        let a = agent("machine:\n  type: e1-standard-2\n  os_image: ubuntu1804\n  zone: eu-west\n");
        let json = a.to_json();
        let machine = json
            .as_mapping()
            .and_then(|m| mapping::get(m, "machine"))
            .and_then(Value::as_mapping)
            .unwrap();
        assert_eq!(mapping::get_str(machine, "zone"), Some("eu-west"));
    }

    #[test]
    fn removed_containers_disappear_from_output() {
        let mut a = agent(
            "machine:\n  type: e1-standard-2\n  os_image: ubuntu1804\ncontainers:\n- name: main\n",
        );
        a.remove_container(0);
        let json = a.to_json();
        assert!(mapping::get(json.as_mapping().unwrap(), "containers").is_none());
    }
}
