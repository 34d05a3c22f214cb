//! Externally injected catalogs.
//!
//! The editor host supplies these once at session start: the machine-type
//! list partitioned by platform (with default OS images per platform), the
//! secret names available to the project, and the valid deployment targets.
//! They are owned by the `Workflow` and passed by reference into validation
//! and agent transitions, so independent editing sessions never share state.

use serde::{Deserialize, Serialize};

/// Platform partition of the machine-type catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Linux,
    Mac,
    SelfHosted,
}

/// One machine type / OS image combination offered by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTypeEntry {
    #[serde(rename = "type")]
    pub machine_type: String,
    #[serde(default)]
    pub spec: String,
    #[serde(default)]
    pub os_image: String,
    pub platform: Platform,
}

/// The machine-type catalog plus the per-platform default OS images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCatalog {
    pub agent_types: Vec<AgentTypeEntry>,
    #[serde(default)]
    pub default_linux_os_image: String,
    #[serde(default)]
    pub default_mac_os_image: String,
}

impl AgentCatalog {
    pub fn is_empty(&self) -> bool {
        self.agent_types.is_empty()
    }

    /// Unique machine types for one platform, in catalog order.
    pub fn machine_types(&self, platform: Platform) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for entry in self.agent_types.iter().filter(|e| e.platform == platform) {
            if !out.contains(&entry.machine_type.as_str()) {
                out.push(&entry.machine_type);
            }
        }
        out
    }

    /// Unique machine types across all platforms, in catalog order.
    pub fn all_machine_types(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for entry in &self.agent_types {
            if !out.contains(&entry.machine_type.as_str()) {
                out.push(&entry.machine_type);
            }
        }
        out
    }

    /// OS images offered for a machine type. Self-hosted types carry none.
    pub fn os_images(&self, machine_type: &str) -> Vec<&str> {
        if self.is_self_hosted(machine_type) {
            return Vec::new();
        }
        let mut out: Vec<&str> = Vec::new();
        for entry in self
            .agent_types
            .iter()
            .filter(|e| e.machine_type == machine_type)
        {
            if !out.contains(&entry.os_image.as_str()) {
                out.push(&entry.os_image);
            }
        }
        out
    }

    /// The platform-default image for a machine type, or `""` when the type
    /// is unknown or self-hosted.
    pub fn default_os_image(&self, machine_type: &str) -> &str {
        if self.has_machine_type(Platform::Mac, machine_type) {
            return &self.default_mac_os_image;
        }
        if self.has_machine_type(Platform::Linux, machine_type) {
            return &self.default_linux_os_image;
        }
        ""
    }

    pub fn has_machine_type(&self, platform: Platform, machine_type: &str) -> bool {
        self.agent_types
            .iter()
            .any(|e| e.platform == platform && e.machine_type == machine_type)
    }

    pub fn is_self_hosted(&self, machine_type: &str) -> bool {
        self.has_machine_type(Platform::SelfHosted, machine_type)
    }
}

/// Everything the host injects at session start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalogs {
    pub agents: AgentCatalog,
    pub secret_names: Vec<String>,
    pub deployment_targets: Vec<String>,
}

impl Catalogs {
    pub fn has_secret(&self, name: &str) -> bool {
        self.secret_names.iter().any(|s| s == name)
    }

    pub fn has_deployment_target(&self, name: &str) -> bool {
        self.deployment_targets.iter().any(|t| t == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
                    machine_type: "s1-linux".into(),
                    spec: String::new(),
                    os_image: String::new(),
                    platform: Platform::SelfHosted,
                },
            ],
            default_linux_os_image: "ubuntu2004".into(),
            default_mac_os_image: "macos-xcode13".into(),
        }
    }

    #[test]
    fn machine_types_are_unique_per_platform() {
        let c = catalog();
        assert_eq!(c.machine_types(Platform::Linux), vec!["e1-standard-2"]);
        assert_eq!(c.machine_types(Platform::SelfHosted), vec!["s1-linux"]);
    }

    #[test]
    fn os_images_empty_for_self_hosted() {
        let c = catalog();
        assert!(c.os_images("s1-linux").is_empty());
        assert_eq!(c.os_images("e1-standard-2"), vec!["ubuntu1804", "ubuntu2004"]);
    }

    #[test]
    fn default_os_image_follows_platform() {
        let c = catalog();
        assert_eq!(c.default_os_image("e1-standard-2"), "ubuntu2004");
        assert_eq!(c.default_os_image("a1-standard-4"), "macos-xcode13");
        assert_eq!(c.default_os_image("s1-linux"), "");
        assert_eq!(c.default_os_image("nope"), "");
    }

    #[test]
    fn platform_deserializes_from_screaming_snake_case() {
        let p: Platform = serde_json::from_str("\"SELF_HOSTED\"").unwrap();
        assert_eq!(p, Platform::SelfHosted);
    }

    #[test]
    fn agent_type_entry_reads_wire_shape() {
        let entry: AgentTypeEntry = serde_json::from_str(
            r#"{"type": "e1-standard-2", "spec": "2 vCPU", "os_image": "ubuntu2004", "platform": "LINUX"}"#,
        )
        .unwrap();
        assert_eq!(entry.machine_type, "e1-standard-2");
        assert_eq!(entry.platform, Platform::Linux);
    }
}
