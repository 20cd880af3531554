// ABOUTME: Description of the long-lived sandbox container and its observed state
// ABOUTME: State is always re-queried from the runtime; nothing here is cached

use sandexec_config::{PortMapping, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label attached to every container created by Sandexec
pub const MANAGED_LABEL: &str = "sandexec.managed";

/// Foreground process that keeps an otherwise idle sandbox alive
pub fn default_keep_alive() -> Vec<String> {
    ["tail", "-f", "/dev/null"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxResource {
    /// Identity key; the container name
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl SandboxResource {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: Vec::new(),
            keep_alive: default_keep_alive(),
            labels: BTreeMap::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.sandbox_name, &settings.sandbox_image)
            .with_ports(settings.sandbox_ports.clone())
    }

    pub fn with_ports(mut self, ports: Vec<PortMapping>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_keep_alive(mut self, command: Vec<String>) -> Self {
        self.keep_alive = command;
        self
    }

    /// Caller labels plus the managed marker
    pub fn effective_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.labels.clone();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels
    }
}

/// What the runtime reports for a resource name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxState {
    Absent,
    /// Exists but is not running (created, exited, dead)
    Stopped,
    /// Frozen in place; needs unpausing rather than starting
    Paused,
    Running,
}

impl SandboxState {
    /// Map a runtime status word (`docker ps` / inspect) onto a state
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "running" | "restarting" => SandboxState::Running,
            "paused" => SandboxState::Paused,
            _ => SandboxState::Stopped,
        }
    }
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SandboxState::Absent => "absent",
            SandboxState::Stopped => "stopped",
            SandboxState::Paused => "paused",
            SandboxState::Running => "running",
        };
        f.write_str(s)
    }
}
