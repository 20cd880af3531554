// ABOUTME: Runtime settings assembled from environment variables
// ABOUTME: Sandbox identity, container runtime selection, execution defaults and log verbosity

use crate::constants::*;
use crate::env::{parse_bool, parse_number, parse_seconds};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
    #[error("Invalid port mapping {0:?} (expected HOST:CONTAINER)")]
    InvalidPortMapping(String),
    #[error("Unknown container runtime: {0} (expected docker or podman)")]
    UnknownRuntime(String),
}

/// Which container CLI drives the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    #[default]
    Docker,
    Podman,
}

impl RuntimeKind {
    /// Executable name of the runtime CLI
    pub fn binary(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(RuntimeKind::Docker),
            "podman" => Ok(RuntimeKind::Podman),
            _ => Err(ConfigError::UnknownRuntime(s.to_string())),
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// A published port, `HOST:CONTAINER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
}

impl FromStr for PortMapping {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidPortMapping(s.to_string());
        let (host, container) = s.trim().split_once(':').ok_or_else(invalid)?;
        let host_port = host.parse::<u16>().map_err(|_| invalid())?;
        let container_port = container.parse::<u16>().map_err(|_| invalid())?;
        if host_port == 0 || container_port == 0 {
            return Err(invalid());
        }
        Ok(PortMapping {
            host_port,
            container_port,
        })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_port, self.container_port)
    }
}

/// Comma-separated list of port mappings; blank entries are ignored
pub fn parse_port_list(value: &str) -> Result<Vec<PortMapping>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sandbox_name: String,
    pub sandbox_image: String,
    pub sandbox_ports: Vec<PortMapping>,
    pub sandbox_workdir: String,
    pub runtime: RuntimeKind,
    /// Deadline for each runtime management command (inspect, run, start, rm)
    pub runtime_timeout_secs: f64,
    pub max_output_bytes: usize,
    /// Deadline for commands that do not set their own; `None` is unbounded
    pub default_timeout_secs: Option<f64>,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sandbox_name: DEFAULT_SANDBOX_NAME.to_string(),
            sandbox_image: DEFAULT_SANDBOX_IMAGE.to_string(),
            sandbox_ports: parse_port_list(DEFAULT_SANDBOX_PORTS).unwrap_or_default(),
            sandbox_workdir: DEFAULT_SANDBOX_WORKDIR.to_string(),
            runtime: RuntimeKind::default(),
            runtime_timeout_secs: DEFAULT_RUNTIME_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            default_timeout_secs: None,
            verbose: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any name -> value source.
    ///
    /// Unset or empty variables fall back to defaults; malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(name) = get(SANDEXEC_SANDBOX_NAME) {
            settings.sandbox_name = name.trim().to_string();
        }
        if let Some(image) = get(SANDEXEC_SANDBOX_IMAGE) {
            settings.sandbox_image = image.trim().to_string();
        }
        if let Some(ports) = lookup(SANDEXEC_SANDBOX_PORTS) {
            // Explicitly empty means "publish nothing"
            settings.sandbox_ports = parse_port_list(&ports)?;
        }
        if let Some(workdir) = get(SANDEXEC_SANDBOX_WORKDIR) {
            settings.sandbox_workdir = workdir.trim().to_string();
        }
        if let Some(runtime) = get(SANDEXEC_RUNTIME) {
            settings.runtime = runtime.parse()?;
        }
        if let Some(value) = get(SANDEXEC_RUNTIME_TIMEOUT_SECS) {
            settings.runtime_timeout_secs = parse_seconds(SANDEXEC_RUNTIME_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = get(SANDEXEC_MAX_OUTPUT_BYTES) {
            settings.max_output_bytes = parse_number(SANDEXEC_MAX_OUTPUT_BYTES, &value)?;
        }
        if let Some(value) = get(SANDEXEC_DEFAULT_TIMEOUT_SECS) {
            settings.default_timeout_secs =
                Some(parse_seconds(SANDEXEC_DEFAULT_TIMEOUT_SECS, &value)?);
        }
        if let Some(value) = get(SANDEXEC_VERBOSE) {
            settings.verbose = parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                var: SANDEXEC_VERBOSE.to_string(),
                value: value.clone(),
            })?;
        }

        Ok(settings)
    }
}
