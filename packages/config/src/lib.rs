// ABOUTME: Configuration for Sandexec
// ABOUTME: Environment variable names, typed parsing helpers, and the Settings struct

pub mod constants;
pub mod env;
pub mod settings;

pub use settings::{parse_port_list, ConfigError, PortMapping, RuntimeKind, Settings};
