// ABOUTME: Helpers for reading typed values from environment-style lookups
// ABOUTME: Boolean flag parsing and numeric parsing with the variable name in the error

use crate::settings::ConfigError;
use std::str::FromStr;

/// Interpret a flag value. `1/true/yes/on` and `0/false/no/off`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_number<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Positive, finite seconds
pub(crate) fn parse_seconds(var: &str, value: &str) -> Result<f64, ConfigError> {
    let seconds: f64 = parse_number(var, value)?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        });
    }
    Ok(seconds)
}
