// ABOUTME: Value parsers for command-line arguments
// ABOUTME: KEY=VALUE environment overrides and positive timeouts

/// Parse `KEY=VALUE`; the value may itself contain `=`
pub fn parse_env_pair(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {input:?}"))?;
    if key.is_empty() {
        return Err(format!("missing variable name in {input:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn parse_timeout(input: &str) -> Result<f64, String> {
    let seconds: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("not a number of seconds: {input:?}"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {input}"));
    }
    Ok(seconds)
}
