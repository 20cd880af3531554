// ABOUTME: Support code for the sandexec binary
// ABOUTME: Logging setup, argument parsing helpers and exit-code mapping

pub mod args;
pub mod logging;
pub mod outcome;
