// ABOUTME: `sandexec run`: execute one command on the host or inside the sandbox
// ABOUTME: Prints the child's output (or JSON result) and returns its exit status

use super::Context;
use anyhow::{Context as _, Result};
use clap::Args;
use colored::*;
use sandexec_cli::args::{parse_env_pair, parse_timeout};
use sandexec_cli::outcome::exit_code_for;
use sandexec_exec::{CommandSpec, ExecutionResult};
use sandexec_sandbox::SandboxCommand;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Tokenize and execute directly instead of going through a shell
    #[arg(long)]
    argv: bool,

    /// Text to send on the command's stdin
    #[arg(long, conflicts_with = "stdin_file")]
    stdin: Option<String>,

    /// File whose contents are sent on the command's stdin
    #[arg(long)]
    stdin_file: Option<PathBuf>,

    /// Working directory (a container path with --sandbox)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Kill the command after this many seconds
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<f64>,

    /// Extra environment variable, KEY=VALUE (repeatable)
    #[arg(long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Character encoding of stdin and of the captured output
    #[arg(long)]
    encoding: Option<String>,

    /// Per-stream cap on captured output
    #[arg(long)]
    max_output_bytes: Option<usize>,

    /// Run inside the sandbox container, creating or starting it first
    #[arg(long)]
    sandbox: bool,

    /// Print the full result as JSON instead of the raw output
    #[arg(long)]
    json: bool,

    /// The command line
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl RunArgs {
    fn stdin_text(&self) -> Result<Option<String>> {
        match (&self.stdin, &self.stdin_file) {
            (Some(text), _) => Ok(Some(text.clone())),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read stdin file {}", path.display()))
                .map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Command text: quoted so it re-tokenizes to the same words in argv mode,
    /// joined with spaces for the shell otherwise
    fn command_text(&self) -> String {
        if self.argv {
            CommandSpec::from_args(&self.command).command
        } else {
            self.command.join(" ")
        }
    }

    fn host_spec(&self, stdin: Option<String>) -> CommandSpec {
        let mut spec = if self.argv {
            CommandSpec::from_args(&self.command)
        } else {
            CommandSpec::shell(self.command_text())
        };
        spec = spec.envs(self.env.iter().cloned());
        if let Some(input) = stdin {
            spec = spec.stdin(input);
        }
        if let Some(dir) = &self.workdir {
            spec = spec.workdir(dir);
        }
        if let Some(seconds) = self.timeout {
            spec = spec.timeout_secs(seconds);
        }
        if let Some(label) = &self.encoding {
            spec = spec.encoding(label);
        }
        if let Some(limit) = self.max_output_bytes {
            spec = spec.max_output_bytes(limit);
        }
        spec
    }

    fn sandbox_command(&self, stdin: Option<String>) -> SandboxCommand {
        let mut command = SandboxCommand::new(self.command_text());
        for (key, value) in &self.env {
            command = command.env(key, value);
        }
        command.stdin = stdin;
        command.workdir = self.workdir.as_ref().map(|dir| dir.display().to_string());
        command.timeout_secs = self.timeout;
        command.encoding = self.encoding.clone();
        command.max_output_bytes = self.max_output_bytes;
        command
    }
}

pub async fn run_command(context: &Context, args: RunArgs) -> Result<i32> {
    let stdin = args.stdin_text()?;

    let result = if args.sandbox {
        let resource = context.resource();
        context
            .sandbox_executor()?
            .run(&resource, args.sandbox_command(stdin))
            .await?
    } else {
        context.executor().execute(args.host_spec(stdin)).await?
    };

    report(&result, args.json)?;
    Ok(exit_code_for(&result))
}

fn report(result: &ExecutionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(result.stdout.as_bytes())?;
    stdout.flush()?;

    let mut stderr = std::io::stderr().lock();
    stderr.write_all(result.stderr.as_bytes())?;
    if result.truncated {
        writeln!(
            stderr,
            "{}",
            "sandexec: output was truncated".yellow()
        )?;
    }
    Ok(())
}
