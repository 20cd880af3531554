use clap::{Parser, Subcommand};
use colored::*;
use sandexec_cli::{logging, outcome};
use sandexec_config::Settings;
use std::process;

mod cli;

use cli::run::RunArgs;
use cli::sandbox::{Backend, SandboxCommands};

#[derive(Parser)]
#[command(name = "sandexec")]
#[command(about = "Run commands with deadlines and bounded output, on the host or in a sandbox container")]
#[command(version)]
struct Cli {
    /// Log what is being run (info level) unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// How to talk to the container runtime
    #[arg(long, value_enum, global = true, default_value = "cli")]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and exit with its status
    Run(RunArgs),
    #[command(flatten)]
    Sandbox(SandboxCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "Configuration error:".red().bold(), e);
            process::exit(outcome::EXIT_FAILURE);
        }
    };
    let verbose = cli.verbose || settings.verbose;
    logging::init(verbose);

    let context = cli::Context {
        settings,
        verbose,
        backend: cli.backend,
    };

    let result = match cli.command {
        Commands::Run(args) => cli::run::run_command(&context, args).await,
        Commands::Sandbox(command) => command.execute(&context).await,
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(outcome::exit_code_for_error(&e));
        }
    }
}
