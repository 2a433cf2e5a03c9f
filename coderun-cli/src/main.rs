//! # coderun CLI
//!
//! Command-line interface for running one generate-and-execute task.
//!
//! Usage:
//!   coderun <task>
//!   coderun --config coderun.json <task>
//!   coderun show-config
//!
//! Credentials come from the environment:
//!   OPENAI_API_KEY, COGNITORA_API_KEY
//!   OPENAI_BASE_URL, COGNITORA_BASE_URL (optional)
//!
//! Examples:
//!   coderun "Write a Python function to calculate the factorial of a number."
//!   coderun -m gpt-4o --timeout-seconds 10 "Plot a sine wave and describe it"

use clap::{Parser, Subcommand};
use coderun_agent::{AgentConfig, Coordinator, ExecutionRecord};
use coderun_core::{CodeInterpreterClient, CoderunConfig, Error, OpenAIProvider, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const SANDBOX_API_KEY: &str = "COGNITORA_API_KEY";
const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const SANDBOX_BASE_URL: &str = "COGNITORA_BASE_URL";

#[derive(Parser)]
#[command(name = "coderun")]
#[command(author, version, about = "Generate code with an LLM and run it in a remote sandbox")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Task to execute (when not using subcommands)
    #[arg(trailing_var_arg = true)]
    task: Vec<String>,

    /// JSON config file (partial files are fine, missing fields use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model to ask for code
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Execution deadline inside the sandbox
    #[arg(long, global = true)]
    timeout_seconds: Option<u32>,

    /// Leave the sandbox session alive until its lease expires
    #[arg(long, global = true)]
    keep_session: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only print the result
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task
    Run {
        /// The task description
        #[arg(trailing_var_arg = true, required = true)]
        task: Vec<String>,
    },
    /// Print the effective configuration and exit
    ShowConfig,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Config file (or defaults), then environment, then flags
fn load_config(cli: &Cli) -> Result<CoderunConfig> {
    let mut config = match &cli.config {
        Some(path) => CoderunConfig::load(path)?,
        None => CoderunConfig::default(),
    };

    if let Some(url) = non_empty_env(OPENAI_BASE_URL) {
        config.model.base_url = Some(url);
    }
    if let Some(url) = non_empty_env(SANDBOX_BASE_URL) {
        config.sandbox.base_url = Some(url);
    }
    if let Some(model) = &cli.model {
        config = config.with_model(model);
    }
    if let Some(seconds) = cli.timeout_seconds {
        config = config.with_execution_timeout(seconds);
    }
    if cli.keep_session {
        config = config.with_release_sessions(false);
    }

    config.validate()?;
    Ok(config)
}

/// Unset and blank variables both count as absent
fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn credential(var: &'static str) -> Result<String> {
    non_empty_env(var).ok_or_else(|| {
        Error::config_invalid(var, format!("{} is not set", var)).with_operation("cli::credentials")
    })
}

async fn run_task(task: &str, config: &CoderunConfig, quiet: bool) -> Result<Option<ExecutionRecord>> {
    let provider = OpenAIProvider::new(config.provider_config(credential(OPENAI_API_KEY)?))?;
    let sandbox = CodeInterpreterClient::new(config.sandbox_config(credential(SANDBOX_API_KEY)?))?;
    let coordinator = Coordinator::new(provider, sandbox, AgentConfig::from(config));

    if !quiet {
        eprintln!("Task: {}\n", task);
    }
    coordinator.run(task).await
}

fn print_record(record: Option<&ExecutionRecord>, quiet: bool) {
    match record {
        Some(record) => {
            if !quiet {
                eprintln!("\n--- GENERATED CODE ---\n\n{}\n", record.code);
                eprintln!("--- RESULT ({}, {} ms) ---\n", record.status, record.execution_time);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(record).unwrap_or_else(|_| format!("{:?}", record))
            );
        }
        None => {
            if !quiet {
                eprintln!("The model answered without running any code.");
            }
            println!("null");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let task = match &cli.command {
        Some(Commands::ShowConfig) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).unwrap_or_else(|_| format!("{:?}", config))
            );
            return ExitCode::SUCCESS;
        }
        Some(Commands::Run { task }) => task.join(" "),
        None => {
            if cli.task.is_empty() {
                eprintln!("Error: No task provided.");
                eprintln!("Usage: coderun [OPTIONS] <TASK>...");
                eprintln!("       coderun run <TASK>...");
                eprintln!("       coderun show-config");
                eprintln!("\nExample:");
                eprintln!("  coderun \"Write a Python function to calculate the factorial of a number.\"");
                return ExitCode::FAILURE;
            }
            cli.task.join(" ")
        }
    };

    match run_task(&task, &config, cli.quiet).await {
        Ok(record) => {
            print_record(record.as_ref(), cli.quiet);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if cli.verbose {
                eprintln!("Error: {:?}", e);
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task() {
        let cli = Cli::parse_from(["coderun", "-q", "compute", "5!"]);
        assert!(cli.quiet);
        assert!(cli.command.is_none());
        assert_eq!(cli.task.join(" "), "compute 5!");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "coderun",
            "--model",
            "gpt-4o",
            "--timeout-seconds",
            "12",
            "--keep-session",
            "task",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.execution.timeout_seconds, 12);
        assert!(!config.release_sessions);
        assert_eq!(config.session.resources.memory_mb, 512);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = Cli::parse_from(["coderun", "--timeout-seconds", "0", "task"]);
        let err = load_config(&cli).unwrap_err();
        assert_eq!(err.kind(), coderun_core::ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_blank_env_is_absent() {
        std::env::set_var("CODERUN_TEST_BLANK_URL", "");
        std::env::set_var("CODERUN_TEST_SPACES_URL", "  ");
        std::env::set_var("CODERUN_TEST_SET_URL", "http://localhost:9000");

        assert_eq!(non_empty_env("CODERUN_TEST_BLANK_URL"), None);
        assert_eq!(non_empty_env("CODERUN_TEST_SPACES_URL"), None);
        assert_eq!(non_empty_env("CODERUN_TEST_UNSET_URL"), None);
        assert_eq!(
            non_empty_env("CODERUN_TEST_SET_URL").as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn test_blank_base_url_keeps_default() {
        std::env::set_var(SANDBOX_BASE_URL, "");
        let cli = Cli::parse_from(["coderun", "task"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.sandbox.base_url, None);
        assert_eq!(
            config.sandbox_config("key").base_url,
            coderun_core::sandbox::DEFAULT_SANDBOX_URL
        );
    }

    #[test]
    fn test_run_subcommand() {
        let cli = Cli::parse_from(["coderun", "run", "say", "hi"]);
        match cli.command {
            Some(Commands::Run { task }) => assert_eq!(task, vec!["say", "hi"]),
            _ => panic!("expected run subcommand"),
        }
    }
}
