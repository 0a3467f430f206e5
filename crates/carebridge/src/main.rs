// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Carebridge - a conversational clinical assistant.
//!
//! This is the binary entry point.

mod serve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Carebridge - a conversational clinical assistant over an EHR.
#[derive(Parser, Debug)]
#[command(name = "carebridge", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and agent.
    Serve,
    /// Load and validate configuration, then exit.
    CheckConfig,
    /// Verify the hash chain of an audit log.
    VerifyAudit {
        /// Log to check. Defaults to `audit.path` from configuration.
        path: Option<PathBuf>,
    },
}

fn load(cli: &Cli) -> Option<carebridge_config::CarebridgeConfig> {
    let loaded = match &cli.config {
        Some(path) => carebridge_config::load_and_validate_path(path),
        None => carebridge_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => Some(config),
        Err(errors) => {
            carebridge_config::render_errors(&errors);
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let Some(config) = load(&cli) else {
        return ExitCode::FAILURE;
    };

    match cli.command {
        Some(Commands::Serve) => match serve::run_serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("carebridge: {e}");
                ExitCode::FAILURE
            }
        },
        Some(Commands::CheckConfig) => {
            println!(
                "carebridge: config ok (agent.name={}, gateway={}:{}, verification={})",
                config.agent.name,
                config.gateway.host,
                config.gateway.port,
                if config.verification.enabled { "on" } else { "off" }
            );
            ExitCode::SUCCESS
        }
        Some(Commands::VerifyAudit { path }) => {
            let path = path.unwrap_or_else(|| PathBuf::from(&config.audit.path));
            match carebridge_audit::verify_file(&path).await {
                Ok(records) => {
                    println!(
                        "carebridge: audit chain intact ({} records in {})",
                        records.len(),
                        path.display()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("carebridge: audit chain broken: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            println!("carebridge: use --help for available commands");
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["carebridge", "--config", "dev.toml", "serve"]);
        assert!(matches!(cli.command, Some(Commands::Serve)));
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("dev.toml")));

        let cli = Cli::parse_from(["carebridge", "verify-audit", "audit.jsonl"]);
        let Some(Commands::VerifyAudit { path }) = cli.command else {
            panic!("expected verify-audit");
        };
        assert_eq!(path, Some(PathBuf::from("audit.jsonl")));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = carebridge_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.gateway.port, 8000);
    }
}
