//! Sieve CLI - validate and request structured output from language models

mod cli;
mod commands;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use sieve_runtime::RuntimeConfig;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries records and reports
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Schemas => {
            for line in commands::schemas::list() {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Schema { name, strict } => {
            println!("{}", commands::schemas::export(&name, strict)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate(args) => commands::validate::run(&args),

        Commands::Generate { task, options } => {
            let config = match &cli.config {
                Some(path) => RuntimeConfig::from_yaml_file(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => RuntimeConfig::default(),
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::generate::run(task, options, config))
        }
    }
}
