// Firewalld State - Main Entry Point
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewalld State - declare firewalld zone primitives and reconcile them
//! against the runtime and permanent configuration.

use std::process::ExitCode;

use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod error;
mod firewall;
mod models;
mod orchestrator;
mod reconcile;

use cli::Options;
use config::Settings;
use error::ReconcileError;
use orchestrator::Request;
use reconcile::Outcome;

fn main() -> ExitCode {
    let options = Options::parse();

    // Settings pick the log filter; report problems reading them at warn.
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::WARN)
        .finish();
    let settings = tracing::subscriber::with_default(bootstrap, || {
        Settings::load(options.config.as_deref())
    });

    init_logging(&settings, options.verbose);

    match run(&options, &settings) {
        Ok(outcome) => {
            print_outcome(&outcome, options.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if options.json {
                println!("{}", failure_json(&e));
            } else {
                eprintln!("error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(settings: &Settings, verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(options: &Options, settings: &Settings) -> Result<Outcome, ReconcileError> {
    let request = Request::from_options(options)?;
    let fw = firewall::open(settings, request.permanent)?;
    request.execute(fw.as_ref())
}

/// JSON failure object carrying the whole error chain.
fn failure_json(e: &ReconcileError) -> serde_json::Value {
    serde_json::json!({ "failed": true, "msg": format!("{:#}", e) })
}

fn print_outcome(outcome: &Outcome, json: bool) {
    if json {
        match serde_json::to_string_pretty(outcome) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: failed to serialize result: {}", e),
        }
        return;
    }

    println!("{}", if outcome.changed { "changed" } else { "unchanged" });
    for message in &outcome.messages {
        println!("  {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_failure_json_keeps_context() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let err = err.context("Failed to query zone public").unwrap_err();

        let failure = failure_json(&ReconcileError::from(err));
        assert_eq!(failure["failed"], true);
        assert_eq!(failure["msg"], "Failed to query zone public: connection refused");
    }
}
