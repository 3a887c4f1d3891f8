// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Command-line interface parsing using clap. Security validation of the
//! workflow-file path happens in [`super::validator`] after parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure.
#[derive(Parser, Debug, Clone)]
#[command(name = "stac-pipeline")]
#[command(about = concat!("STAC metadata pipeline engine v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug) logging regardless of the workflow document's
    /// configured level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the workflow document's log output format.
    #[arg(long, global = true, value_parser = ["text", "json"])]
    pub log_format: Option<String>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a workflow document to completion.
    Run {
        /// Path to the workflow document (YAML or JSON).
        workflow_file: PathBuf,

        /// Resume from the checkpoint sidecar instead of starting fresh.
        #[arg(long)]
        resume: bool,

        /// Override the workflow document's `settings.checkpoint.path`.
        #[arg(long)]
        checkpoint_path: Option<PathBuf>,
    },

    /// Validate a workflow document without executing it (DAG + schema
    /// checks only; equivalent to a dry compile).
    Check {
        /// Path to the workflow document (YAML or JSON).
        workflow_file: PathBuf,
    },
}

/// Parses CLI arguments from `std::env::args`.
///
/// # Panics
///
/// `clap` exits the process with a usage message if parsing fails; this
/// function does not panic on valid invocations.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::parse_from(["stac-pipeline", "run", "workflow.yaml"]);
        match cli.command {
            Commands::Run {
                workflow_file,
                resume,
                ..
            } => {
                assert_eq!(workflow_file, PathBuf::from("workflow.yaml"));
                assert!(!resume);
            }
            _ => panic!("expected Run subcommand"),
        }
    }

    #[test]
    fn parses_resume_flag() {
        let cli = Cli::parse_from(["stac-pipeline", "run", "wf.yaml", "--resume"]);
        match cli.command {
            Commands::Run { resume, .. } => assert!(resume),
            _ => panic!("expected Run subcommand"),
        }
    }

    #[test]
    fn parses_check_subcommand() {
        let cli = Cli::parse_from(["stac-pipeline", "check", "wf.yaml"]);
        assert!(matches!(cli.command, Commands::Check { .. }));
    }
}
