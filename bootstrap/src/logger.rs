// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logger Bootstrap
//!
//! Installs the global `tracing` subscriber once, at process start. The
//! workflow engine names its per-step spans `engine.<workflow>.<step>`
//! (and `.<matrix_coord>` for matrix children); this module only owns the
//! process-wide subscriber and its format/level.

use crate::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Output format for log lines, mirrors the workflow document's
/// `settings.logging.output_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Initializes the global `tracing` subscriber.
///
/// `RUST_LOG` always takes precedence when set; otherwise the directive is
/// built from `level`. Calling this more than once in a process is a no-op
/// past the first call (the underlying `set_global_default` errors are
/// swallowed, matching the teacher's "logging setup never fails the run"
/// posture).
pub fn init(level: LogLevel, format: OutputFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level_str(level)));

    let result = match format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    if result.is_err() {
        // A subscriber is already installed (e.g. repeated init in tests).
        tracing::trace!("tracing subscriber already initialized");
    }
}

fn tracing_level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
