//! Built-in display sinks.
//!
//! A headless daemon has no menu bar; these sinks cover the two
//! surfaces it does have: stdout for interactive runs and the tracing
//! pipeline for everything else. Platform front-ends implement
//! [`DisplaySink`] themselves and register alongside.

use std::io::{self, Write};

use crate::convert::ConversionOutcome;

use super::{ClearReason, DisplaySink};

/// Writes one line per event to stdout. Used by `convert` one-shots
/// and `watch` in a terminal.
pub struct StdoutSink {
    out: io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for StdoutSink {
    fn show(&mut self, outcome: &ConversionOutcome) {
        // Stdout going away (closed pipe) must not take the watcher
        // down with it.
        let _ = writeln!(
            self.out,
            "{} = {}",
            outcome.original, outcome.converted
        );
    }

    fn clear(&mut self, _reason: ClearReason) {}
}

/// Emits structured events through tracing. Always registered so the
/// conversion stream is observable regardless of front-end.
pub struct TracingSink;

impl DisplaySink for TracingSink {
    fn show(&mut self, outcome: &ConversionOutcome) {
        tracing::info!(
            converter = outcome.converter,
            original = %outcome.original,
            converted = %outcome.converted,
            icon = %outcome.icon_text,
            "conversion"
        );
    }

    fn clear(&mut self, reason: ClearReason) {
        tracing::info!(%reason, "conversion cleared");
    }
}
