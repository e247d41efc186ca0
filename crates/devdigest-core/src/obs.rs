//! Structured lifecycle events for a digest run.
//!
//! - A run-scoped span, attached with `tracing::Instrument` so the run
//!   future stays `Send`
//! - One emission function per lifecycle event

use std::time::Duration;

use tracing::{debug, info, warn};

/// Span tagging every event of one run with its `run_id`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("devdigest.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, module_count: usize) {
    info!(event = "run.started", run_id = %run_id, modules = module_count);
}

pub fn emit_config_invalid(error: &dyn std::fmt::Display) {
    warn!(event = "config.invalid", error = %error);
}

pub fn emit_module_skipped(module: &str) {
    debug!(event = "module.skipped", module = %module);
}

pub fn emit_module_finished(module: &str, duration: Duration, produced_report: bool) {
    info!(
        event = "module.finished",
        module = %module,
        duration_ms = duration.as_millis() as u64,
        produced_report = produced_report,
    );
}

pub fn emit_module_failed(module: &str, duration: Duration, error: &dyn std::fmt::Display) {
    warn!(
        event = "module.failed",
        module = %module,
        duration_ms = duration.as_millis() as u64,
        error = %error,
    );
}

pub fn emit_run_interrupted(remaining_modules: usize, reason: &dyn std::fmt::Display) {
    warn!(
        event = "run.interrupted",
        remaining_modules = remaining_modules,
        reason = %reason,
    );
}

pub fn emit_run_finished(run_id: &str, duration: Duration, reports: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration.as_millis() as u64,
        reports = reports,
    );
}
