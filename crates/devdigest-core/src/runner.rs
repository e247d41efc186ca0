//! Run orchestration: one sequential pass over the registry.
//!
//! Each enabled module runs under its own deadline, derived from the run's
//! root context. A module failure, timeout or cancellation becomes an error
//! report for that module and the run moves on. The run as a whole fails only
//! when nothing at all was reported.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::context::{race, ExecContext};
use crate::error::{ModuleError, Result, RunError};
use crate::facts::Facts;
use crate::module::Module;
use crate::obs;
use crate::registry::ModuleRegistry;
use crate::report::Report;

/// Picks a module's timeout: its own override when positive, else the global default.
pub fn resolve_timeout(module_override: Option<Duration>, global_default: Duration) -> Duration {
    match module_override {
        Some(timeout) if !timeout.is_zero() => timeout,
        _ => global_default,
    }
}

pub struct Runner {
    registry: ModuleRegistry,
}

impl Runner {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Loads the config (explicit path, `$DEV_DIGEST_CONFIG`, or `./config.yaml`),
    /// expands credential placeholders and collects reports.
    ///
    /// An unreadable or unparsable config file is fatal; missing fields are not.
    pub async fn run(&self, root: ExecContext<'_>, config_path: Option<&Path>) -> Result<Vec<Report>> {
        let path = Config::resolve_path(config_path);
        let mut config = Config::load(&path)?;
        config.resolve_env();
        self.collect(root, &config).await
    }

    /// Runs every enabled module in registration order and returns their reports.
    pub async fn collect(&self, root: ExecContext<'_>, config: &Config) -> Result<Vec<Report>> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.collect_inner(&run_id, root, config)
            .instrument(span)
            .await
    }

    async fn collect_inner(
        &self,
        run_id: &str,
        root: ExecContext<'_>,
        config: &Config,
    ) -> Result<Vec<Report>> {
        let started = Instant::now();

        // Partial config still yields partial output.
        for issue in config.validate() {
            obs::emit_config_invalid(&issue);
        }

        let mut facts = Facts::new();
        let mut ctx = root.with_facts(&mut facts);
        let modules = self.registry.snapshot();
        let default_timeout = config.default_module_timeout();
        obs::emit_run_started(run_id, modules.len());

        let mut reports = Vec::new();
        for (index, module) in modules.iter().enumerate() {
            if let Some(reason) = ctx.interrupted() {
                obs::emit_run_interrupted(modules.len() - index, &reason);
                break;
            }
            if !module.enabled(config) {
                obs::emit_module_skipped(module.name());
                continue;
            }

            let timeout = resolve_timeout(module.timeout_override(config), default_timeout);
            if let Some(report) = execute(module.as_ref(), &mut ctx, config, timeout).await {
                reports.push(report);
            }
        }

        obs::emit_run_finished(run_id, started.elapsed(), reports.len());
        if reports.is_empty() {
            return Err(RunError::NothingToReport);
        }
        Ok(reports)
    }
}

/// Runs one module under a child context. Never fails: errors come back as a report.
async fn execute(
    module: &dyn Module,
    ctx: &mut ExecContext<'_>,
    config: &Config,
    timeout: Duration,
) -> Option<Report> {
    let name = module.name();
    let mut child = ctx.child(timeout);
    let deadline = child.deadline();
    let token = child.cancellation_token();
    let budget = child.remaining().unwrap_or(timeout);

    let started = Instant::now();
    // The race also cuts off modules that ignore their context.
    let outcome = match race(deadline, &token, module.run(&mut child, config)).await {
        Ok(result) => result,
        Err(reason) => {
            token.cancel();
            Err(ModuleError::interrupted(reason, budget))
        }
    };
    let elapsed = started.elapsed();

    match outcome {
        Ok(Some(mut report)) => {
            report.meta.duration = Some(elapsed);
            obs::emit_module_finished(name, elapsed, true);
            Some(report)
        }
        Ok(None) => {
            obs::emit_module_finished(name, elapsed, false);
            None
        }
        Err(err) => {
            obs::emit_module_failed(name, elapsed, &err);
            Some(Report::failed(name, &err))
        }
    }
}
