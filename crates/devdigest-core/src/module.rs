//! The contract every data-source module implements.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::context::{ExecContext, Interrupted};
use crate::error::ModuleError;
use crate::report::Report;

/// A pluggable producer of one [`Report`] per run.
///
/// Modules are stateless between runs. `run` must route its blocking calls
/// through [`ExecContext::bounded`] so it stops promptly once the deadline
/// passes or the run is cancelled.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Stable identifier used for labeling and error reports.
    fn name(&self) -> &str;

    /// Pure predicate over config presence. No I/O.
    fn enabled(&self, config: &Config) -> bool;

    /// Module-specific timeout from config, if any. Non-positive values are ignored.
    fn timeout_override(&self, _config: &Config) -> Option<Duration> {
        None
    }

    /// Does the actual work. `Ok(None)` means there is nothing to say.
    async fn run(
        &self,
        ctx: &mut ExecContext<'_>,
        config: &Config,
    ) -> Result<Option<Report>, ModuleError>;
}

impl ModuleError {
    /// Maps an interrupted bounded call to the error the module should return.
    pub fn interrupted(reason: Interrupted, budget: Duration) -> Self {
        match reason {
            Interrupted::DeadlineExceeded => ModuleError::DeadlineExceeded(budget),
            Interrupted::Cancelled => ModuleError::Cancelled,
        }
    }
}
