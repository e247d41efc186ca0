//! dev-digest core library
//!
//! Module registry, sequential run orchestration, the shared facts
//! scratchpad and the normalized report model. Concrete data sources live in
//! `devdigest-sources`; this crate only knows the [`Module`] contract.

pub mod config;
pub mod context;
pub mod error;
pub mod facts;
pub mod module;
pub mod obs;
pub mod registry;
pub mod render;
pub mod report;
pub mod runner;
pub mod telemetry;

pub use config::{
    AzureBoardsConfig, AzureConfig, AzureReposConfig, Config, ConsoleConfig, TeamCityConfig,
    CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, DEFAULT_MODULE_TIMEOUT,
};
pub use context::{ExecContext, Interrupted};
pub use error::{ConfigError, ModuleError, RegistryError, Result, RunError};
pub use facts::Facts;
pub use module::Module;
pub use registry::ModuleRegistry;
pub use render::{render_json, render_reports, should_color, OutputFormat, RenderOptions, RenderSummary};
pub use report::{format_duration, Report, ReportMeta, Section, Table, DURATION_META_KEY};
pub use runner::{resolve_timeout, Runner};
pub use telemetry::init_tracing;

/// dev-digest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
