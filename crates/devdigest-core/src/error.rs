//! Error taxonomy for dev-digest.
//!
//! Only [`RunError`] ever escapes a run. Configuration problems are downgraded
//! to warnings and [`ModuleError`]s are turned into error reports by the runner.

use std::path::PathBuf;
use std::time::Duration;

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse yaml {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("{section}.{field} is required when {section} section is present")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    #[error("invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },
}

/// Errors produced by the module registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("module already registered: {name}")]
    DuplicateModule { name: String },
}

/// Errors a module may return from `run`.
///
/// They never reach the caller of a run; the runner turns each one into an
/// error report titled after the module.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("{0} config missing")]
    MissingConfig(&'static str),

    #[error("{0}")]
    Source(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The only errors that fail a whole run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no enabled modules / nothing to report; check your config")]
    NothingToReport,
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = ConfigError::MissingField {
            section: "teamcity",
            field: "base_url",
        };
        assert_eq!(
            err.to_string(),
            "teamcity.base_url is required when teamcity section is present"
        );
    }

    #[test]
    fn test_duplicate_module_display() {
        let err = RegistryError::DuplicateModule {
            name: "TeamCity".to_string(),
        };
        assert!(err.to_string().contains("TeamCity"));
    }

    #[test]
    fn test_module_error_wraps_anyhow() {
        let err: ModuleError = anyhow::anyhow!("http 503").into();
        assert_eq!(err.to_string(), "http 503");

        let err = ModuleError::DeadlineExceeded(Duration::from_secs(20));
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[test]
    fn test_nothing_to_report_display() {
        assert!(RunError::NothingToReport
            .to_string()
            .contains("nothing to report"));
    }
}
