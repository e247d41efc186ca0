//! Error types for the data-source modules

use std::time::Duration;

use devdigest_core::{Interrupted, ModuleError};
use thiserror::Error;

/// Errors that can occur while talking to a source system
#[derive(Error, Debug)]
pub enum SourceError {
    /// Request could not be sent or the response body could not be read
    #[error("request failed: {0}")]
    Transport(String),

    /// Non-2xx response
    #[error("http {status}")]
    Status { status: u16 },

    /// Response body did not match the expected shape
    #[error("decode {what}: {message}")]
    Decode { what: String, message: String },

    /// The API answered but had nothing usable
    #[error("{0}")]
    Empty(String),

    /// Base URL from config could not be used
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The execution context expired or was cancelled mid-call
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// A failure labeled with the step that produced it
    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<SourceError>,
    },
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Transport(err.to_string())
    }
}

impl SourceError {
    /// Converts into the error a module returns; `budget` is the time the
    /// module was given, used when reporting a deadline.
    pub fn into_module_error(self, budget: Duration) -> ModuleError {
        match self {
            SourceError::Interrupted(reason) => ModuleError::interrupted(reason, budget),
            other => ModuleError::Source(other.to_string()),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, SourceError::Interrupted(_))
    }

    /// Prefixes the error with `stage`. Interruptions pass through unlabeled
    /// so they still surface as a deadline or cancellation.
    pub fn context(self, stage: &'static str) -> Self {
        if self.is_interrupted() {
            return self;
        }
        SourceError::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SourceError::Status { status: 404 }.to_string(), "http 404");
    }

    #[test]
    fn test_into_module_error() {
        let err = SourceError::Interrupted(Interrupted::DeadlineExceeded)
            .into_module_error(Duration::from_secs(3));
        assert!(matches!(err, ModuleError::DeadlineExceeded(d) if d == Duration::from_secs(3)));

        let err = SourceError::Interrupted(Interrupted::Cancelled).into_module_error(Duration::ZERO);
        assert!(matches!(err, ModuleError::Cancelled));

        let err = SourceError::Empty("no current iteration".to_string())
            .into_module_error(Duration::ZERO);
        assert_eq!(err.to_string(), "no current iteration");
    }

    #[test]
    fn test_context_labels_failures_but_not_interruptions() {
        let err = SourceError::Status { status: 503 }.context("get current iteration");
        assert_eq!(err.to_string(), "get current iteration: http 503");
        assert!(!err.is_interrupted());

        let err = SourceError::Interrupted(Interrupted::DeadlineExceeded).context("wiql query");
        assert!(err.is_interrupted());
        assert!(matches!(
            err.into_module_error(Duration::from_secs(2)),
            ModuleError::DeadlineExceeded(_)
        ));
    }
}
