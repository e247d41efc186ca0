//! Log setup for the `dev-digest` binary.
//!
//! stdout carries only the rendered digest (console or JSON), so every log
//! line goes to stderr. `-v` lowers the default level to DEBUG for our own
//! events while the HTTP stack stays at WARN; `RUST_LOG` overrides both.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Crates whose debug output would drown the run lifecycle events.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Installs the global subscriber. Later calls are no-ops.
///
/// `json` selects newline-delimited JSON lines for log shippers.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let layer = if json {
        stderr.json().boxed()
    } else {
        stderr.boxed()
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .ok();
}

fn default_directives(level: Level) -> String {
    let mut directives = level.as_str().to_lowercase();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_quiet_http_stack() {
        let directives = default_directives(Level::DEBUG);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("hyper=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
