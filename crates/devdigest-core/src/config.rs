//! Root configuration, loaded once per run from YAML.
//!
//! A source section being present is what enables its module(s); leaving it
//! out disables them. Credentials may reference environment variables as
//! `${VAR}` and are expanded by [`Config::resolve_env`] before validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Environment variable consulted when no config path is given.
pub const CONFIG_ENV_VAR: &str = "DEV_DIGEST_CONFIG";

/// Config file used when neither a path nor [`CONFIG_ENV_VAR`] is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Per-module timeout used when `console.timeout` is unset.
pub const DEFAULT_MODULE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub teamcity: Option<TeamCityConfig>,
    #[serde(default)]
    pub azure: Option<AzureConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConsoleConfig {
    /// `None` means auto: colored when stdout is a terminal.
    #[serde(default)]
    pub color: Option<bool>,
    /// Default per-module timeout.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TeamCityConfig {
    pub base_url: String,
    pub token: String,
    pub branch: String,
    /// Build configuration ids.
    pub builds: Vec<String>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// e.g. `https://dev.azure.com/{org}`
    pub organization: String,
    pub pat: String,
    pub boards: Option<AzureBoardsConfig>,
    pub repos: Option<AzureReposConfig>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AzureBoardsConfig {
    pub project: String,
    pub team: String,
    /// Work item types queried in the current iteration.
    pub work_item_types: Vec<String>,
}

impl Default for AzureBoardsConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            team: String::new(),
            work_item_types: vec!["Feature".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AzureReposConfig {}

impl Config {
    /// Resolves the config path: explicit path, then `$DEV_DIGEST_CONFIG`,
    /// then `./config.yaml`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(value) if !value.is_empty() => PathBuf::from(value),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }

    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty file is a valid, empty config.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Expands `${VAR}` references in credential fields from the process environment.
    pub fn resolve_env(&mut self) {
        self.resolve_env_with(|key| std::env::var(key).ok());
    }

    pub fn resolve_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(teamcity) = self.teamcity.as_mut() {
            teamcity.token = expand_env(&teamcity.token, &lookup);
        }
        if let Some(azure) = self.azure.as_mut() {
            azure.pat = expand_env(&azure.pat, &lookup);
        }
    }

    /// Checks required fields of every present section and returns all problems found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();
        if let Some(teamcity) = &self.teamcity {
            if teamcity.base_url.trim().is_empty() {
                issues.push(ConfigError::MissingField {
                    section: "teamcity",
                    field: "base_url",
                });
            }
        }
        if let Some(azure) = &self.azure {
            if azure.organization.trim().is_empty() {
                issues.push(ConfigError::MissingField {
                    section: "azure",
                    field: "organization",
                });
            }
            if let Some(boards) = &azure.boards {
                if boards.project.trim().is_empty() {
                    issues.push(ConfigError::MissingField {
                        section: "azure.boards",
                        field: "project",
                    });
                }
                if boards.team.trim().is_empty() {
                    issues.push(ConfigError::MissingField {
                        section: "azure.boards",
                        field: "team",
                    });
                }
            }
        }
        issues
    }

    /// Global per-module timeout: `console.timeout` when positive, else 20s.
    pub fn default_module_timeout(&self) -> Duration {
        match self.console.timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => DEFAULT_MODULE_TIMEOUT,
        }
    }
}

/// Replaces every `${VAR}` with `lookup(VAR)`, or nothing if it is unset.
/// An unterminated `${` is copied through as-is.
pub fn expand_env<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                if let Some(value) = lookup(&after[..end]) {
                    out.push_str(&value);
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses Go-style durations (`"20s"`, `"1m30s"`, `"1.5h"`, `"250ms"`).
/// A bare number is taken as seconds. Negative durations clamp to zero.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: input.to_string(),
        reason: reason.to_string(),
    };

    let text = input.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(magnitude) => (true, magnitude),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if text.is_empty() {
        return Err(invalid("empty"));
    }
    let magnitude = parse_magnitude(text).map_err(invalid)?;
    Ok(if negative { Duration::ZERO } else { magnitude })
}

fn parse_magnitude(text: &str) -> Result<Duration, &'static str> {
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total_nanos = 0f64;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err("expected a number");
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| "malformed number")?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err("missing unit"),
            _ => return Err("unknown unit"),
        };
        rest = &rest[unit_len..];
        total_nanos += value * nanos_per_unit;
    }

    let total_nanos = total_nanos.round();
    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err("out of range");
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(i64),
        Text(String),
    }

    // Zero and negative values leave the timeout unset.
    let duration = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Seconds(secs)) => Duration::from_secs(secs.max(0).unsigned_abs()),
        Some(Raw::Text(text)) => parse_duration(&text).map_err(serde::de::Error::custom)?,
    };
    Ok((!duration.is_zero()).then_some(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
console:
  color: false
  timeout: 30s
teamcity:
  base_url: https://ci.example.com/
  token: ${TC_TOKEN}
  branch: main
  builds: [Web_Build, Api_Build]
  timeout: 1m
azure:
  organization: https://dev.azure.com/acme
  pat: "pat-${AZ_SUFFIX}"
  timeout: 45
  boards:
    project: Shop
    team: Checkout
  repos: {}
"#;

    fn parse(content: &str) -> Config {
        Config::from_yaml(content, Path::new("test.yaml")).expect("parse")
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(FULL);
        assert_eq!(config.console.color, Some(false));
        assert_eq!(config.console.timeout, Some(Duration::from_secs(30)));

        let teamcity = config.teamcity.as_ref().unwrap();
        assert_eq!(teamcity.builds, vec!["Web_Build", "Api_Build"]);
        assert_eq!(teamcity.timeout, Some(Duration::from_secs(60)));

        let azure = config.azure.as_ref().unwrap();
        assert_eq!(azure.timeout, Some(Duration::from_secs(45)));
        let boards = azure.boards.as_ref().unwrap();
        assert_eq!(boards.work_item_types, vec!["Feature"]);
        assert!(azure.repos.is_some());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_absent_sections_are_none() {
        let config = parse("console:\n  timeout: 5s\n");
        assert!(config.teamcity.is_none());
        assert!(config.azure.is_none());

        let empty = parse("   \n");
        assert_eq!(empty, Config::default());
    }

    #[test]
    fn test_null_subsection_disables() {
        let config = parse("azure:\n  organization: https://dev.azure.com/acme\n  repos:\n");
        let azure = config.azure.unwrap();
        assert!(azure.repos.is_none());
        assert!(azure.boards.is_none());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = Config::from_yaml("teamcity: [unterminated", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config, parse(FULL));
        assert_eq!(Config::resolve_path(Some(&path)), path);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_resolve_env_expands_credentials() {
        let mut config = parse(FULL);
        config.resolve_env_with(|key| match key {
            "TC_TOKEN" => Some("secret".to_string()),
            "AZ_SUFFIX" => Some("42".to_string()),
            _ => None,
        });
        assert_eq!(config.teamcity.unwrap().token, "secret");
        assert_eq!(config.azure.unwrap().pat, "pat-42");
    }

    #[test]
    fn test_expand_env_edge_cases() {
        let lookup = |key: &str| (key == "A").then(|| "x".to_string());
        assert_eq!(expand_env("", lookup), "");
        assert_eq!(expand_env("plain", lookup), "plain");
        assert_eq!(expand_env("${A}${A}", lookup), "xx");
        assert_eq!(expand_env("pre-${MISSING}-post", lookup), "pre--post");
        assert_eq!(expand_env("keep ${A", lookup), "keep ${A");
        assert_eq!(expand_env("$A {A}", lookup), "$A {A}");
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let config = parse("teamcity:\n  token: t\nazure:\n  pat: p\n  boards:\n    team: T\n");
        let issues: Vec<String> = config.validate().iter().map(ToString::to_string).collect();
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("teamcity.base_url"));
        assert!(issues[1].contains("azure.organization"));
        assert!(issues[2].contains("azure.boards.project"));
    }

    #[test]
    fn test_default_module_timeout() {
        let mut config = Config::default();
        assert_eq!(config.default_module_timeout(), DEFAULT_MODULE_TIMEOUT);

        config.console.timeout = Some(Duration::ZERO);
        assert_eq!(config.default_module_timeout(), DEFAULT_MODULE_TIMEOUT);

        config.console.timeout = Some(Duration::from_secs(3));
        assert_eq!(config.default_module_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("20s").unwrap(), Duration::from_secs(20));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10").is_ok());
        assert!(parse_duration("10 parsecs").is_err());
        assert!(parse_duration("1.2.3s").is_err());
        assert!(parse_duration("-").is_err());
        assert!(parse_duration("--5s").is_err());
    }

    #[test]
    fn test_negative_duration_clamps_to_zero() {
        assert_eq!(parse_duration("-5s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("-1m30s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("+5s").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_non_positive_timeouts_fall_back_to_default() {
        let config = parse(
            "console:\n  timeout: -5s\nteamcity:\n  base_url: http://x\n  timeout: -1s\n\
             azure:\n  organization: https://dev.azure.com/acme\n  timeout: 0\n",
        );
        assert_eq!(config.console.timeout, None);
        assert_eq!(config.teamcity.as_ref().unwrap().timeout, None);
        assert_eq!(config.azure.as_ref().unwrap().timeout, None);
        assert_eq!(config.default_module_timeout(), DEFAULT_MODULE_TIMEOUT);

        let config = parse("console:\n  timeout: -7\n");
        assert_eq!(config.console.timeout, None);
    }

    #[test]
    fn test_invalid_duration_in_yaml_fails_parse() {
        let err =
            Config::from_yaml("console:\n  timeout: soon\n", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
