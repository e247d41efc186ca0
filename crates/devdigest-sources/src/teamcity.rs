//! TeamCity: latest build per configured build type plus its test counts.

use std::time::Duration;

use async_trait::async_trait;
use devdigest_core::{
    Config, ExecContext, Module, ModuleError, Report, Section, Table, TeamCityConfig,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::http::{endpoint, Auth, HttpSource};

pub const NAME: &str = "TeamCity";

pub struct TeamCityModule;

#[async_trait]
impl Module for TeamCityModule {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.teamcity.is_some()
    }

    fn timeout_override(&self, config: &Config) -> Option<Duration> {
        config.teamcity.as_ref().and_then(|tc| tc.timeout)
    }

    async fn run(
        &self,
        ctx: &mut ExecContext<'_>,
        config: &Config,
    ) -> std::result::Result<Option<Report>, ModuleError> {
        let Some(tc) = config.teamcity.as_ref() else {
            return Err(ModuleError::MissingConfig("teamcity"));
        };
        let budget = ctx.remaining().unwrap_or_default();
        collect(ctx, tc)
            .await
            .map(Some)
            .map_err(|err| err.into_module_error(budget))
    }
}

async fn collect(ctx: &ExecContext<'_>, tc: &TeamCityConfig) -> Result<Report> {
    if tc.token.is_empty() {
        return Ok(Report::new(NAME, "token not provided; skipping API calls"));
    }

    let client = TeamCityClient {
        http: HttpSource::new(Auth::Bearer(tc.token.clone()))?,
        base_url: &tc.base_url,
    };

    let mut table = Table::new(["BuildType", "Branch", "Status", "Tests", "Passed", "Failed"]);
    for build_type in &tc.builds {
        match client.latest_build(ctx, build_type, &tc.branch).await {
            Ok(summary) => table.push_row(summary.row()),
            Err(err) if err.is_interrupted() => return Err(err),
            Err(err) => table.push_row([
                build_type.clone(),
                tc.branch.clone(),
                format!("error: {err}"),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ]),
        }
    }

    let mut report = Report::new(NAME, "Latest builds and tests");
    if tc.builds.is_empty() {
        report = report.with_warning("no build types configured");
    }
    Ok(report.with_section(Section::new("Builds").with_table(table)))
}

struct TeamCityClient<'a> {
    http: HttpSource,
    base_url: &'a str,
}

impl TeamCityClient<'_> {
    async fn latest_build(
        &self,
        ctx: &ExecContext<'_>,
        build_type: &str,
        branch: &str,
    ) -> Result<BuildSummary> {
        let locator = latest_build_locator(build_type, branch);
        let url = endpoint(
            self.base_url,
            &["app", "rest", "builds"],
            &[("locator", locator.as_str())],
        )?;
        let payload: BuildsPayload = self.http.get_json(ctx, url).await?;
        let build = payload
            .build
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Empty("no builds found".to_string()))?;

        let total = self.test_count(ctx, build.id, TestStatus::Any).await?;
        let passed = self.test_count(ctx, build.id, TestStatus::Success).await?;
        let failed = self.test_count(ctx, build.id, TestStatus::Failure).await?;

        Ok(BuildSummary {
            build_type: build_type.to_string(),
            branch: if build.branch_name.is_empty() {
                branch.to_string()
            } else {
                build.branch_name
            },
            status: build.status,
            total,
            passed,
            failed,
        })
    }

    /// A failed count lookup degrades to zero; only interruption propagates.
    async fn test_count(&self, ctx: &ExecContext<'_>, build_id: u64, status: TestStatus) -> Result<u64> {
        let locator = test_count_locator(build_id, status);
        let url = endpoint(
            self.base_url,
            &["app", "rest", "testOccurrences"],
            &[("locator", locator.as_str())],
        )?;
        match self.http.get_json::<TestOccurrences>(ctx, url).await {
            Ok(occurrences) => Ok(occurrences.count),
            Err(err) if err.is_interrupted() => Err(err),
            Err(err) => {
                debug!(build_id, ?status, error = %err, "test count unavailable");
                Ok(0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestStatus {
    Any,
    Success,
    Failure,
}

fn latest_build_locator(build_type: &str, branch: &str) -> String {
    if branch.is_empty() {
        format!("buildType:{build_type},status:any,count:1")
    } else {
        format!("buildType:{build_type},branch:{branch},status:any,count:1")
    }
}

fn test_count_locator(build_id: u64, status: TestStatus) -> String {
    match status {
        TestStatus::Any => format!("build:(id:{build_id})"),
        TestStatus::Success => format!("build:(id:{build_id}),status:SUCCESS"),
        TestStatus::Failure => format!("build:(id:{build_id}),status:FAILURE"),
    }
}

#[derive(Debug, Deserialize)]
struct BuildsPayload {
    #[serde(default)]
    build: Vec<Build>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Build {
    id: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    branch_name: String,
}

#[derive(Debug, Deserialize)]
struct TestOccurrences {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildSummary {
    build_type: String,
    branch: String,
    status: String,
    total: u64,
    passed: u64,
    failed: u64,
}

impl BuildSummary {
    fn row(&self) -> [String; 6] {
        [
            self.build_type.clone(),
            self.branch.clone(),
            self.status.clone(),
            self.total.to_string(),
            self.passed.to_string(),
            self.failed.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_build_locator() {
        assert_eq!(
            latest_build_locator("Web_Build", "main"),
            "buildType:Web_Build,branch:main,status:any,count:1"
        );
        assert_eq!(
            latest_build_locator("Web_Build", ""),
            "buildType:Web_Build,status:any,count:1"
        );
    }

    #[test]
    fn test_test_count_locator() {
        assert_eq!(test_count_locator(42, TestStatus::Any), "build:(id:42)");
        assert_eq!(
            test_count_locator(42, TestStatus::Failure),
            "build:(id:42),status:FAILURE"
        );
    }

    #[test]
    fn test_decode_builds_payload() {
        let payload: BuildsPayload = serde_json::from_str(
            r#"{"count":1,"build":[{"id":981,"buildTypeId":"Web_Build","status":"SUCCESS","branchName":"main","state":"finished"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.build.len(), 1);
        assert_eq!(payload.build[0].id, 981);
        assert_eq!(payload.build[0].branch_name, "main");

        let empty: BuildsPayload = serde_json::from_str(r#"{"count":0}"#).unwrap();
        assert!(empty.build.is_empty());
    }

    #[test]
    fn test_summary_row() {
        let summary = BuildSummary {
            build_type: "Web_Build".to_string(),
            branch: "main".to_string(),
            status: "FAILURE".to_string(),
            total: 120,
            passed: 118,
            failed: 2,
        };
        assert_eq!(
            summary.row(),
            ["Web_Build", "main", "FAILURE", "120", "118", "2"].map(String::from)
        );
    }

    #[test]
    fn test_enabled_and_timeout_follow_config() {
        let mut config = Config::default();
        assert!(!TeamCityModule.enabled(&config));

        config.teamcity = Some(TeamCityConfig {
            timeout: Some(Duration::from_secs(9)),
            ..TeamCityConfig::default()
        });
        assert!(TeamCityModule.enabled(&config));
        assert_eq!(
            TeamCityModule.timeout_override(&config),
            Some(Duration::from_secs(9))
        );
    }

    #[tokio::test]
    async fn test_empty_token_skips_api_calls() {
        let config = Config {
            teamcity: Some(TeamCityConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                builds: vec!["Web_Build".to_string()],
                ..TeamCityConfig::default()
            }),
            ..Config::default()
        };
        let mut ctx = ExecContext::background();
        let report = TeamCityModule.run(&mut ctx, &config).await.unwrap().unwrap();
        assert_eq!(report.title, NAME);
        assert_eq!(report.summary, "token not provided; skipping API calls");
        assert!(report.sections.is_empty());
    }
}
