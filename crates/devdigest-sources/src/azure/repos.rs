//! Azure Repos: default branches, and feature branches for the ids Boards found.

use async_trait::async_trait;
use devdigest_core::{AzureConfig, Config, ExecContext, Module, ModuleError, Report, Section, Table};
use serde::Deserialize;

use super::{timeout_override, AzureClient, ValueList, PAT_MISSING};
use crate::error::Result;

pub const NAME: &str = "Azure Repos";

const HEADS_PREFIX: &str = "refs/heads/";

pub struct AzureReposModule;

#[async_trait]
impl Module for AzureReposModule {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.azure.as_ref().is_some_and(|azure| azure.repos.is_some())
    }

    fn timeout_override(&self, config: &Config) -> Option<std::time::Duration> {
        timeout_override(config)
    }

    async fn run(
        &self,
        ctx: &mut ExecContext<'_>,
        config: &Config,
    ) -> std::result::Result<Option<Report>, ModuleError> {
        let Some(azure) = config.azure.as_ref().filter(|azure| azure.repos.is_some()) else {
            return Err(ModuleError::MissingConfig("azure.repos"));
        };
        let budget = ctx.remaining().unwrap_or_default();
        collect(ctx, azure)
            .await
            .map(Some)
            .map_err(|err| err.into_module_error(budget))
    }
}

async fn collect(ctx: &ExecContext<'_>, azure: &AzureConfig) -> Result<Report> {
    if azure.pat.is_empty() {
        return Ok(Report::new(NAME, PAT_MISSING));
    }
    let client = AzureClient::new(azure)?;
    let feature_ids = ctx.facts().feature_ids().to_vec();

    let url = client.url(&["_apis", "git", "repositories"], &[])?;
    let mut repos = client.get::<ValueList<Repository>>(ctx, url).await?.value;
    repos.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let mut table = Table::new(["Repository", "Default", "Matching branches"]);
    let mut matches = 0;
    for repo in &repos {
        let default_branch = short_branch(repo.default_branch.as_deref().unwrap_or("-"));
        if feature_ids.is_empty() {
            table.push_row([repo.name.as_str(), default_branch, "-"]);
            continue;
        }

        match list_branches(&client, ctx, &repo.id).await {
            Ok(branches) => {
                let found = matching_branches(&branches, &feature_ids);
                matches += found.len();
                let cell = if found.is_empty() {
                    "no feature branches".to_string()
                } else {
                    found.join(", ")
                };
                table.push_row([repo.name.clone(), default_branch.to_string(), cell]);
            }
            Err(err) if err.is_interrupted() => return Err(err),
            Err(err) => table.push_row([repo.name.clone(), "error".to_string(), err.to_string()]),
        }
    }

    let mut report = Report::new(
        NAME,
        format!("Repos: {}. Feature branch matches: {matches}", repos.len()),
    );
    if feature_ids.is_empty() {
        report = report.with_warning("no feature ids discovered; listing default branches only");
    }
    Ok(report.with_section(Section::new("Branches by repository").with_table(table)))
}

async fn list_branches(
    client: &AzureClient<'_>,
    ctx: &ExecContext<'_>,
    repo_id: &str,
) -> Result<Vec<String>> {
    let url = client.url(
        &["_apis", "git", "repositories", repo_id, "refs"],
        &[("filter", "heads/")],
    )?;
    let refs: ValueList<GitRef> = client.get(ctx, url).await?;
    Ok(refs
        .value
        .into_iter()
        .map(|git_ref| short_branch(&git_ref.name).to_string())
        .collect())
}

fn short_branch(name: &str) -> &str {
    name.strip_prefix(HEADS_PREFIX).unwrap_or(name)
}

/// Branches naming one of `ids` as a standalone number, grouped by id in
/// discovery order. `feature/1234-login` matches 1234; `hotfix/51234` does not.
pub fn matching_branches(branches: &[String], ids: &[u64]) -> Vec<String> {
    let mut sorted: Vec<&String> = branches.iter().collect();
    sorted.sort();

    let mut found: Vec<String> = Vec::new();
    for id in ids {
        let needle = id.to_string();
        for branch in &sorted {
            if contains_standalone(branch, &needle) && !found.iter().any(|f| f == *branch) {
                found.push((*branch).clone());
            }
        }
    }
    found
}

fn contains_standalone(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let digit_before = start > 0 && bytes[start - 1].is_ascii_digit();
        let digit_after = end < bytes.len() && bytes[end].is_ascii_digit();
        !digit_before && !digit_after
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    id: String,
    name: String,
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branches(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_standalone_id_matching() {
        assert!(contains_standalone("feature/1234-login", "1234"));
        assert!(contains_standalone("1234", "1234"));
        assert!(contains_standalone("bug/x-1234", "1234"));
        assert!(!contains_standalone("hotfix/51234", "1234"));
        assert!(!contains_standalone("feature/12345", "1234"));
        assert!(contains_standalone("feature/12345-and-1234", "1234"));
    }

    #[test]
    fn test_matching_branches_dedupes_and_orders_by_id() {
        let all = branches(&[
            "main",
            "feature/202-search",
            "feature/101-checkout",
            "feature/101-202-combined",
            "feature/1010-other",
        ]);
        let found = matching_branches(&all, &[202, 101]);
        assert_eq!(
            found,
            vec![
                "feature/101-202-combined",
                "feature/202-search",
                "feature/101-checkout",
            ]
        );
    }

    #[test]
    fn test_matching_branches_without_ids() {
        assert!(matching_branches(&branches(&["feature/1"]), &[]).is_empty());
    }

    #[test]
    fn test_short_branch() {
        assert_eq!(short_branch("refs/heads/main"), "main");
        assert_eq!(short_branch("main"), "main");
    }

    #[test]
    fn test_decode_repositories() {
        let list: ValueList<Repository> = serde_json::from_str(
            r#"{"count":2,"value":[
                {"id":"r1","name":"web","defaultBranch":"refs/heads/main","project":{"name":"Shop"}},
                {"id":"r2","name":"empty-repo","project":{"name":"Shop"}}]}"#,
        )
        .unwrap();
        assert_eq!(list.value.len(), 2);
        assert_eq!(list.value[0].default_branch.as_deref(), Some("refs/heads/main"));
        assert_eq!(list.value[1].default_branch, None);
    }

    #[test]
    fn test_enabled_requires_repos_section() {
        let mut config = Config::default();
        assert!(!AzureReposModule.enabled(&config));
        config.azure = Some(AzureConfig {
            repos: Some(Default::default()),
            ..AzureConfig::default()
        });
        assert!(AzureReposModule.enabled(&config));
        assert_eq!(AzureReposModule.timeout_override(&config), None);
    }
}
