//! Azure Boards: work items of the team's current iteration.
//!
//! The ids found here are appended to the run's facts so Azure Repos can look
//! for matching feature branches.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devdigest_core::{
    AzureBoardsConfig, AzureConfig, Config, ExecContext, Module, ModuleError, Report, Section,
    Table,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{timeout_override, AzureClient, ValueList, PAT_MISSING};
use crate::error::{Result, SourceError};

pub const NAME: &str = "Azure Boards";

/// Maximum ids per work item details request.
const DETAILS_BATCH: usize = 200;

const DETAIL_FIELDS: &str = "System.Id,System.Title,System.State,System.WorkItemType,\
Microsoft.VSTS.Scheduling.OriginalEstimate,Microsoft.VSTS.Scheduling.CompletedWork,\
Microsoft.VSTS.Scheduling.RemainingWork";

pub struct AzureBoardsModule;

#[async_trait]
impl Module for AzureBoardsModule {
    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self, config: &Config) -> bool {
        config.azure.as_ref().is_some_and(|azure| azure.boards.is_some())
    }

    fn timeout_override(&self, config: &Config) -> Option<std::time::Duration> {
        timeout_override(config)
    }

    async fn run(
        &self,
        ctx: &mut ExecContext<'_>,
        config: &Config,
    ) -> std::result::Result<Option<Report>, ModuleError> {
        let Some((azure, boards)) = config
            .azure
            .as_ref()
            .and_then(|azure| azure.boards.as_ref().map(|boards| (azure, boards)))
        else {
            return Err(ModuleError::MissingConfig("azure.boards"));
        };
        let budget = ctx.remaining().unwrap_or_default();
        collect(ctx, azure, boards)
            .await
            .map(Some)
            .map_err(|err| err.into_module_error(budget))
    }
}

async fn collect(
    ctx: &mut ExecContext<'_>,
    azure: &AzureConfig,
    boards: &AzureBoardsConfig,
) -> Result<Report> {
    if azure.pat.is_empty() {
        return Ok(Report::new(NAME, PAT_MISSING));
    }
    let client = AzureClient::new(azure)?;

    let iteration = current_iteration(&client, ctx, boards)
        .await
        .map_err(|err| err.context("get current iteration"))?;
    let ids = query_ids(&client, ctx, boards, &iteration.path)
        .await
        .map_err(|err| err.context("wiql query"))?;
    let items = fetch_details(&client, ctx, &boards.project, &ids)
        .await
        .map_err(|err| err.context("get work items"))?;
    debug!(iteration = %iteration.path, items = items.len(), "current iteration loaded");

    ctx.facts_mut().append_feature_ids(ids.iter().copied());

    let label = count_label(&boards.work_item_types);
    let mut table = Table::new(["ID", "Title", "Type", "State", "Est", "Done", "Rem", "Prog"]);
    let (mut estimate, mut completed) = (0.0, 0.0);
    for item in &items {
        estimate += item.fields.original_estimate;
        completed += item.fields.completed_work;
        table.push_row(item.row());
    }

    let summary = format!(
        "Sprint: {} ({} – {}). {label}: {}. Progress: {}",
        iteration.name,
        format_date(iteration.attributes.start_date),
        format_date(iteration.attributes.finish_date),
        items.len(),
        format_percent(percent(completed, estimate)),
    );

    let mut section = Section::new(iteration.path.clone()).with_table(table);
    if items.is_empty() {
        section = section.with_line(format!("no {} in this iteration", label.to_lowercase()));
    }

    Ok(Report::new(NAME, summary)
        .with_section(section)
        .with_meta("feature_ids", ids)
        .with_meta("iteration_path", iteration.path)
        .with_meta("iteration_name", iteration.name))
}

async fn current_iteration(
    client: &AzureClient<'_>,
    ctx: &ExecContext<'_>,
    boards: &AzureBoardsConfig,
) -> Result<Iteration> {
    let url = client.url(
        &[
            boards.project.as_str(),
            boards.team.as_str(),
            "_apis",
            "work",
            "teamsettings",
            "iterations",
        ],
        &[("$timeframe", "current")],
    )?;
    let list: ValueList<Iteration> = client.get(ctx, url).await?;
    list.value
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Empty("no current iteration".to_string()))
}

async fn query_ids(
    client: &AzureClient<'_>,
    ctx: &ExecContext<'_>,
    boards: &AzureBoardsConfig,
    iteration_path: &str,
) -> Result<Vec<u64>> {
    let url = client.url(
        &[boards.project.as_str(), boards.team.as_str(), "_apis", "wit", "wiql"],
        &[],
    )?;
    let query = build_wiql(&boards.project, &boards.work_item_types, iteration_path);
    let result: WiqlResult = client.post(ctx, url, &json!({ "query": query })).await?;
    Ok(result.work_items.into_iter().map(|item| item.id).collect())
}

async fn fetch_details(
    client: &AzureClient<'_>,
    ctx: &ExecContext<'_>,
    project: &str,
    ids: &[u64],
) -> Result<Vec<WorkItem>> {
    let mut items = Vec::with_capacity(ids.len());
    for batch in ids.chunks(DETAILS_BATCH) {
        let joined = batch
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = client.url(
            &[project, "_apis", "wit", "workitems"],
            &[("ids", joined.as_str()), ("fields", DETAIL_FIELDS)],
        )?;
        let page: WorkItemPage = client.get(ctx, url).await?;
        items.extend(page.into_items());
    }
    Ok(items)
}

fn build_wiql(project: &str, types: &[String], iteration_path: &str) -> String {
    let types = if types.is_empty() {
        "'Feature'".to_string()
    } else {
        types
            .iter()
            .map(|t| format!("'{}'", escape_wiql(t)))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "SELECT [System.Id] FROM WorkItems \
         WHERE [System.TeamProject] = '{}' \
         AND [System.WorkItemType] IN ({types}) \
         AND [System.IterationPath] UNDER '{}' \
         ORDER BY [System.Id]",
        escape_wiql(project),
        escape_wiql(iteration_path),
    )
}

fn escape_wiql(value: &str) -> String {
    value.replace('\'', "''")
}

/// Closed set of work item kinds the digest knows how to label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemType {
    Story,
    Bug,
    Task,
    Epic,
    Feature,
    Unknown,
}

impl WorkItemType {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "user story" | "story" | "product backlog item" => WorkItemType::Story,
            "bug" => WorkItemType::Bug,
            "task" => WorkItemType::Task,
            "epic" => WorkItemType::Epic,
            "feature" => WorkItemType::Feature,
            _ => WorkItemType::Unknown,
        }
    }

    fn plural(self) -> &'static str {
        match self {
            WorkItemType::Story => "Stories",
            WorkItemType::Bug => "Bugs",
            WorkItemType::Task => "Tasks",
            WorkItemType::Epic => "Epics",
            WorkItemType::Feature => "Features",
            WorkItemType::Unknown => "Work items",
        }
    }
}

impl fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkItemType::Story => "Story",
            WorkItemType::Bug => "Bug",
            WorkItemType::Task => "Task",
            WorkItemType::Epic => "Epic",
            WorkItemType::Feature => "Feature",
            WorkItemType::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

fn count_label(types: &[String]) -> &'static str {
    match types {
        [] => WorkItemType::Feature.plural(),
        [only] => WorkItemType::parse(only).plural(),
        _ => WorkItemType::Unknown.plural(),
    }
}

/// `done / total` as a percentage, `None` when there is nothing to measure against.
pub fn percent(done: f64, total: f64) -> Option<f64> {
    (total > 0.0).then(|| done / total * 100.0)
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |p| format!("{p:.0}%"))
}

/// Hours as shown in the table: `-` for nothing, otherwise one decimal.
pub fn human_hours(hours: f64) -> String {
    if hours <= 0.0 {
        "-".to_string()
    } else if hours.fract() == 0.0 {
        format!("{hours:.0}h")
    } else {
        format!("{hours:.1}h")
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "?".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

#[derive(Debug, Deserialize)]
struct Iteration {
    name: String,
    path: String,
    #[serde(default)]
    attributes: IterationAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IterationAttributes {
    start_date: Option<DateTime<Utc>>,
    finish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResult {
    #[serde(default)]
    work_items: Vec<WorkItemRef>,
}

#[derive(Debug, Deserialize)]
struct WorkItemRef {
    id: u64,
}

/// Details come wrapped in a value list, though some proxies return the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkItemPage {
    Wrapped(ValueList<WorkItem>),
    Bare(Vec<WorkItem>),
}

impl WorkItemPage {
    fn into_items(self) -> Vec<WorkItem> {
        match self {
            WorkItemPage::Wrapped(list) => list.value,
            WorkItemPage::Bare(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkItem {
    id: u64,
    #[serde(default)]
    fields: WorkItemFields,
}

#[derive(Debug, Default, Deserialize)]
struct WorkItemFields {
    #[serde(rename = "System.Title", default)]
    title: String,
    #[serde(rename = "System.State", default)]
    state: String,
    #[serde(rename = "System.WorkItemType", default)]
    kind: String,
    #[serde(rename = "Microsoft.VSTS.Scheduling.OriginalEstimate", default)]
    original_estimate: f64,
    #[serde(rename = "Microsoft.VSTS.Scheduling.CompletedWork", default)]
    completed_work: f64,
    #[serde(rename = "Microsoft.VSTS.Scheduling.RemainingWork", default)]
    remaining_work: f64,
}

impl WorkItem {
    fn row(&self) -> [String; 8] {
        let fields = &self.fields;
        let kind = match WorkItemType::parse(&fields.kind) {
            WorkItemType::Unknown if !fields.kind.is_empty() => fields.kind.clone(),
            known => known.to_string(),
        };
        [
            self.id.to_string(),
            fields.title.clone(),
            kind,
            fields.state.clone(),
            human_hours(fields.original_estimate),
            human_hours(fields.completed_work),
            human_hours(fields.remaining_work),
            format_percent(percent(fields.completed_work, fields.original_estimate)),
        ]
    }
}
