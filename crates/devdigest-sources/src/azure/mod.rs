//! Azure DevOps producers: Boards (current sprint) and Repos (feature branches).
//!
//! Both authenticate with a personal access token and share `azure.timeout`.

pub mod boards;
pub mod repos;

pub use boards::AzureBoardsModule;
pub use repos::AzureReposModule;

use std::time::Duration;

use devdigest_core::{AzureConfig, Config, ExecContext};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::http::{endpoint, Auth, HttpSource};

pub const API_VERSION: &str = "7.0";

const PAT_MISSING: &str = "PAT not provided; skipping API calls";

fn timeout_override(config: &Config) -> Option<Duration> {
    config.azure.as_ref().and_then(|azure| azure.timeout)
}

struct AzureClient<'a> {
    http: HttpSource,
    organization: &'a str,
}

impl<'a> AzureClient<'a> {
    fn new(azure: &'a AzureConfig) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(Auth::Pat(azure.pat.clone()))?,
            organization: &azure.organization,
        })
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut pairs = query.to_vec();
        pairs.push(("api-version", API_VERSION));
        endpoint(self.organization, segments, &pairs)
    }

    async fn get<T: DeserializeOwned>(&self, ctx: &ExecContext<'_>, url: Url) -> Result<T> {
        self.http.get_json(ctx, url).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &ExecContext<'_>,
        url: Url,
        body: &B,
    ) -> Result<T> {
        self.http.post_json(ctx, url, body).await
    }
}

/// The `{"count": n, "value": [...]}` envelope most list endpoints use.
#[derive(Debug, serde::Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}
