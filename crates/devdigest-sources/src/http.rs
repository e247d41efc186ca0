//! Deadline-aware JSON-over-HTTP client shared by the modules.
//!
//! Every request goes through [`ExecContext::bounded`], so a module call never
//! outlives its deadline or a cancelled run.

use devdigest_core::ExecContext;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SourceError};

/// How requests authenticate.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer <token>` (TeamCity access tokens)
    Bearer(String),
    /// Basic auth with an empty user and the token as password (Azure DevOps PATs)
    Pat(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
            Auth::Pat(_) => f.write_str("Pat(***)"),
        }
    }
}

pub struct HttpSource {
    client: reqwest::Client,
    auth: Auth,
}

impl HttpSource {
    pub fn new(auth: Auth) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dev-digest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, auth })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, ctx: &ExecContext<'_>, url: Url) -> Result<T> {
        let request = self.client.get(url.clone());
        self.send(ctx, request, &url).await
    }

    pub async fn post_json<B, T>(&self, ctx: &ExecContext<'_>, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        self.send(ctx, request, &url).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        ctx: &ExecContext<'_>,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T> {
        let request = match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Pat(pat) => request.basic_auth("", Some(pat)),
        }
        .header(ACCEPT, "application/json");

        debug!(url = %url.path(), "source request");
        ctx.bounded(async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::Status {
                    status: status.as_u16(),
                });
            }
            let body = response.bytes().await?;
            serde_json::from_slice(&body).map_err(|err| SourceError::Decode {
                what: url.path().to_string(),
                message: err.to_string(),
            })
        })
        .await?
    }
}

/// Joins path segments and query pairs onto a base URL from config.
///
/// Segments are percent-encoded individually, so project and team names
/// containing spaces or slashes are safe.
pub fn endpoint(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
    let invalid = |reason: String| SourceError::InvalidUrl {
        url: base.to_string(),
        reason,
    };

    let mut url = Url::parse(base.trim()).map_err(|err| invalid(err.to_string()))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
