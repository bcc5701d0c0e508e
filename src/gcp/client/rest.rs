use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use super::{ComputeClient, Firewall, GoogleApiError};
use crate::auth::TokenSource;
use crate::consts::COMPUTE_API_URL;

/// How many times to call `operations/wait` before giving up. Each call
/// blocks server-side for up to two minutes.
const MAX_WAIT_ATTEMPTS: usize = 10;

/// Pause between `operations/wait` calls that came back unfinished.
const WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// A [`ComputeClient`] that calls the Compute Engine v1 REST API.
pub struct RestComputeClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    wait: bool,
    max_wait_attempts: usize,
    wait_interval: Duration,
}

impl RestComputeClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: COMPUTE_API_URL.to_string(),
            tokens,
            wait: true,
            max_wait_attempts: MAX_WAIT_ATTEMPTS,
            wait_interval: WAIT_INTERVAL,
        }
    }

    /// Point at a different endpoint (an emulator, or a mock server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether mutating calls block until their operation is `DONE`.
    pub fn wait_for_operations(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Bound the operation wait loop: at most `max_attempts` calls to
    /// `operations/wait`, `interval` apart.
    pub fn with_wait_policy(mut self, max_attempts: usize, interval: Duration) -> Self {
        self.max_wait_attempts = max_attempts;
        self.wait_interval = interval;
        self
    }

    /// `{base}/projects/{project_id}/global/{segments...}`. Every segment is
    /// percent-encoded, so a `/` or `?` in a name stays inside its segment.
    fn global_url(&self, project_id: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid Compute API URL {:?}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Compute API URL {:?} cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(["projects", project_id, "global"])
            .extend(segments);
        Ok(url)
    }

    fn firewalls_url(&self, project_id: &str) -> Result<Url> {
        self.global_url(project_id, &["firewalls"])
    }

    fn firewall_url(&self, project_id: &str, name: &str) -> Result<Url> {
        self.global_url(project_id, &["firewalls", name])
    }

    fn wait_url(&self, project_id: &str, operation: &str) -> Result<Url> {
        self.global_url(project_id, &["operations", operation, "wait"])
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let token = self.tokens.access_token().await?;
        let resp = req.bearer_auth(token).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error body: {e}"));
            return Err(api_error(status, &text).into());
        }

        Ok(resp)
    }

    /// Decode the operation a mutating call returned and, if configured,
    /// block until it completes.
    async fn finish(&self, project_id: &str, resp: Response) -> Result<()> {
        let mut op: Operation = resp.json().await.context("failed to decode operation")?;

        if !self.wait {
            return op.into_result();
        }

        for attempt in 0..self.max_wait_attempts {
            if op.is_done() {
                return op.into_result();
            }
            if attempt > 0 {
                tokio::time::sleep(self.wait_interval).await;
            }
            tracing::debug!(operation = %op.name, attempt, "waiting for operation");
            let url = self.wait_url(project_id, &op.name)?;
            let resp = self
                .send(self.http.post(url))
                .await
                .with_context(|| format!("error waiting for operation {:?}", op.name))?;
            op = resp.json().await.context("failed to decode operation")?;
        }

        if op.is_done() {
            return op.into_result();
        }
        bail!(
            "operation {:?} did not finish after {} waits",
            op.name,
            self.max_wait_attempts
        )
    }
}

#[async_trait]
impl ComputeClient for RestComputeClient {
    async fn get_firewall_rule(&self, project_id: &str, name: &str) -> Result<Firewall> {
        let url = self.firewall_url(project_id, name)?;
        tracing::debug!(%url, "GET firewall rule");
        let resp = self.send(self.http.get(url)).await?;
        resp.json().await.context("failed to decode firewall rule")
    }

    async fn insert_firewall_rule(&self, project_id: &str, rule: &Firewall) -> Result<()> {
        let url = self.firewalls_url(project_id)?;
        tracing::debug!(%url, rule = %rule.name, "POST firewall rule");
        let resp = self.send(self.http.post(url).json(rule)).await?;
        self.finish(project_id, resp).await
    }

    async fn update_firewall_rule(
        &self,
        project_id: &str,
        name: &str,
        rule: &Firewall,
    ) -> Result<()> {
        let url = self.firewall_url(project_id, name)?;
        tracing::debug!(%url, "PUT firewall rule");
        let resp = self.send(self.http.put(url).json(rule)).await?;
        self.finish(project_id, resp).await
    }

    async fn delete_firewall_rule(&self, project_id: &str, name: &str) -> Result<()> {
        let url = self.firewall_url(project_id, name)?;
        tracing::debug!(%url, "DELETE firewall rule");
        let resp = self.send(self.http.delete(url)).await?;
        self.finish(project_id, resp).await
    }
}

/// Turn an error response body into a [`GoogleApiError`]. Falls back to
/// the raw body when it isn't the usual `{"error": {...}}` envelope, and to
/// the status text when there is no body at all.
fn api_error(status: u16, body: &str) -> GoogleApiError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return GoogleApiError {
            code: envelope.error.code.unwrap_or(status),
            message: envelope.error.message,
            reason: envelope.error.errors.into_iter().find_map(|e| e.reason),
        };
    }

    let body = body.trim();
    if !body.is_empty() {
        return GoogleApiError::new(status, body);
    }
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("empty response body");
    GoogleApiError::new(status, reason)
}

// --- API types ---

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    error: Option<OperationError>,
    http_error_status_code: Option<u16>,
    http_error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationError {
    #[serde(default)]
    errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationErrorItem {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Operation {
    fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    fn into_result(self) -> Result<()> {
        let Some(error) = self.error else {
            return Ok(());
        };

        let message = if error.errors.is_empty() {
            self.http_error_message.unwrap_or_default()
        } else {
            error
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };

        Err(GoogleApiError {
            code: self.http_error_status_code.unwrap_or(500),
            message,
            reason: error.errors.into_iter().next().map(|e| e.code),
        }
        .into())
    }
}
