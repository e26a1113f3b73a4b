// djdesk-net/src/inspector.rs
//! Client for the inspector's JSON endpoints: workspace status snapshots and
//! task-run submission.

use std::collections::BTreeMap;
use std::time::Duration;

use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::model::StatusSnapshot;
use reqwest::header::{HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::http::USER_AGENT_STRING;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const CSRF_COOKIE: &str = "csrftoken";

#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub workspace: String,
    pub preset: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskSubmission {
    Accepted(StatusSnapshot),
    /// Field name to validation messages, as returned with a 400.
    Rejected(BTreeMap<String, Vec<String>>),
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct InspectorClient {
    client: Client,
    base_url: Url,
}

impl InspectorClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            DjdeskError::ValidationError(format!("Invalid base URL '{base_url}': {e}"))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_store(true)
            .no_proxy()
            .build()
            .map_err(|e| DjdeskError::HttpError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn status_url(&self, workspace: &str) -> Result<Url> {
        self.join(&format!("api/workspaces/{workspace}/status/"))
    }

    pub fn task_runs_url(&self) -> Result<Url> {
        self.join("api/task-runs/")
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DjdeskError::ValidationError(format!("Invalid endpoint path '{path}': {e}")))
    }

    pub async fn fetch_status(&self, workspace: &str) -> Result<StatusSnapshot> {
        let url = self.status_url(workspace)?;
        debug!("Fetching status snapshot from {}", url);
        let response = self
            .client
            .get(url.clone())
            .header("X-Requested-With", "XMLHttpRequest")
            .header(USER_AGENT, USER_AGENT_STRING)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DjdeskError::HttpError(format!(
                "Status endpoint {url} returned {status}"
            )));
        }
        Ok(response.json::<StatusSnapshot>().await?)
    }

    /// Posts a task run as a form, the way the dashboard drawer does. The
    /// dashboard page is fetched first so Django hands out its CSRF cookie.
    pub async fn submit_task(&self, request: &TaskRequest) -> Result<TaskSubmission> {
        let csrf_token = self.csrf_token().await?;
        let url = self.task_runs_url()?;
        debug!("Submitting task '{}' for workspace '{}'", request.preset, request.workspace);

        let mut form = vec![
            ("workspace", request.workspace.as_str()),
            ("preset", request.preset.as_str()),
        ];
        if let Some(notes) = request.notes.as_deref() {
            form.push(("notes", notes));
        }

        let mut builder = self
            .client
            .post(url.clone())
            .header("X-Requested-With", "XMLHttpRequest")
            .header(USER_AGENT, USER_AGENT_STRING)
            .form(&form);
        if let Ok(referer) = HeaderValue::from_str(self.base_url.as_str()) {
            builder = builder.header(REFERER, referer);
        }
        if let Some(token) = csrf_token {
            builder = builder.header("X-CSRFToken", token);
        }

        let response = builder.send().await?;
        match response.status() {
            status if status.is_success() => {
                Ok(TaskSubmission::Accepted(response.json::<StatusSnapshot>().await?))
            }
            StatusCode::BAD_REQUEST => {
                let payload = response.json::<ErrorPayload>().await?;
                Ok(TaskSubmission::Rejected(payload.errors))
            }
            status => Err(DjdeskError::HttpError(format!(
                "Task endpoint {url} returned {status}"
            ))),
        }
    }

    async fn csrf_token(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.base_url.clone())
            .header(USER_AGENT, USER_AGENT_STRING)
            .send()
            .await?;
        let token = response
            .cookies()
            .find(|cookie| cookie.name() == CSRF_COOKIE)
            .map(|cookie| cookie.value().to_string());
        if token.is_none() {
            debug!("No {} cookie issued by {}", CSRF_COOKIE, self.base_url);
        }
        Ok(token)
    }
}
