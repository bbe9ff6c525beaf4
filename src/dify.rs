use crate::config::{DifySettings, MissingSetting};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sent as the `user` field of every workflow run.
const WORKFLOW_USER: &str = "slack-bot";

/// Field names tried, in order, under `data.outputs`.
const OUTPUT_FIELDS: [&str; 4] = ["answer", "text", "result", "output"];

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    NotConfigured(#[from] MissingSetting),
    #[error("failed to build workflow HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("workflow API timed out after {0:?}")]
    Timeout(Duration),
    #[error("workflow API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("workflow API request failed: {0}")]
    Network(reqwest::Error),
    #[error("workflow API response was not JSON: {0}")]
    Decode(serde_json::Error),
}

#[derive(Debug, Serialize)]
struct WorkflowInputs<'a> {
    query: &'a str,
}

#[derive(Debug, Serialize)]
struct RunWorkflowRequest<'a> {
    inputs: WorkflowInputs<'a>,
    response_mode: &'static str,
    user: &'static str,
}

/// Status and body of a workflow run, before any interpretation.
#[derive(Debug)]
pub struct RawRun {
    pub status: reqwest::StatusCode,
    pub body: String,
}

pub struct DifyClient {
    settings: DifySettings,
    timeout: Duration,
    client: reqwest::Client,
}

impl DifyClient {
    pub fn new(settings: DifySettings) -> Result<Self, WorkflowError> {
        Self::with_timeout(settings, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(settings: DifySettings, timeout: Duration) -> Result<Self, WorkflowError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(WorkflowError::Client)?;
        Ok(Self {
            settings,
            timeout,
            client,
        })
    }

    /// Runs the workflow in blocking mode and returns its plain-text answer.
    pub async fn run_workflow(&self, query: &str) -> Result<String, WorkflowError> {
        let raw = self.run_workflow_raw(query).await?;
        if !raw.status.is_success() {
            return Err(WorkflowError::Status {
                status: raw.status,
                body: raw.body,
            });
        }

        let json: Value = serde_json::from_str(&raw.body).map_err(WorkflowError::Decode)?;
        Ok(extract_answer(&json))
    }

    /// Sends the run request and returns whatever came back, any status.
    pub async fn run_workflow_raw(&self, query: &str) -> Result<RawRun, WorkflowError> {
        let api_key = self.settings.require_api_key()?;
        let url = workflow_url(
            self.settings.require_base_url()?,
            self.settings.api_version(),
            self.settings.require_workflow_id()?,
        );
        debug!("Calling workflow API: {}", url);

        let payload = RunWorkflowRequest {
            inputs: WorkflowInputs { query },
            response_mode: "blocking",
            user: WORKFLOW_USER,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        Ok(RawRun { status, body })
    }

    fn classify(&self, e: reqwest::Error) -> WorkflowError {
        if e.is_timeout() {
            WorkflowError::Timeout(self.timeout)
        } else {
            WorkflowError::Network(e)
        }
    }
}

/// Joins `{base}/{version}/workflows/{id}/run`, leaving the version out when
/// the base URL already ends in one (e.g. `https://api.dify.ai/v1`).
pub fn workflow_url(base_url: &str, api_version: &str, workflow_id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let version = api_version.trim_matches('/');
    if ends_with_version_segment(base) || version.is_empty() {
        format!("{}/workflows/{}/run", base, workflow_id)
    } else {
        format!("{}/{}/workflows/{}/run", base, version, workflow_id)
    }
}

fn ends_with_version_segment(url: &str) -> bool {
    let last = url.rsplit('/').next().unwrap_or_default();
    let mut chars = last.chars();
    chars.next() == Some('v')
        && !chars.as_str().is_empty()
        && chars.as_str().chars().all(|c| c.is_ascii_digit())
}

/// Pulls a plain-text answer out of a workflow response.
///
/// Precedence, first non-empty string wins:
/// 1. `answer`
/// 2. `data.outputs.answer`, `.text`, `.result`, `.output`, then the first
///    string field of `data.outputs` in key order
/// 3. `output`
/// 4. the whole payload serialized as JSON
pub fn extract_answer(payload: &Value) -> String {
    if let Some(answer) = non_empty_str(payload.get("answer")) {
        return answer.to_string();
    }

    if let Some(outputs) = payload
        .get("data")
        .and_then(|d| d.get("outputs"))
        .and_then(Value::as_object)
    {
        if let Some(answer) = answer_from_outputs(outputs) {
            return answer.to_string();
        }
    }

    if let Some(output) = non_empty_str(payload.get("output")) {
        return output.to_string();
    }

    serde_json::to_string(payload).unwrap_or_default()
}

fn answer_from_outputs(outputs: &Map<String, Value>) -> Option<&str> {
    OUTPUT_FIELDS
        .iter()
        .find_map(|field| non_empty_str(outputs.get(*field)))
        .or_else(|| outputs.values().find_map(|v| non_empty_str(Some(v))))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
