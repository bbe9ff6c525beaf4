use crate::config::MissingSetting;
use crate::dify::WorkflowError;
use crate::slack::{SignatureError, SlackError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Everything that can end a webhook request before it is acknowledged.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("failed to read request body: {0}")]
    BodyRead(String),
    #[error("request body is empty")]
    EmptyBody,
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("url_verification request has no challenge")]
    MissingChallenge,
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid request signature: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("server misconfigured: {0}")]
    NotConfigured(#[from] MissingSetting),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::BodyRead(_) | Self::EmptyBody | Self::InvalidJson(_) | Self::MissingChallenge => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingHeader(_) | Self::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            Self::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Don't echo configuration details to the caller
        let message = match &self {
            Self::NotConfigured(_) => "server misconfigured".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Failures after the webhook was acknowledged; these only reach the user
/// as a reply in the originating thread.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Slack(#[from] SlackError),
}

impl PipelineError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Workflow(WorkflowError::NotConfigured(_)) => {
                "Sorry, the workflow service is not configured correctly. Please contact an administrator."
                    .to_string()
            }
            Self::Workflow(e) => format!("Sorry, the workflow service call failed: {}", e),
            Self::Slack(_) => {
                "Sorry, an unknown error occurred while processing your request.".to_string()
            }
        }
    }
}
