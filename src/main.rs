mod config;
mod dify;
mod error;
mod mention;
mod slack;
mod types;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use config::Config;
use dify::{DifyClient, WorkflowError};
use error::{PipelineError, RelayError};
use mention::strip_mentions;
use slack::SlackWebClient;
use std::sync::Arc;
use tracing::{error, info, warn};
use types::{MentionEvent, SlackEnvelope, SlackEvent, URL_VERIFICATION};

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";
const RETRY_NUM_HEADER: &str = "x-slack-retry-num";
const RETRY_REASON_HEADER: &str = "x-slack-retry-reason";

/// The only retry whose first delivery is known to have reached us.
const RETRY_REASON_TIMEOUT: &str = "http_timeout";

const MAX_BODY_BYTES: usize = 1024 * 1024;

const EMPTY_QUESTION_MESSAGE: &str = "Please provide a question after mentioning me.";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    slack: Arc<SlackWebClient>,
    dify: Arc<DifyClient>,
}

impl AppState {
    fn new(config: Config) -> Result<Self, WorkflowError> {
        Ok(Self {
            slack: Arc::new(SlackWebClient::new(&config)),
            dify: Arc::new(DifyClient::new(config.dify.clone())?),
            config: Arc::new(config),
        })
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "difyrelay=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let missing = config.missing_settings();
    if !missing.is_empty() {
        warn!(
            "Not configured: {} - requests that need them will fail until they are set",
            missing.join(", ")
        );
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize clients: {}", e);
            std::process::exit(1);
        }
    };
    let app = app(state);

    info!("Starting server on {}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/slack/events",
            post(slack_events_handler).fallback(method_not_allowed),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

/// Reads the whole body untouched; the signature covers these exact bytes.
async fn read_raw_body(body: Body) -> Result<String, RelayError> {
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| RelayError::BodyRead(e.to_string()))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| RelayError::BodyRead(e.to_string()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty())
}

async fn slack_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, RelayError> {
    let raw_body = read_raw_body(body).await?;
    info!(
        "Received request to /slack/events, body length: {} bytes",
        raw_body.len()
    );

    if raw_body.trim().is_empty() {
        return Err(RelayError::EmptyBody);
    }

    let envelope: SlackEnvelope = serde_json::from_str(&raw_body).map_err(|e| {
        warn!("Failed to parse Slack envelope: {}", e);
        RelayError::InvalidJson(e)
    })?;

    // The handshake is the only unsigned request we answer
    if envelope.event_type == URL_VERIFICATION && envelope.event.is_none() {
        let challenge = envelope
            .challenge
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                warn!("url_verification request without a challenge");
                RelayError::MissingChallenge
            })?;
        info!("Responding to url_verification challenge");
        return Ok(challenge.into_response());
    }

    let timestamp =
        header_str(&headers, TIMESTAMP_HEADER).ok_or(RelayError::MissingHeader(TIMESTAMP_HEADER))?;
    let signature =
        header_str(&headers, SIGNATURE_HEADER).ok_or(RelayError::MissingHeader(SIGNATURE_HEADER))?;
    let signing_secret = state.config.require_signing_secret().map_err(|e| {
        error!("Cannot verify Slack request: {}", e);
        e
    })?;

    slack::verify_signature(
        signing_secret,
        timestamp,
        signature,
        &raw_body,
        state.config.max_request_age,
    )
    .map_err(|e| {
        warn!("Signature verification failed: {}", e);
        e
    })?;

    // A timeout retry means the first delivery got here and is being
    // answered. Other retry reasons (connection_failed, http_error) mean it
    // was never processed, so those go through the pipeline.
    if let Some(retry) = header_str(&headers, RETRY_NUM_HEADER) {
        let reason = header_str(&headers, RETRY_REASON_HEADER);
        if reason == Some(RETRY_REASON_TIMEOUT) {
            info!(
                "Ignoring Slack retry #{} of event {:?} (http_timeout)",
                retry, envelope.event_id
            );
            return Ok(StatusCode::OK.into_response());
        }
        info!(
            "Processing Slack retry #{} of event {:?} ({})",
            retry,
            envelope.event_id,
            reason.unwrap_or("no reason given")
        );
    }

    let Some(mention) = envelope.event.and_then(SlackEvent::into_mention) else {
        return Ok(StatusCode::OK.into_response());
    };

    // Acknowledge now, answer in the background. The handle is dropped on
    // purpose; the task reports its own outcome through the log.
    tokio::spawn(handle_mention(state, mention));

    Ok(StatusCode::OK.into_response())
}

async fn handle_mention(state: AppState, mention: MentionEvent) {
    let question = strip_mentions(&mention.text);

    if question.is_empty() {
        if let Err(e) = state
            .slack
            .chat_post_message(&mention.channel, Some(&mention.ts), EMPTY_QUESTION_MESSAGE)
            .await
        {
            error!("Failed to post message: {}", e);
        }
        return;
    }

    info!(
        "Answering mention from {} in {}",
        mention.user.as_deref().unwrap_or("unknown user"),
        mention.channel
    );

    match answer_question(&state, &mention, &question).await {
        Ok(()) => info!("Replied in thread {} of {}", mention.ts, mention.channel),
        Err(e) => {
            error!("Error processing mention: {}", e);
            if let Err(post_err) = state
                .slack
                .chat_post_message(&mention.channel, Some(&mention.ts), &e.user_message())
                .await
            {
                error!("Failed to post error message: {}", post_err);
            }
        }
    }
}

async fn answer_question(
    state: &AppState,
    mention: &MentionEvent,
    question: &str,
) -> Result<(), PipelineError> {
    let answer = state.dify.run_workflow(question).await?;
    state
        .slack
        .chat_post_message(&mention.channel, Some(&mention.ts), &answer)
        .await?;
    Ok(())
}
