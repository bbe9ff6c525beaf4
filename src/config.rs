use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_DIFY_API_VERSION: &str = "v1";
pub const DEFAULT_MAX_REQUEST_AGE_SECS: u64 = 300;
pub const DEFAULT_PORT: u16 = 3000;

/// Raised when a setting that is only checked at use time is absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} is not configured")]
pub struct MissingSetting(pub &'static str);

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read once at startup and shared read-only.
///
/// Credentials are optional here so the server can boot with a partial
/// setup; callers ask for them through the `require_*` accessors, which
/// report the missing variable by name.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub signing_secret: Option<String>,
    pub bot_token: Option<String>,
    pub slack_api_base_url: String,
    /// Zero disables the replay window check.
    pub max_request_age: Duration,
    pub dify: DifySettings,
}

#[derive(Debug, Clone, Default)]
pub struct DifySettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub workflow_id: Option<String>,
    pub api_version: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigLoadError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let max_age_secs = match get("SLACK_MAX_REQUEST_AGE_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigLoadError::Invalid {
                name: "SLACK_MAX_REQUEST_AGE_SECS",
                value: raw,
            })?,
            None => DEFAULT_MAX_REQUEST_AGE_SECS,
        };

        Ok(Self {
            port,
            signing_secret: get("SLACK_SIGNING_SECRET"),
            bot_token: get("SLACK_BOT_TOKEN"),
            slack_api_base_url: get("SLACK_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SLACK_API_BASE_URL.to_string()),
            max_request_age: Duration::from_secs(max_age_secs),
            dify: DifySettings {
                base_url: get("DIFY_BASE_URL"),
                api_key: get("DIFY_API_KEY"),
                workflow_id: get("DIFY_WORKFLOW_ID"),
                api_version: get("DIFY_API_VERSION"),
            },
        })
    }

    pub fn require_signing_secret(&self) -> Result<&str, MissingSetting> {
        self.signing_secret
            .as_deref()
            .ok_or(MissingSetting("SLACK_SIGNING_SECRET"))
    }

    pub fn require_bot_token(&self) -> Result<&str, MissingSetting> {
        self.bot_token
            .as_deref()
            .ok_or(MissingSetting("SLACK_BOT_TOKEN"))
    }

    /// Names of every unset credential, for the startup warning.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.signing_secret.is_none() {
            missing.push("SLACK_SIGNING_SECRET");
        }
        if self.bot_token.is_none() {
            missing.push("SLACK_BOT_TOKEN");
        }
        if self.dify.base_url.is_none() {
            missing.push("DIFY_BASE_URL");
        }
        if self.dify.api_key.is_none() {
            missing.push("DIFY_API_KEY");
        }
        if self.dify.workflow_id.is_none() {
            missing.push("DIFY_WORKFLOW_ID");
        }
        missing
    }
}

impl DifySettings {
    pub fn require_base_url(&self) -> Result<&str, MissingSetting> {
        self.base_url.as_deref().ok_or(MissingSetting("DIFY_BASE_URL"))
    }

    pub fn require_api_key(&self) -> Result<&str, MissingSetting> {
        self.api_key.as_deref().ok_or(MissingSetting("DIFY_API_KEY"))
    }

    pub fn require_workflow_id(&self) -> Result<&str, MissingSetting> {
        self.workflow_id
            .as_deref()
            .ok_or(MissingSetting("DIFY_WORKFLOW_ID"))
    }

    pub fn api_version(&self) -> &str {
        self.api_version
            .as_deref()
            .unwrap_or(DEFAULT_DIFY_API_VERSION)
    }
}
