//! CLI error types with miette diagnostics.
//!
//! Maps `statpull_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use statpull_api::{Error as ApiError, ErrorKind};
use statpull_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const PROTOCOL: i32 = 4;
    pub const PARTIAL: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("No {provider} app registration found")]
    #[diagnostic(
        code(statpull::no_app_config),
        help(
            "Create {path} with client_id and client_secret,\n\
             or set STATPULL_{env}_CLIENT_ID / STATPULL_{env}_CLIENT_SECRET."
        )
    )]
    NoAppConfig {
        provider: String,
        env: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(statpull::config))]
    Config(Box<ConfigError>),

    // ── Authentication ───────────────────────────────────────────────
    #[error("Not authorized with {provider}")]
    #[diagnostic(
        code(statpull::not_authorized),
        help("{hint}")
    )]
    NotAuthorized { provider: String, hint: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(code(statpull::auth_failed), help("{hint}"))]
    AuthFailed { message: String, hint: String },

    #[error("OAuth authorization denied ({code}): {description}")]
    #[diagnostic(code(statpull::oauth_denied))]
    OAuthDenied { code: String, description: String },

    // ── Transport ────────────────────────────────────────────────────
    #[error("Request failed: {message}")]
    #[diagnostic(
        code(statpull::connection_failed),
        help("Check network access to the provider and try again.")
    )]
    ConnectionFailed { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(statpull::timeout),
        help("Increase timeout with --timeout.")
    )]
    Timeout { seconds: u64 },

    // ── Provider contract ────────────────────────────────────────────
    #[error("Unexpected provider response: {message}")]
    #[diagnostic(code(statpull::protocol), help("Run with -vv to log the raw requests."))]
    Protocol { message: String },

    #[error("Cannot subdivide sampled report: {message}")]
    #[diagnostic(
        code(statpull::sampling),
        help("Sampling recovery needs absolute YYYY-MM-DD dates in the first range.")
    )]
    SamplingRecovery { message: String },

    #[error("{failed} of {total} days failed")]
    #[diagnostic(
        code(statpull::partial_report),
        help("Rows for the successful days were printed; see the log for each failure.")
    )]
    PartialReport { failed: usize, total: usize },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(statpull::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot render output: {0}")]
    #[diagnostic(code(statpull::render))]
    Render(String),
}

const YANDEX_REAUTH_HINT: &str = "The token could not be refreshed or was rejected.\n\
     Run the OAuth flow again (statpull yandex auth-url / exchange).";

const GOOGLE_REAUTH_HINT: &str = "The token could not be refreshed or was rejected.\n\
     Authorize the app with Google again and save the new token bundle\n\
     to the credentials file (see --credentials).";

impl CliError {
    /// Swap provider-specific help for errors raised by Google calls.
    #[must_use]
    pub fn for_google(self) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                message,
                hint: GOOGLE_REAUTH_HINT.into(),
            },
            other => other,
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotAuthorized { .. } | Self::AuthFailed { .. } | Self::OAuthDenied { .. } => {
                exit_code::AUTH
            }
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Protocol { .. } | Self::SamplingRecovery { .. } => exit_code::PROTOCOL,
            Self::PartialReport { .. } => exit_code::PARTIAL,
            Self::Validation { .. } | Self::NoAppConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── ApiError → CliError mapping ──────────────────────────────────────

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::MissingCredentials { authorize_url } => Self::NotAuthorized {
                provider: "yandex".into(),
                hint: format!(
                    "Open {authorize_url}\nthen run: statpull yandex exchange --code <CODE>"
                ),
            },
            ApiError::OAuthDenied { code, description } => Self::OAuthDenied { code, description },
            ApiError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            ApiError::SamplingRecovery { message } => Self::SamplingRecovery { message },
            ApiError::InvalidDateRange { start, end } => Self::Validation {
                field: "date range".into(),
                reason: format!("{start} is after {end}"),
            },
            ApiError::InvalidRequest(reason) => Self::Validation {
                field: "request".into(),
                reason,
            },
            other => match other.kind() {
                ErrorKind::Auth => Self::AuthFailed {
                    message: other.to_string(),
                    hint: YANDEX_REAUTH_HINT.into(),
                },
                ErrorKind::Transport => Self::ConnectionFailed {
                    message: other.to_string(),
                },
                ErrorKind::Protocol | ErrorKind::SamplingRecovery => Self::Protocol {
                    message: other.to_string(),
                },
                ErrorKind::InvalidInput => Self::Validation {
                    field: "input".into(),
                    reason: other.to_string(),
                },
            },
        }
    }
}
