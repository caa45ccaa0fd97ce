use thiserror::Error;

/// Coarse classification of an [`Error`].
///
/// Callers that only need to branch on "retry later", "re-authenticate" or
/// "give up" can match on this instead of the full variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Connection failure, timeout, or a non-2xx response.
    Transport,
    /// Expired, revoked, or denied credentials.
    Auth,
    /// The provider answered, but not in the shape its pagination contract promises.
    Protocol,
    /// Day-splitting of a date range failed.
    SamplingRecovery,
    /// The caller handed us something unusable.
    InvalidInput,
}

/// Top-level error type for the `statpull-api` crate.
///
/// Covers every failure mode across both providers: OAuth token lifecycle,
/// transport, provider response shape, and date arithmetic.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token refresh failed; the refresh token may still be usable later.
    #[error("Credentials expired -- token refresh failed: {message}")]
    CredentialsExpired { message: String },

    /// The provider rejected the refresh token (`invalid_grant`).
    #[error("Credentials revoked: {message}")]
    CredentialsRevoked { message: String },

    /// The client has no credential bundle yet (OAuth flow not completed).
    #[error("No credentials -- obtain a token via {authorize_url}")]
    MissingCredentials { authorize_url: String },

    /// The OAuth redirect carried an `error` parameter.
    #[error("OAuth authorization denied ({code}): {description}")]
    OAuthDenied { code: String, description: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Non-success HTTP status from a provider endpoint.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Provider contract ───────────────────────────────────────────
    /// A field the pagination contract depends on was missing.
    #[error("{endpoint}: response is missing `{field}`")]
    MissingField {
        endpoint: String,
        field: &'static str,
        body: String,
    },

    /// Yandex Direct answered 200 with an error object instead of `data`.
    #[error("Direct API error {code} in {method}: {message}")]
    Direct {
        method: String,
        code: i64,
        message: String,
    },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Dates ───────────────────────────────────────────────────────
    /// The end of a date range precedes its start.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    /// A date range could not be parsed when subdividing a sampled report.
    #[error("Cannot subdivide sampled report: {message}")]
    SamplingRecovery { message: String },

    // ── Input ───────────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Malformed request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// The coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialsExpired { .. }
            | Self::CredentialsRevoked { .. }
            | Self::MissingCredentials { .. }
            | Self::OAuthDenied { .. } => ErrorKind::Auth,
            Self::Api { status: 401 | 403, .. } => ErrorKind::Auth,
            Self::Transport(_) | Self::Timeout { .. } | Self::Api { .. } | Self::Tls(_) => {
                ErrorKind::Transport
            }
            Self::MissingField { .. } | Self::Direct { .. } | Self::Deserialization { .. } => {
                ErrorKind::Protocol
            }
            Self::InvalidDateRange { .. } | Self::SamplingRecovery { .. } => {
                ErrorKind::SamplingRecovery
            }
            Self::InvalidUrl(_) | Self::InvalidRequest(_) => ErrorKind::InvalidInput,
        }
    }

    /// Returns `true` if this error indicates the credentials are no longer
    /// usable and the OAuth flow has to be repeated or the token refreshed.
    pub fn is_auth_expired(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code, if the error came from a provider response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
