// OAuth2 token lifecycle shared by both providers.
//
// A `CredentialHolder` owns one token bundle plus the app credentials needed
// to refresh it. Each provider client keeps exactly one holder behind a mutex
// and asks it for a valid access token before every request.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::classify;

/// Wire format of `expired_at` in persisted bundles.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// OAuth application registration (client id/secret + redirect).
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: Option<String>,
}

/// Access/refresh token pair with its expiry.
///
/// Serializes to the JSON bundle callers persist between runs:
/// `access_token`, `refresh_token`, `expired_at` (local time,
/// `%Y-%m-%d %H:%M:%S`) and `expires_in` (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    #[serde(alias = "token", with = "secret")]
    pub access_token: SecretString,

    #[serde(default, with = "opt_secret", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<SecretString>,

    #[serde(default, with = "expiry", skip_serializing_if = "Option::is_none", alias = "expiry")]
    pub expired_at: Option<NaiveDateTime>,

    #[serde(default, deserialize_with = "lenient_seconds", skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenBundle {
    /// A bundle holding only an access token, with no known expiry.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(token.into()),
            refresh_token: None,
            expired_at: None,
            expires_in: None,
            token_type: None,
        }
    }
}

/// Success body of an OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Error body of an OAuth token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_bundle(
        self,
        now: NaiveDateTime,
        previous_refresh: Option<&SecretString>,
    ) -> TokenBundle {
        let expired_at = self
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
            .map(|ttl| now + ttl);
        TokenBundle {
            access_token: SecretString::from(self.access_token),
            // Google omits the refresh token on refresh; keep the one we had.
            refresh_token: self
                .refresh_token
                .map(SecretString::from)
                .or_else(|| previous_refresh.cloned()),
            expired_at,
            expires_in: self.expires_in,
            token_type: self.token_type,
        }
    }
}

/// A provider's OAuth token endpoint plus the app registration used against it.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub url: Url,
    pub app: AppCredentials,
}

impl TokenEndpoint {
    /// `grant_type=refresh_token`.
    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        timeout: Duration,
        refresh_token: &SecretString,
    ) -> Result<TokenBundle, Error> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.expose_secret()),
        ];
        self.request(http, timeout, &form, Some(refresh_token)).await
    }

    /// `grant_type=authorization_code`.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        timeout: Duration,
        code: &str,
    ) -> Result<TokenBundle, Error> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.expose_secret()),
        ];
        if let Some(redirect) = self.app.callback_url.as_deref() {
            form.push(("redirect_uri", redirect));
        }
        self.request(http, timeout, &form, None).await
    }

    async fn request(
        &self,
        http: &reqwest::Client,
        timeout: Duration,
        form: &[(&str, &str)],
        previous_refresh: Option<&SecretString>,
    ) -> Result<TokenBundle, Error> {
        debug!("POST {}", self.url);

        let resp = http
            .post(self.url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| classify(timeout, e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| classify(timeout, e))?;

        if !status.is_success() {
            let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            let message = match (parsed.error.as_deref(), parsed.error_description) {
                (Some(code), Some(desc)) => format!("{code}: {desc}"),
                (Some(code), None) => code.to_owned(),
                (None, _) => format!("HTTP {status}: {body}"),
            };
            return Err(if parsed.error.as_deref() == Some("invalid_grant") {
                Error::CredentialsRevoked { message }
            } else {
                Error::CredentialsExpired { message }
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        Ok(token.into_bundle(now(), previous_refresh))
    }
}

/// Holds one token bundle and keeps it fresh.
///
/// The holder refreshes when `now + margin >= expired_at`. A bundle with no
/// recorded expiry is refreshed whenever a refresh token is available.
#[derive(Debug)]
pub struct CredentialHolder {
    bundle: TokenBundle,
    endpoint: TokenEndpoint,
    margin: TimeDelta,
}

impl CredentialHolder {
    pub fn new(bundle: TokenBundle, endpoint: TokenEndpoint, margin: TimeDelta) -> Self {
        Self {
            bundle,
            endpoint,
            margin,
        }
    }

    /// The current bundle, for persisting across process restarts.
    pub fn bundle(&self) -> &TokenBundle {
        &self.bundle
    }

    pub fn endpoint(&self) -> &TokenEndpoint {
        &self.endpoint
    }

    /// Whether a refresh is due at `now`.
    pub fn needs_refresh_at(&self, now: NaiveDateTime) -> bool {
        match self.bundle.expired_at {
            Some(expired_at) => now + self.margin >= expired_at,
            None => self.bundle.refresh_token.is_some(),
        }
    }

    /// Return a valid access token, refreshing first if the bundle is near expiry.
    pub async fn access_token(
        &mut self,
        http: &reqwest::Client,
        timeout: Duration,
    ) -> Result<SecretString, Error> {
        if self.needs_refresh_at(now()) {
            self.refresh(http, timeout).await?;
        }
        Ok(self.bundle.access_token.clone())
    }

    /// Unconditionally exchange the refresh token for a new bundle.
    pub async fn refresh(
        &mut self,
        http: &reqwest::Client,
        timeout: Duration,
    ) -> Result<(), Error> {
        let Some(refresh_token) = self.bundle.refresh_token.clone() else {
            return Err(Error::CredentialsExpired {
                message: "bundle has no refresh token".into(),
            });
        };

        match self.endpoint.refresh(http, timeout, &refresh_token).await {
            Ok(bundle) => {
                warn!(client_id = %self.endpoint.app.client_id, "credentials refreshed");
                self.bundle = bundle;
                Ok(())
            }
            Err(err) => {
                warn!(
                    client_id = %self.endpoint.app.client_id,
                    error = %err,
                    "credential refresh failed"
                );
                match err {
                    Error::CredentialsRevoked { .. } | Error::CredentialsExpired { .. } => Err(err),
                    other => Err(Error::CredentialsExpired {
                        message: other.to_string(),
                    }),
                }
            }
        }
    }

    /// Replace the bundle wholesale (after an authorization-code exchange).
    pub fn replace(&mut self, bundle: TokenBundle) {
        self.bundle = bundle;
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

// ── Serde helpers ────────────────────────────────────────────────────

mod secret {
    use super::{Deserialize, Deserializer, ExposeSecret, SecretString, Serializer};

    pub fn serialize<S: Serializer>(value: &SecretString, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
        String::deserialize(d).map(SecretString::from)
    }
}

mod opt_secret {
    use super::{Deserialize, Deserializer, ExposeSecret, SecretString, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<SecretString>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_some(v.expose_secret()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
        Ok(Option::<String>::deserialize(d)?.map(SecretString::from))
    }
}

mod expiry {
    use super::{
        DateTime, Deserialize, Deserializer, EXPIRY_FORMAT, Local, NaiveDateTime, Serializer,
    };

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_some(&v.format(EXPIRY_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        parse(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}")))
    }

    pub(super) fn parse(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, EXPIRY_FORMAT)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Local).naive_local())
            })
    }
}

/// Accepts `15552000` as well as `"15552000"`.
fn lenient_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(d)? {
        None => Ok(None),
        Some(Seconds::Number(n)) => Ok(Some(n)),
        Some(Seconds::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected seconds, got {s:?}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    fn holder(expired_at: Option<NaiveDateTime>, refresh: Option<&str>) -> CredentialHolder {
        let bundle = TokenBundle {
            access_token: SecretString::from("access".to_owned()),
            refresh_token: refresh.map(|r| SecretString::from(r.to_owned())),
            expired_at,
            expires_in: None,
            token_type: None,
        };
        let endpoint = TokenEndpoint {
            url: Url::parse("https://oauth.example/token").unwrap(),
            app: AppCredentials {
                client_id: "id".into(),
                client_secret: SecretString::from("secret".to_owned()),
                callback_url: None,
            },
        };
        CredentialHolder::new(bundle, endpoint, TimeDelta::hours(10))
    }

    #[test]
    fn refresh_triggers_inside_margin() {
        let h = holder(Some(at(2024, 1, 2, 12)), Some("r"));
        // 10h margin boundary: exactly at expiry - 10h refreshes, one hour earlier does not.
        assert!(h.needs_refresh_at(at(2024, 1, 2, 2)));
        assert!(!h.needs_refresh_at(at(2024, 1, 2, 1)));
        assert!(h.needs_refresh_at(at(2024, 1, 3, 0)));
    }

    #[test]
    fn unknown_expiry_refreshes_only_with_refresh_token() {
        assert!(holder(None, Some("r")).needs_refresh_at(at(2024, 1, 1, 0)));
        assert!(!holder(None, None).needs_refresh_at(at(2024, 1, 1, 0)));
    }

    #[test]
    fn bundle_accepts_string_expires_in() {
        let raw = r#"{
            "access_token": "aqwert123",
            "refresh_token": "zxcvxvc123r43",
            "expired_at": "2019-02-02 13:00:38",
            "expires_in": "15552000"
        }"#;
        let bundle: TokenBundle = serde_json::from_str(raw).unwrap();
        assert_eq!(bundle.access_token.expose_secret(), "aqwert123");
        assert_eq!(bundle.expires_in, Some(15_552_000));
        assert_eq!(
            bundle.expired_at.map(|t| t.format(EXPIRY_FORMAT).to_string()).as_deref(),
            Some("2019-02-02 13:00:38")
        );

        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["expired_at"], "2019-02-02 13:00:38");
        assert_eq!(json["refresh_token"], "zxcvxvc123r43");
    }

    #[test]
    fn bundle_accepts_google_shape() {
        let raw =
            r#"{"token": "ya29.x", "refresh_token": "1//r", "expiry": "2024-05-01T10:00:00"}"#;
        let bundle: TokenBundle = serde_json::from_str(raw).unwrap();
        assert_eq!(bundle.access_token.expose_secret(), "ya29.x");
        assert_eq!(bundle.expired_at, Some(at(2024, 5, 1, 10)));
    }

    #[test]
    fn token_response_keeps_previous_refresh_token() {
        let resp = TokenResponse {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: Some(3600),
            token_type: Some("Bearer".into()),
        };
        let previous = SecretString::from("old-refresh".to_owned());
        let bundle = resp.into_bundle(at(2024, 1, 1, 0), Some(&previous));
        assert_eq!(bundle.expired_at, Some(at(2024, 1, 1, 1)));
        assert_eq!(
            bundle.refresh_token.as_ref().map(|r| r.expose_secret()),
            Some("old-refresh")
        );
    }
}
