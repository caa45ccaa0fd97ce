// Google Analytics HTTP client
//
// Wraps `reqwest::Client` with bearer-token auth, endpoint URL construction
// and response decoding. The report and management operations live in
// sibling modules as inherent methods to keep this one about transport.

use std::time::Duration;

use chrono::TimeDelta;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::auth::{AppCredentials, CredentialHolder, TokenBundle, TokenEndpoint};
use crate::error::Error;
use crate::transport::{TransportConfig, classify, ensure_trailing_slash};

/// Google access tokens live for an hour; refresh a little early.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Base URLs of the three Google services the client talks to.
#[derive(Debug, Clone)]
pub struct GaEndpoints {
    /// Core Reporting + Management API v3 root.
    pub v3: Url,
    /// Analytics Reporting API v4 root.
    pub v4: Url,
    /// OAuth token endpoint.
    pub token: Url,
}

impl GaEndpoints {
    pub fn google() -> Result<Self, Error> {
        Ok(Self {
            v3: Url::parse("https://www.googleapis.com/analytics/v3/")?,
            v4: Url::parse("https://analyticsreporting.googleapis.com/v4/")?,
            token: Url::parse("https://oauth2.googleapis.com/token")?,
        })
    }

    /// All three services under one root (`{base}/analytics/v3/`,
    /// `{base}/v4/`, `{base}/token`). Used for proxies and tests.
    pub fn under(base: &Url) -> Result<Self, Error> {
        let root = ensure_trailing_slash(base);
        Ok(Self {
            v3: root.join("analytics/v3/")?,
            v4: root.join("v4/")?,
            token: root.join("token")?,
        })
    }
}

/// Async client for the Google Analytics reporting APIs.
///
/// Owns one OAuth credential bundle; every request first makes sure the
/// access token is still valid and refreshes it otherwise.
pub struct AnalyticsClient {
    http: reqwest::Client,
    timeout: Duration,
    endpoints: GaEndpoints,
    credentials: Mutex<CredentialHolder>,
}

impl AnalyticsClient {
    /// Build a client against Google's public endpoints.
    ///
    /// Refreshes the bundle up front if it is expired or about to expire; a
    /// failed refresh is returned here rather than on the first report call.
    pub async fn connect(
        app: AppCredentials,
        bundle: TokenBundle,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, transport.timeout, GaEndpoints::google()?, app, bundle).await
    }

    /// Build a client from a pre-built `reqwest::Client` and explicit endpoints.
    pub async fn with_client(
        http: reqwest::Client,
        timeout: Duration,
        endpoints: GaEndpoints,
        app: AppCredentials,
        bundle: TokenBundle,
    ) -> Result<Self, Error> {
        let endpoint = TokenEndpoint {
            url: endpoints.token.clone(),
            app,
        };
        let holder = CredentialHolder::new(
            bundle,
            endpoint,
            TimeDelta::minutes(REFRESH_MARGIN_MINUTES),
        );
        let client = Self {
            http,
            timeout,
            endpoints,
            credentials: Mutex::new(holder),
        };
        client.bearer().await?;
        Ok(client)
    }

    /// Snapshot of the current credential bundle, for persistence.
    pub async fn credentials(&self) -> TokenBundle {
        self.credentials.lock().await.bundle().clone()
    }

    async fn bearer(&self) -> Result<SecretString, Error> {
        let mut holder = self.credentials.lock().await;
        holder.access_token(&self.http, self.timeout).await
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn v3_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.endpoints.v3.join(path)?)
    }

    pub(crate) fn v4_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.endpoints.v4.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Authenticated GET with query parameters, decoded as JSON.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let token = self.bearer().await?;
        debug!("GET {url} params={params:?}");

        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(token.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(|e| classify(self.timeout, e))?;

        self.decode(&url, resp).await
    }

    /// Authenticated POST with a JSON body, decoded as JSON.
    pub(crate) async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, Error> {
        let token = self.bearer().await?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url.clone())
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| classify(self.timeout, e))?;

        self.decode(&url, resp).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        url: &Url,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| classify(self.timeout, e))?;

        if !status.is_success() {
            return Err(Error::Api {
                endpoint: url.path().to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })
    }
}
