// Yandex HTTP client
//
// Two transport primitives cover every Yandex endpoint the crate uses:
// `request` (Metrika/AppMetrica/OAuth REST, `Authorization: OAuth` header)
// and `direct_request` (Direct's JSON-RPC-like v4 Live endpoint, token in
// the body). Endpoint modules add inherent methods on top.

use std::time::Duration;

use chrono::TimeDelta;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use url::Url;

use crate::auth::{AppCredentials, CredentialHolder, TokenBundle, TokenEndpoint};
use crate::error::Error;
use crate::transport::{TransportConfig, classify, ensure_trailing_slash};

/// Yandex tokens live for months; refresh well ahead of expiry.
const REFRESH_MARGIN_HOURS: i64 = 10;

/// Body Metrika returns while a report is still being assembled.
const QUEUED_SENTINEL: &str = "Your query is added to the queue.";
const WAIT_SENTINEL: &str = "Wait for result.";

/// Yandex REST services reachable through [`YandexClient::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Service {
    #[strum(serialize = "api-metrika")]
    Metrika,
    #[strum(serialize = "api.appmetrica")]
    AppMetrica,
}

/// Base URLs of the Yandex services.
#[derive(Debug, Clone)]
pub struct YandexEndpoints {
    pub oauth: Url,
    pub metrika: Url,
    pub appmetrica: Url,
    /// Direct API v4 Live JSON endpoint.
    pub direct: Url,
}

impl YandexEndpoints {
    pub fn yandex() -> Result<Self, Error> {
        Ok(Self {
            oauth: Url::parse("https://oauth.yandex.ru/")?,
            metrika: Url::parse("https://api-metrika.yandex.ru/")?,
            appmetrica: Url::parse("https://api.appmetrica.yandex.ru/")?,
            direct: Url::parse("https://api.direct.yandex.ru/live/v4/json/")?,
        })
    }

    /// Every service under one root (`{base}/oauth/`, `{base}/metrika/`,
    /// `{base}/appmetrica/`, `{base}/direct/`). Used for proxies and tests.
    pub fn under(base: &Url) -> Result<Self, Error> {
        let root = ensure_trailing_slash(base);
        Ok(Self {
            oauth: root.join("oauth/")?,
            metrika: root.join("metrika/")?,
            appmetrica: root.join("appmetrica/")?,
            direct: root.join("direct/")?,
        })
    }

    fn service(&self, service: Service) -> &Url {
        match service {
            Service::Metrika => &self.metrika,
            Service::AppMetrica => &self.appmetrica,
        }
    }
}

/// Successful outcome of [`YandexClient::request`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoResponse {
    /// Parsed JSON body.
    Json(Value),
    /// The report is queued; poll again later. Carries the provider's text.
    Pending(String),
    /// Raw text body (CSV endpoints).
    Text(String),
}

impl ProtoResponse {
    /// The JSON body, or a protocol error naming what came back instead.
    pub fn into_json(self, endpoint: &str) -> Result<Value, Error> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Pending(body) | Self::Text(body) => Err(Error::MissingField {
                endpoint: endpoint.to_owned(),
                field: "json body",
                body,
            }),
        }
    }
}

/// Async client for Yandex Metrika, AppMetrica and Direct (v4 Live).
///
/// Holds at most one OAuth credential bundle. Without one, only the OAuth
/// flow ([`authorize_url`](Self::authorize_url),
/// [`process_oauth_code`](Self::process_oauth_code)) is usable.
pub struct YandexClient {
    http: reqwest::Client,
    timeout: Duration,
    endpoints: YandexEndpoints,
    app: AppCredentials,
    credentials: Mutex<Option<CredentialHolder>>,
}

impl YandexClient {
    /// A client with no credentials yet.
    pub fn new(app: AppCredentials, transport: &TransportConfig) -> Result<Self, Error> {
        let client = Self {
            http: transport.build_client()?,
            timeout: transport.timeout,
            endpoints: YandexEndpoints::yandex()?,
            app,
            credentials: Mutex::new(None),
        };
        warn!(
            "YA: empty credentials, obtain a token via {}",
            client.authorize_url()?
        );
        Ok(client)
    }

    /// A client owning `bundle`, refreshed up front if it is within
    /// the safety margin of expiry. Refresh failure is returned here.
    pub async fn connect(
        app: AppCredentials,
        bundle: TokenBundle,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, transport.timeout, YandexEndpoints::yandex()?, app, Some(bundle))
            .await
    }

    /// Build from a pre-built `reqwest::Client` and explicit endpoints.
    pub async fn with_client(
        http: reqwest::Client,
        timeout: Duration,
        endpoints: YandexEndpoints,
        app: AppCredentials,
        bundle: Option<TokenBundle>,
    ) -> Result<Self, Error> {
        let client = Self {
            http,
            timeout,
            endpoints,
            app,
            credentials: Mutex::new(None),
        };
        if let Some(bundle) = bundle {
            client.install_bundle(bundle).await?;
            client.access_token().await?;
        }
        Ok(client)
    }

    pub fn app(&self) -> &AppCredentials {
        &self.app
    }

    pub fn endpoints(&self) -> &YandexEndpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn token_endpoint(&self) -> Result<TokenEndpoint, Error> {
        Ok(TokenEndpoint {
            url: self.endpoints.oauth.join("token")?,
            app: self.app.clone(),
        })
    }

    /// Install or replace the credential bundle.
    pub(crate) async fn install_bundle(&self, bundle: TokenBundle) -> Result<(), Error> {
        let mut slot = self.credentials.lock().await;
        match slot.as_mut() {
            Some(holder) => holder.replace(bundle),
            None => {
                *slot = Some(CredentialHolder::new(
                    bundle,
                    self.token_endpoint()?,
                    TimeDelta::hours(REFRESH_MARGIN_HOURS),
                ));
            }
        }
        Ok(())
    }

    /// Snapshot of the current bundle, for persistence. `None` before the
    /// OAuth flow has completed.
    pub async fn credentials(&self) -> Option<TokenBundle> {
        self.credentials
            .lock()
            .await
            .as_ref()
            .map(|holder| holder.bundle().clone())
    }

    async fn access_token(&self) -> Result<SecretString, Error> {
        let mut slot = self.credentials.lock().await;
        match slot.as_mut() {
            Some(holder) => holder.access_token(&self.http, self.timeout).await,
            None => Err(Error::MissingCredentials {
                authorize_url: self.authorize_url()?.to_string(),
            }),
        }
    }

    // ── Transport primitives ─────────────────────────────────────────

    /// Call a Yandex REST endpoint.
    ///
    /// GET sends `params` as a query string, POST as a form body. With
    /// `restricted`, the OAuth access token goes in the `Authorization`
    /// header. 202 and Metrika's queue sentinels come back as
    /// [`ProtoResponse::Pending`]; `.csv` paths as [`ProtoResponse::Text`].
    pub async fn request(
        &self,
        method: Method,
        service: Service,
        path: &str,
        params: &[(&str, String)],
        restricted: bool,
    ) -> Result<ProtoResponse, Error> {
        let url = self.endpoints.service(service).join(path)?;
        debug!("{method} {url} params={params:?}");

        let mut builder = if method == Method::POST {
            self.http.post(url.clone()).form(params)
        } else {
            self.http.request(method, url.clone()).query(params)
        };
        if restricted {
            let token = self.access_token().await?;
            builder = builder.header(
                reqwest::header::AUTHORIZATION,
                format!("OAuth {}", token.expose_secret()),
            );
        }

        let resp = builder.send().await.map_err(|e| classify(self.timeout, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| classify(self.timeout, e))?;

        if status == reqwest::StatusCode::ACCEPTED {
            return Ok(ProtoResponse::Pending(body));
        }
        if status != reqwest::StatusCode::OK {
            error!("YA: {path} : {body}");
            return Err(Error::Api {
                endpoint: format!("{service}/{path}"),
                status: status.as_u16(),
                body,
            });
        }

        if path.contains(".csv") {
            return Ok(ProtoResponse::Text(body));
        }
        if body == QUEUED_SENTINEL || body.contains(WAIT_SENTINEL) {
            return Ok(ProtoResponse::Pending(body));
        }

        serde_json::from_str(&body)
            .map(ProtoResponse::Json)
            .map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })
    }

    /// Call a Direct v4 Live method and return its `data` payload.
    ///
    /// The access token travels inside the JSON body. A 200 answer without
    /// `data` is a protocol failure, reported with Direct's `error_code`
    /// when it sent one.
    pub async fn direct_request(
        &self,
        method: &str,
        param: Option<Value>,
        locale: Option<&str>,
    ) -> Result<Value, Error> {
        let token = self.access_token().await?;
        let mut body = Map::new();
        body.insert("method".into(), json!(method));
        if let Some(param) = param {
            body.insert("param".into(), param);
        }
        if let Some(locale) = locale {
            body.insert("locale".into(), json!(locale));
        }
        body.insert("token".into(), json!(token.expose_secret()));

        let url = self.endpoints.direct.clone();
        debug!(method, "POST {url}");

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(self.timeout, e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| classify(self.timeout, e))?;

        if status != reqwest::StatusCode::OK {
            error!("YA: {method} : {text}");
            return Err(Error::Api {
                endpoint: format!("direct/{method}"),
                status: status.as_u16(),
                body: text,
            });
        }

        let mut parsed: Value = serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.clone(),
        })?;

        if let Some(data) = parsed.get_mut("data") {
            return Ok(data.take());
        }

        error!("YA: {method} : {text}");
        match parsed.get("error_code").and_then(Value::as_i64) {
            Some(code) => {
                let message = ["error_str", "error_detail"]
                    .iter()
                    .filter_map(|k| parsed.get(*k).and_then(Value::as_str))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(": ");
                Err(Error::Direct {
                    method: method.to_owned(),
                    code,
                    message,
                })
            }
            None => Err(Error::MissingField {
                endpoint: format!("direct/{method}"),
                field: "data",
                body: text,
            }),
        }
    }
}
