// Yandex OAuth: authorization link and callback handling.

use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::auth::TokenBundle;
use crate::error::Error;
use crate::yandex::client::YandexClient;

/// Query parameters Yandex appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string (`code=...&state=...`). A leading `?` is
    /// tolerated; unknown keys are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        params
    }

    /// A bare authorization code (`--code` on the command line).
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }
}

impl YandexClient {
    /// The page the user visits to grant access:
    /// `{oauth}/authorize?response_type=code&client_id=...`.
    pub fn authorize_url(&self) -> Result<Url, Error> {
        let mut url = self.endpoints().oauth.join("authorize")?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.app().client_id);
        Ok(url)
    }

    /// Finish the OAuth flow: exchange the callback's code for a token
    /// bundle and install it on this client.
    ///
    /// An `error` parameter in the callback is reported as
    /// [`Error::OAuthDenied`] without contacting the token endpoint.
    pub async fn process_oauth_code(&self, params: &CallbackParams) -> Result<TokenBundle, Error> {
        if let Some(code) = &params.error {
            let description = params.error_description.clone().unwrap_or_default();
            warn!(code, description, "YA: oauth authorization denied");
            return Err(Error::OAuthDenied {
                code: code.clone(),
                description,
            });
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::InvalidRequest("OAuth callback carries no code".into()))?;

        let bundle = self
            .token_endpoint()?
            .exchange_code(self.http(), self.timeout(), code)
            .await?;
        info!("YA: oauth code exchanged for a token");
        self.install_bundle(bundle.clone()).await?;
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_callback_query() {
        let params = CallbackParams::from_query("?code=4242&state=x");
        assert_eq!(params.code.as_deref(), Some("4242"));
        assert_eq!(params.error, None);

        let denied =
            CallbackParams::from_query("error=access_denied&error_description=user+said+no");
        assert_eq!(denied.error.as_deref(), Some("access_denied"));
        assert_eq!(denied.error_description.as_deref(), Some("user said no"));
    }
}
