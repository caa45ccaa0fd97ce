//! Shared configuration for the statpull CLI.
//!
//! App registrations (OAuth client id/secret) come from a JSON file merged
//! with `STATPULL_<PROVIDER>_*` environment variables. Token bundles are
//! persisted as JSON next to them so a refreshed token survives the process.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Json},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use statpull_api::{AppCredentials, TokenBundle};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no app registration found at {path}")]
    MissingAppConfig { path: PathBuf },

    #[error("credentials file {path} is not a token bundle: {source}")]
    Credentials {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize credentials: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Providers ───────────────────────────────────────────────────────

/// Which API an app registration or token bundle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    Yandex,
    Google,
}

impl Provider {
    fn env_prefix(self) -> &'static str {
        match self {
            Self::Yandex => "STATPULL_YANDEX_",
            Self::Google => "STATPULL_GOOGLE_",
        }
    }
}

// ── App registration ────────────────────────────────────────────────

/// An OAuth app registration.
///
/// Accepts the flat Yandex layout (`app_name`, `client_id`,
/// `client_secret`, `callback_url`) and Google's `client_secrets.json`,
/// where the same fields sit under `installed` or `web` and the redirect is
/// the first of `redirect_uris`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub client_id: String,
    /// Plaintext here; converted to a `SecretString` on the way out.
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,
}

impl AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    reason: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }

    /// Redirect URI sent with the authorization-code exchange.
    pub fn redirect(&self) -> Option<&str> {
        self.callback_url
            .as_deref()
            .or_else(|| self.redirect_uris.first().map(String::as_str))
    }

    pub fn into_app_credentials(self) -> AppCredentials {
        let callback_url = self.redirect().map(str::to_owned);
        AppCredentials {
            client_id: self.client_id,
            client_secret: SecretString::from(self.client_secret),
            callback_url,
        }
    }
}

/// Google nests the registration under the client type.
const NESTED_KEYS: &[&str] = &["installed", "web"];

/// Load an app registration from `path`, overridden by environment
/// variables (`STATPULL_YANDEX_CLIENT_ID`, `STATPULL_GOOGLE_CLIENT_SECRET`, ...).
pub fn load_app_config(provider: Provider, path: &Path) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Json::file(path));
    if let Some(key) = NESTED_KEYS
        .iter()
        .find(|key| figment.find_value(key).is_ok())
    {
        figment = figment.focus(key);
    }
    let figment = figment.merge(Env::prefixed(provider.env_prefix()));

    let config: AppConfig = figment.extract()?;
    if config.client_id.is_empty() && !path.exists() {
        return Err(ConfigError::MissingAppConfig {
            path: path.to_path_buf(),
        });
    }
    config.validate()?;
    Ok(config)
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "statpull", "statpull")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("statpull");
    p
}

/// Directory holding app registrations (`yandex.json`, `google.json`).
pub fn config_dir() -> PathBuf {
    project_dirs().map_or_else(dirs_fallback, |dirs| dirs.config_dir().to_path_buf())
}

/// Default app registration file for `provider`.
pub fn app_config_path(provider: Provider) -> PathBuf {
    config_dir().join(format!("{provider}.json"))
}

/// Default token bundle file for `provider`.
pub fn credentials_path(provider: Provider) -> PathBuf {
    let base = project_dirs().map_or_else(
        || dirs_fallback().join("data"),
        |dirs| dirs.data_dir().to_path_buf(),
    );
    base.join("credentials").join(format!("{provider}.json"))
}

// ── Token bundles ───────────────────────────────────────────────────

/// Read a persisted token bundle. A missing file means "not authorized yet".
pub fn load_credentials(path: &Path) -> Result<Option<TokenBundle>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Credentials {
            path: path.to_path_buf(),
            source,
        })
}

/// Write a token bundle, creating parent directories as needed.
pub fn save_credentials(path: &Path, bundle: &TokenBundle) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(bundle)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_flat_yandex_registration() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "yandex.json",
            r#"{
                "app_name": "YandexAPIApp",
                "client_id": "aabbcc",
                "client_secret": "ddeeff",
                "callback_url": "https://my.callback.ru/oauth2/yandex"
            }"#,
        );
        let config = load_app_config(Provider::Yandex, &path).unwrap();
        assert_eq!(config.app_name.as_deref(), Some("YandexAPIApp"));

        let app = config.into_app_credentials();
        assert_eq!(app.client_id, "aabbcc");
        assert_eq!(app.client_secret.expose_secret(), "ddeeff");
        assert_eq!(app.callback_url.as_deref(), Some("https://my.callback.ru/oauth2/yandex"));
    }

    #[test]
    fn loads_google_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "google.json",
            r#"{"installed": {
                "client_id": "123.apps.googleusercontent.com",
                "client_secret": "s3cr3t",
                "redirect_uris": ["http://localhost", "urn:ietf:wg:oauth:2.0:oob"]
            }}"#,
        );
        let app = load_app_config(Provider::Google, &path)
            .unwrap()
            .into_app_credentials();
        assert_eq!(app.client_id, "123.apps.googleusercontent.com");
        assert_eq!(app.callback_url.as_deref(), Some("http://localhost"));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "yandex.json", r#"{"client_id": "x", "client_secret": ""}"#);
        let err = load_app_config(Provider::Yandex, &path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation { ref field, .. } if field == "client_secret"
        ));
    }

    #[test]
    fn credentials_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("yandex.json");
        assert!(load_credentials(&path).unwrap().is_none());

        let bundle: TokenBundle = serde_json::from_str(
            r#"{"access_token": "a", "refresh_token": "r", "expired_at": "2030-01-01 00:00:00"}"#,
        )
        .unwrap();
        save_credentials(&path, &bundle).unwrap();

        let loaded = load_credentials(&path).unwrap().unwrap();
        assert_eq!(loaded.access_token.expose_secret(), "a");
        assert_eq!(loaded.expired_at, bundle.expired_at);
    }

    #[test]
    fn garbage_credentials_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "google.json", "not json");
        let err = load_credentials(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Credentials { .. }));
        assert!(err.to_string().contains("google.json"));
    }

    #[test]
    fn default_paths_are_per_provider() {
        assert!(app_config_path(Provider::Yandex).ends_with("yandex.json"));
        assert!(credentials_path(Provider::Google).ends_with("credentials/google.json"));
    }
}
