//! CLI session setup: thin wrapper around `statpull_config`.
//!
//! Resolves app registrations and token files from `GlobalOpts` overrides
//! and builds the API clients a command needs.

use std::path::PathBuf;
use std::time::Duration;

use statpull_api::{AnalyticsClient, AppCredentials, TokenBundle, TransportConfig, YandexClient};
use statpull_config::{ConfigError, Provider};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Path resolution ─────────────────────────────────────────────────

/// App registration file: `--app-config` > platform default.
fn app_config_path(global: &GlobalOpts, provider: Provider) -> PathBuf {
    global
        .app_config
        .clone()
        .unwrap_or_else(|| statpull_config::app_config_path(provider))
}

/// Token bundle file: `--credentials` > platform default.
pub fn credentials_path(global: &GlobalOpts, provider: Provider) -> PathBuf {
    global
        .credentials
        .clone()
        .unwrap_or_else(|| statpull_config::credentials_path(provider))
}

// ── Loading ─────────────────────────────────────────────────────────

pub fn load_app(global: &GlobalOpts, provider: Provider) -> Result<AppCredentials, CliError> {
    let path = app_config_path(global, provider);
    match statpull_config::load_app_config(provider, &path) {
        Ok(config) => Ok(config.into_app_credentials()),
        Err(ConfigError::MissingAppConfig { path }) => Err(CliError::NoAppConfig {
            provider: provider.to_string(),
            env: provider.to_string().to_uppercase(),
            path: path.display().to_string(),
        }),
        Err(other) => Err(other.into()),
    }
}

fn load_bundle(global: &GlobalOpts, provider: Provider) -> Result<Option<TokenBundle>, CliError> {
    Ok(statpull_config::load_credentials(&credentials_path(
        global, provider,
    ))?)
}

pub fn transport(global: &GlobalOpts) -> TransportConfig {
    TransportConfig::with_timeout(Duration::from_secs(global.timeout))
}

// ── Clients ─────────────────────────────────────────────────────────

/// Yandex client with no bundle loaded, for the OAuth commands. A stale or
/// revoked saved bundle must not block getting a new one.
pub fn yandex_oauth_client(global: &GlobalOpts) -> Result<YandexClient, CliError> {
    let app = load_app(global, Provider::Yandex)?;
    Ok(YandexClient::new(app, &transport(global))?)
}

/// Yandex client; without a saved bundle only the OAuth commands work.
pub async fn yandex_client(global: &GlobalOpts) -> Result<YandexClient, CliError> {
    let app = load_app(global, Provider::Yandex)?;
    let transport = transport(global);
    let client = match load_bundle(global, Provider::Yandex)? {
        Some(bundle) => YandexClient::connect(app, bundle, &transport).await?,
        None => YandexClient::new(app, &transport)?,
    };
    Ok(client)
}

pub async fn ga_client(global: &GlobalOpts) -> Result<AnalyticsClient, CliError> {
    let app = load_app(global, Provider::Google)?;
    let path = credentials_path(global, Provider::Google);
    let Some(bundle) = load_bundle(global, Provider::Google)? else {
        return Err(CliError::NotAuthorized {
            provider: "google".into(),
            hint: format!(
                "Save a token bundle (access_token, refresh_token, expired_at) to\n{}\n\
                 or point --credentials at one.",
                path.display()
            ),
        });
    };
    AnalyticsClient::connect(app, bundle, &transport(global))
        .await
        .map_err(|err| CliError::from(err).for_google())
}

// ── Persistence ─────────────────────────────────────────────────────

/// Write the client's current bundle back so a refreshed token outlives
/// the process.
pub fn persist(
    global: &GlobalOpts,
    provider: Provider,
    bundle: &TokenBundle,
) -> Result<(), CliError> {
    let path = credentials_path(global, provider);
    statpull_config::save_credentials(&path, bundle)?;
    tracing::debug!(path = %path.display(), %provider, "credentials saved");
    Ok(())
}
