//! Shared helpers for command handlers.

use chrono::NaiveDate;
use serde_json::Value;
use url::Url;

use statpull_api::CallbackParams;
use statpull_api::dates::parse_date;
use statpull_api::normalize::split_fields;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Split a comma-separated field list, rejecting an empty one.
pub fn required_fields(field: &str, raw: &str) -> Result<Vec<String>, CliError> {
    let fields = split_fields(raw);
    if fields.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "at least one name is required".into(),
        });
    }
    Ok(fields)
}

/// Parse an absolute `YYYY-MM-DD` date.
pub fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, CliError> {
    parse_date(raw).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected YYYY-MM-DD, got {raw:?}"),
    })
}

/// Build OAuth callback parameters from `--code` or `--callback`.
///
/// `--callback` takes either the full redirect URL or just its query string.
pub fn callback_params(code: Option<String>, callback: Option<&str>) -> CallbackParams {
    if let Some(code) = code {
        return CallbackParams::from_code(code);
    }
    let raw = callback.unwrap_or_default();
    match Url::parse(raw) {
        Ok(url) => CallbackParams::from_query(url.query().unwrap_or_default()),
        Err(_) => CallbackParams::from_query(raw),
    }
}

/// Status line on stderr so stdout stays machine-readable.
pub fn notice(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

/// Print loosely typed provider JSON (goals, regions, Wordstat reports).
pub fn print_json(value: &Value, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_json_value(&global.output, value)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn print_json_list(values: Vec<Value>, global: &GlobalOpts) -> Result<(), CliError> {
    print_json(&Value::Array(values), global)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn callback_accepts_full_redirect_url() {
        let params = callback_params(
            None,
            Some("https://my.callback.ru/oauth2/yandex?code=4321&state=x"),
        );
        assert_eq!(params.code.as_deref(), Some("4321"));
        assert!(params.error.is_none());
    }

    #[test]
    fn callback_accepts_bare_query() {
        let params = callback_params(None, Some("error=access_denied&error_description=nope"));
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("nope"));
    }

    #[test]
    fn explicit_code_wins() {
        let params = callback_params(Some("abc".into()), None);
        assert_eq!(params.code.as_deref(), Some("abc"));
    }

    #[test]
    fn empty_field_list_is_rejected() {
        assert!(required_fields("metrics", " , ").is_err());
        assert_eq!(
            required_fields("metrics", "ga:sessions, ga:users").unwrap(),
            ["ga:sessions", "ga:users"]
        );
    }

    #[test]
    fn relative_dates_are_not_days() {
        assert!(parse_day("start", "7daysAgo").is_err());
        assert_eq!(
            parse_day("start", "2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }
}
