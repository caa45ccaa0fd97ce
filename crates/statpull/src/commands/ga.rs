//! Google Analytics command handlers.

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use statpull_api::ga::types::{AccountSummary, DateRange};
use statpull_api::normalize::split_fields;
use statpull_api::{AnalyticsClient, V3Query, V4Request, split_outcomes};
use statpull_config::Provider;

use crate::cli::{GaArgs, GaBatchArgs, GaCommand, GaQueryArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

/// One view with its account and property, flattened for listing.
#[derive(Clone, Serialize, Tabled)]
struct ViewRow {
    #[tabled(rename = "Account")]
    account_id: String,
    #[tabled(rename = "Account name")]
    account_name: String,
    #[tabled(rename = "Property")]
    property_id: String,
    #[tabled(rename = "View")]
    view_id: String,
    #[tabled(rename = "View name")]
    view_name: String,
}

fn flatten(accounts: &[AccountSummary]) -> Vec<ViewRow> {
    accounts
        .iter()
        .flat_map(|account| {
            account.web_properties.iter().flat_map(move |property| {
                property.profiles.iter().map(move |view| ViewRow {
                    account_id: account.id.clone(),
                    account_name: account.name.clone(),
                    property_id: property.id.clone(),
                    view_id: view.id.clone(),
                    view_name: view.name.clone(),
                })
            })
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: GaArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = config::ga_client(global).await?;
    let result = run(&client, args.command, global).await.map_err(CliError::for_google);
    config::persist(global, Provider::Google, &client.credentials().await)?;
    result
}

async fn run(
    client: &AnalyticsClient,
    cmd: GaCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        GaCommand::Query(args) => query(client, args, global).await,

        GaCommand::Batch(args) => batch(client, args, global).await,

        GaCommand::Accounts { profile } => {
            let accounts = match profile {
                Some(profile) => {
                    let parent = client.parent_by_profile(&profile).await?;
                    let account = parent.ok_or_else(|| CliError::Validation {
                        field: "profile".into(),
                        reason: format!("no visible account holds view {profile}"),
                    })?;
                    vec![account]
                }
                None => client.account_summaries().await?,
            };
            let views = flatten(&accounts);
            let out = output::render_list(
                &global.output,
                &views,
                Clone::clone,
                |v| v.view_id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        GaCommand::Goals {
            account,
            property,
            profile,
        } => {
            let goals = client.goals(&account, &property, &profile).await?;
            util::print_json_list(goals, global)
        }
    }
}

/// v3 query split by day. Rows of the days that succeeded are printed
/// even when others failed; the exit code then reports the partial result.
async fn query(
    client: &AnalyticsClient,
    args: GaQueryArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let metrics = util::required_fields("metrics", &args.metrics)?;
    let start = util::parse_day("start", &args.start)?;
    let end = util::parse_day("end", &args.end)?;
    let mut query = V3Query::new(args.profile, metrics, split_fields(&args.dimensions), start, end);
    if let Some(filters) = args.filters {
        query = query.with_filters(filters);
    }

    let days = client.fetch_report_v3(&query).await?;
    let total = days.len();
    let (rows, failures) = split_outcomes(days);

    if !failures.is_empty() && failures.len() == total {
        if let Some((_, err)) = failures.into_iter().next() {
            return Err(err.into());
        }
        return Ok(());
    }

    let out = output::render_rows(&global.output, &rows)?;
    output::print_output(&out, global.quiet);

    if failures.is_empty() {
        return Ok(());
    }
    for (date, err) in &failures {
        warn!(%date, error = %err, "day failed");
    }
    Err(CliError::PartialReport {
        failed: failures.len(),
        total,
    })
}

async fn batch(
    client: &AnalyticsClient,
    args: GaBatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.dimensions.len() > args.metrics.len() {
        return Err(CliError::Validation {
            field: "dimensions".into(),
            reason: format!(
                "{} dimension sets for {} metric sets",
                args.dimensions.len(),
                args.metrics.len()
            ),
        });
    }
    let metric_sets = args
        .metrics
        .iter()
        .map(|raw| util::required_fields("metrics", raw))
        .collect::<Result<Vec<_>, _>>()?;
    // Sub-reports without --dimensions get none.
    let dimension_sets = (0..metric_sets.len())
        .map(|i| {
            args.dimensions
                .get(i)
                .map(|raw| split_fields(raw))
                .unwrap_or_default()
        })
        .collect();

    let mut request = V4Request::new(
        args.profile,
        vec![DateRange::new(args.start, args.end)],
        metric_sets,
        dimension_sets,
    );
    if let Some(page_size) = args.page_size {
        request = request.with_page_size(page_size.max(1));
    }

    let reports = client.fetch_report_v4(&request).await?;
    let out = output::render_reports(&global.output, &reports)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use statpull_api::ga::types::{ProfileSummary, WebPropertySummary};

    #[test]
    fn flatten_lists_every_view() {
        let accounts = vec![AccountSummary {
            id: "1".into(),
            name: "Shop".into(),
            web_properties: vec![WebPropertySummary {
                id: "UA-1-1".into(),
                name: "shop.example".into(),
                website_url: None,
                profiles: vec![
                    ProfileSummary {
                        id: "10".into(),
                        name: "All".into(),
                        kind: None,
                    },
                    ProfileSummary {
                        id: "11".into(),
                        name: "Raw".into(),
                        kind: Some("WEB".into()),
                    },
                ],
            }],
        }];
        let views = flatten(&accounts);
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].view_id, "11");
        assert_eq!(views[1].property_id, "UA-1-1");
    }
}
