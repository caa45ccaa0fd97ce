//! Yandex command handlers: OAuth, Metrika, AppMetrica, Direct and Wordstat.

use tabled::Tabled;

use statpull_api::normalize::split_fields;
use statpull_api::yandex::{Counter, CounterPaging, WordstatReportInfo};
use statpull_api::{MetrikaQuery, WordstatJob, WordstatStatus, YandexClient};
use statpull_config::Provider;

use crate::cli::{GlobalOpts, MetrikaReportArgs, WordstatCommand, YandexArgs, YandexCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct CounterRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Counter> for CounterRow {
    fn from(c: &Counter) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            site: c.site.clone().unwrap_or_default(),
            status: c.status.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ReportInfoRow {
    #[tabled(rename = "Report")]
    id: i64,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&WordstatReportInfo> for ReportInfoRow {
    fn from(r: &WordstatReportInfo) -> Self {
        Self {
            id: r.report_id,
            status: r.status.clone(),
        }
    }
}

#[derive(Tabled)]
struct PhraseRow {
    #[tabled(rename = "Phrase")]
    phrase: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: YandexArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = match args.command {
        YandexCommand::AuthUrl | YandexCommand::Exchange { .. } => {
            config::yandex_oauth_client(global)?
        }
        _ => config::yandex_client(global).await?,
    };
    let result = run(&client, args.command, global).await;

    // Persist whatever the client holds, even if the command itself failed
    // after a refresh.
    if let Some(bundle) = client.credentials().await {
        config::persist(global, Provider::Yandex, &bundle)?;
    }
    result
}

async fn run(
    client: &YandexClient,
    cmd: YandexCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        YandexCommand::AuthUrl => {
            let url = client.authorize_url()?;
            output::print_output(url.as_str(), global.quiet);
            Ok(())
        }

        YandexCommand::Exchange { code, callback } => {
            let params = util::callback_params(code, callback.as_deref());
            client.process_oauth_code(&params).await?;
            let path = config::credentials_path(global, Provider::Yandex);
            util::notice(
                &format!("Authorized; token saved to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        YandexCommand::Report(args) => report(client, args, global).await,

        YandexCommand::Counters { per_page } => {
            let paging = per_page.map(|per_page| CounterPaging {
                per_page: per_page.max(1),
                ..CounterPaging::default()
            });
            let counters = client.counters_list(paging).await?;
            let out = output::render_list(
                &global.output,
                &counters,
                |c| CounterRow::from(c),
                |c| c.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        YandexCommand::Goals {
            counter,
            include_deleted,
        } => {
            let goals = client.counter_goals(&counter, include_deleted).await?;
            util::print_json_list(goals, global)
        }

        YandexCommand::Apps => {
            let apps = client.applications_list().await?;
            util::print_json_list(apps, global)
        }

        YandexCommand::Regions => {
            let regions = client.regions().await?;
            util::print_json_list(regions, global)
        }

        YandexCommand::Suggest { keywords } => {
            let phrases = client.keyword_suggestions(&keywords).await?;
            let out = output::render_list(
                &global.output,
                &phrases,
                |p| PhraseRow { phrase: p.clone() },
                Clone::clone,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        YandexCommand::Wordstat(args) => wordstat(client, args.command, global).await,
    }
}

async fn report(
    client: &YandexClient,
    args: MetrikaReportArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let metrics = util::required_fields("metrics", &args.metrics)?;
    let mut query = MetrikaQuery::new(args.counter, metrics, args.start, args.end);
    if let Some(raw) = args.dimensions {
        query = query.with_dimensions(split_fields(&raw));
    }
    if let Some(filters) = args.filters {
        query = query.with_filters(filters);
    }
    if let Some(limit) = args.limit {
        query = query.with_limit(limit);
    }

    let rows = client.get_report(&query).await?;
    let out = output::render_rows(&global.output, &rows)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Wordstat ────────────────────────────────────────────────────────

async fn wordstat(
    client: &YandexClient,
    cmd: WordstatCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        WordstatCommand::Create { phrases, geo } => {
            let geo = (!geo.is_empty()).then_some(geo.as_slice());
            let job = client.create_wordstat_report(&phrases, geo).await?;
            output::print_output(&job.id().to_string(), global.quiet);
            Ok(())
        }

        WordstatCommand::Status { id } => {
            let mut job = WordstatJob::resume(id);
            match client.poll_wordstat(&mut job).await? {
                WordstatStatus::Ready(report) => util::print_json(&report, global),
                WordstatStatus::Failed(reason) => Err(CliError::Protocol {
                    message: format!("wordstat report {id} failed: {reason}"),
                }),
                pending => {
                    output::print_output(pending.label(), global.quiet);
                    Ok(())
                }
            }
        }

        WordstatCommand::List => {
            let reports = client.wordstat_report_list().await?;
            let out = output::render_list(
                &global.output,
                &reports,
                |r| ReportInfoRow::from(r),
                |r| format!("{}\t{}", r.report_id, r.status),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WordstatCommand::Get { id } => {
            let report = client.get_wordstat_report(id).await?;
            util::print_json(&report, global)
        }

        WordstatCommand::Delete { id } => {
            client.delete_wordstat_report(id).await?;
            util::notice(&format!("Wordstat report {id} deleted"), global.quiet);
            Ok(())
        }
    }
}
