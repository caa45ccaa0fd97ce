//! Clap derive structures for the `statpull` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// statpull -- pull web analytics reports into flat rows
#[derive(Debug, Parser)]
#[command(
    name = "statpull",
    version,
    about = "Pull Google Analytics and Yandex Metrika reports from the command line",
    long_about = "Fetches reports from Google Analytics (Core Reporting v3, Reporting v4)\n\
        and Yandex (Metrika, AppMetrica, Direct/Wordstat), handling OAuth token\n\
        refresh, pagination and sampling, and prints them as flat rows.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// App registration file (client id/secret JSON)
    #[arg(long, env = "STATPULL_APP_CONFIG", global = true)]
    pub app_config: Option<PathBuf>,

    /// Token bundle file; refreshed tokens are written back here
    #[arg(long, env = "STATPULL_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "STATPULL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "STATPULL_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Tab-separated values with a header line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Yandex Metrika, AppMetrica and Direct
    #[command(alias = "ya")]
    Yandex(YandexArgs),

    /// Google Analytics reporting and management
    Ga(GaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  YANDEX
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct YandexArgs {
    #[command(subcommand)]
    pub command: YandexCommand,
}

#[derive(Debug, Subcommand)]
pub enum YandexCommand {
    /// Print the OAuth authorization link
    AuthUrl,

    /// Exchange an OAuth callback for a token bundle and save it
    Exchange {
        /// Bare authorization code
        #[arg(long, conflicts_with = "callback", required_unless_present = "callback")]
        code: Option<String>,

        /// Full redirect URL or its query string (`code=...` or `error=...`)
        #[arg(long)]
        callback: Option<String>,
    },

    /// Run a Metrika report
    Report(MetrikaReportArgs),

    /// List Metrika counters
    Counters {
        /// Page through the list this many counters at a time
        #[arg(long)]
        per_page: Option<u64>,
    },

    /// List a counter's goals
    Goals {
        /// Counter id
        counter: String,

        /// Include deleted goals
        #[arg(long)]
        include_deleted: bool,
    },

    /// List AppMetrica applications
    Apps,

    /// Dump the Direct region tree
    Regions,

    /// Suggest related search phrases
    Suggest {
        /// Seed keywords
        #[arg(required = true)]
        keywords: Vec<String>,
    },

    /// Wordstat search-volume reports
    Wordstat(WordstatArgs),
}

#[derive(Debug, Args)]
pub struct MetrikaReportArgs {
    /// Counter id
    #[arg(long, short = 'c')]
    pub counter: String,

    /// Comma-separated metrics (`ym:s:visits,ym:s:users`)
    #[arg(long, short = 'm')]
    pub metrics: String,

    /// Comma-separated dimensions (default: date + UTM tags)
    #[arg(long, short = 'd')]
    pub dimensions: Option<String>,

    /// Start date (YYYY-MM-DD or relative, e.g. 7daysAgo)
    #[arg(long)]
    pub start: String,

    /// End date (YYYY-MM-DD or relative, e.g. today)
    #[arg(long)]
    pub end: String,

    /// Metrika filter expression
    #[arg(long, short = 'f')]
    pub filters: Option<String>,

    /// Rows per page
    #[arg(long)]
    pub limit: Option<u64>,
}

#[derive(Debug, Args)]
pub struct WordstatArgs {
    #[command(subcommand)]
    pub command: WordstatCommand,
}

#[derive(Debug, Subcommand)]
pub enum WordstatCommand {
    /// Queue a report and print its id
    Create {
        /// Phrases to report on
        #[arg(required = true)]
        phrases: Vec<String>,

        /// Region ids to restrict to (comma-separated)
        #[arg(long, value_delimiter = ',')]
        geo: Vec<i64>,
    },

    /// Poll a report once; prints it when ready
    Status {
        /// Report id
        id: i64,
    },

    /// List reports held by the server
    #[command(alias = "ls")]
    List,

    /// Fetch a finished report
    Get {
        /// Report id
        id: i64,
    },

    /// Delete a report from the server
    Delete {
        /// Report id
        id: i64,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  GOOGLE ANALYTICS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct GaArgs {
    #[command(subcommand)]
    pub command: GaCommand,
}

#[derive(Debug, Subcommand)]
pub enum GaCommand {
    /// Core Reporting v3 query, one request chain per day
    Query(GaQueryArgs),

    /// Reporting v4 batch with sampling recovery
    Batch(GaBatchArgs),

    /// List accounts, properties and views
    Accounts {
        /// Only the account holding this view id
        #[arg(long)]
        profile: Option<String>,
    },

    /// List a view's goals
    Goals {
        /// Account id
        account: String,
        /// Web property id (UA-XXXX-Y)
        property: String,
        /// View (profile) id
        profile: String,
    },
}

#[derive(Debug, Args)]
pub struct GaQueryArgs {
    /// View (profile) id
    #[arg(long, short = 'p')]
    pub profile: String,

    /// Comma-separated metrics (`ga:sessions,ga:users`)
    #[arg(long, short = 'm')]
    pub metrics: String,

    /// Comma-separated dimensions (`ga:date,ga:source`)
    #[arg(long, short = 'd', default_value = "")]
    pub dimensions: String,

    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// v3 filter expression (`ga:medium==organic`)
    #[arg(long, short = 'f')]
    pub filters: Option<String>,
}

#[derive(Debug, Args)]
pub struct GaBatchArgs {
    /// View (profile) id
    #[arg(long, short = 'p')]
    pub profile: String,

    /// Range start (YYYY-MM-DD or relative, e.g. 7daysAgo)
    #[arg(long)]
    pub start: String,

    /// Range end
    #[arg(long)]
    pub end: String,

    /// Comma-separated metrics for one sub-report; repeat per sub-report
    #[arg(long, short = 'm', required = true)]
    pub metrics: Vec<String>,

    /// Comma-separated dimensions, paired with --metrics by position
    #[arg(long, short = 'd')]
    pub dimensions: Vec<String>,

    /// Rows per page
    #[arg(long)]
    pub page_size: Option<u32>,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
