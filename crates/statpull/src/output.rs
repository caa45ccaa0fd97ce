//! Output formatting: table, JSON, YAML, plain.
//!
//! Report rows have no fixed schema, so tables are built from the row keys
//! at runtime. Typed listings (counters, accounts) go through `render_list`
//! with a `Tabled` projection.

use std::io::{self, Write};

use serde::Serialize;
use tabled::{Table, Tabled, builder::Builder, settings::Style};

use statpull_api::Row;
use statpull_api::normalize::display_value;

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render normalized report rows.
///
/// - `table`: one column per field, in first-seen order
/// - `json` / `json-compact` / `yaml`: the rows as an array of objects
/// - `plain`: tab-separated, header line first
pub fn render_rows(format: &OutputFormat, rows: &[Row]) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(rows_table(rows)),
        OutputFormat::Plain => Ok(rows_tsv(rows)),
        other => render_value(other, rows),
    }
}

/// Render several reports from one batch. Tables and plain output get one
/// section per report; structured formats keep the nesting.
pub fn render_reports(format: &OutputFormat, reports: &[Vec<Row>]) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            let sections = reports
                .iter()
                .map(|rows| render_rows(format, rows))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sections.join("\n\n"))
        }
        other => render_value(other, reports),
    }
}

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Plain => Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n")),
        other => render_value(other, data),
    }
}

/// Render loosely typed provider JSON. Tables fall back to pretty JSON.
pub fn render_json_value(
    format: &OutputFormat,
    value: &serde_json::Value,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => render_value(&OutputFormat::Json, value),
        OutputFormat::Plain => Ok(display_value(value)),
        other => render_value(other, value),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_value<T: Serialize + ?Sized>(
    format: &OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        _ => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
    };
    rendered.map_err(CliError::Render)
}

fn headers(rows: &[Row]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for key in rows.iter().flat_map(Row::keys) {
        if !headers.iter().any(|h| h == key) {
            headers.push(key.to_owned());
        }
    }
    headers
}

fn cells(row: &Row, headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| row.get_str(h).unwrap_or_default())
        .collect()
}

fn rows_table(rows: &[Row]) -> String {
    let headers = headers(rows);
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows {
        builder.push_record(cells(row, &headers));
    }
    builder.build().with(Style::rounded()).to_string()
}

fn rows_tsv(rows: &[Row]) -> String {
    let headers = headers(rows);
    let mut lines = vec![headers.join("\t")];
    lines.extend(rows.iter().map(|row| cells(row, &headers).join("\t")));
    lines.join("\n")
}
