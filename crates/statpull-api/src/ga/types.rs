// Wire types for the Google Analytics Core Reporting (v3), Reporting (v4)
// and Management APIs.
//
// Field names follow Google's camelCase JSON. Only the fields the fetchers
// read are typed; v3 pages keep their column headers so raw output stays
// self-describing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates::format_date;

// ── v3: data/ga ──────────────────────────────────────────────────────

/// One page of a `data/ga` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V3Page {
    /// Declared row count across all pages. Required for pagination.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub column_headers: Vec<ColumnHeader>,
    #[serde(default)]
    pub contains_sampled_data: Option<bool>,
    #[serde(default)]
    pub items_per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub name: String,
    #[serde(default)]
    pub column_type: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

// ── v4: reports:batchGet ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchGetRequest<'a> {
    pub report_requests: &'a [ReportRequest],
}

/// One sub-request of a v4 batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub view_id: String,
    pub date_ranges: Vec<DateRange>,
    pub metrics: Vec<MetricSpec>,
    pub dimensions: Vec<DimensionSpec>,
    pub sampling_level: &'static str,
    pub page_size: u32,
    pub page_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_filter_clauses: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter_clauses: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start_date: start.into(),
            end_date: end.into(),
        }
    }

    /// A range covering exactly one day.
    pub fn day(date: chrono::NaiveDate) -> Self {
        let d = format_date(date);
        Self {
            start_date: d.clone(),
            end_date: d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSpec {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionSpec {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchGetResponse {
    #[serde(default)]
    pub reports: Option<Vec<Report>>,
}

/// One report of a batch response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub column_header: ReportColumnHeader,
    #[serde(default)]
    pub data: ReportData,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl Report {
    /// Google marks estimated results by reporting sample and sampling-space sizes.
    pub fn is_sampled(&self) -> bool {
        self.data.samples_read_counts.is_some() && self.data.sampling_space_sizes.is_some()
    }

    /// Continuation token, if more pages remain.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportColumnHeader {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metric_header: MetricHeader,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricHeader {
    #[serde(default)]
    pub metric_header_entries: Vec<MetricHeaderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricHeaderEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub samples_read_counts: Option<Vec<String>>,
    #[serde(default)]
    pub sampling_space_sizes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRow {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<DateRangeValues>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeValues {
    #[serde(default)]
    pub values: Vec<String>,
}

// ── Management API ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub web_properties: Vec<WebPropertySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPropertySummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// `totalResults` arrives as a number, but tolerate a numeric string.
fn lenient_count<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid count {n}"))),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid count {s:?}"))),
        Some(other) => Err(serde::de::Error::custom(format!("invalid count {other}"))),
    }
}
