// Analytics Reporting API v4 (`reports:batchGet`)
//
// One batched call carries a sub-request per (metrics, dimensions) set. Each
// returned report is then either used as is, followed through its
// continuation tokens, or, when Google reports sampling, re-requested one
// day at a time so every slice is small enough to be computed exactly.

use serde_json::Value;
use tracing::{debug, warn};

use crate::dates::{parse_date, split_days};
use crate::error::Error;
use crate::ga::client::AnalyticsClient;
use crate::ga::types::{
    BatchGetRequest, BatchGetResponse, DateRange, DimensionSpec, MetricSpec, Report, ReportRequest,
};
use crate::normalize::{FieldNames, GA_PREFIXES, Origin, Row, normalize_page};

pub const V4_DEFAULT_PAGE_SIZE: u32 = 10_000;

const V4_SAMPLING_LEVEL: &str = "LARGE";
const SEGMENT_DIMENSION: &str = "ga:segment";

/// A v4 batch: shared view and date ranges, one sub-request per metric set.
#[derive(Debug, Clone, PartialEq)]
pub struct V4Request {
    pub profile: String,
    pub date_ranges: Vec<DateRange>,
    /// Metric expressions per sub-request.
    pub metric_sets: Vec<Vec<String>>,
    /// Dimension names per sub-request; paired with `metric_sets` by index.
    pub dimension_sets: Vec<Vec<String>>,
    /// `metricFilterClauses` per sub-request (`Null` or `[]` for none).
    pub metric_filters: Vec<Value>,
    /// `dimensionFilterClauses` per sub-request (`Null` or `[]` for none).
    pub dimension_filters: Vec<Value>,
    pub page_size: u32,
    pub page_token: String,
}

impl V4Request {
    pub fn new(
        profile: impl Into<String>,
        date_ranges: Vec<DateRange>,
        metric_sets: Vec<Vec<String>>,
        dimension_sets: Vec<Vec<String>>,
    ) -> Self {
        Self {
            profile: profile.into(),
            date_ranges,
            metric_sets,
            dimension_sets,
            metric_filters: Vec::new(),
            dimension_filters: Vec::new(),
            page_size: V4_DEFAULT_PAGE_SIZE,
            page_token: "0".into(),
        }
    }

    pub fn with_metric_filters(mut self, filters: Vec<Value>) -> Self {
        self.metric_filters = filters;
        self
    }

    pub fn with_dimension_filters(mut self, filters: Vec<Value>) -> Self {
        self.dimension_filters = filters;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Expand into the wire sub-requests, one per metric set.
    pub fn sub_requests(&self) -> Result<Vec<ReportRequest>, Error> {
        if self.metric_sets.len() != self.dimension_sets.len() {
            return Err(Error::InvalidRequest(format!(
                "{} metric sets but {} dimension sets",
                self.metric_sets.len(),
                self.dimension_sets.len()
            )));
        }
        if self.date_ranges.is_empty() {
            return Err(Error::InvalidRequest("at least one date range is required".into()));
        }

        Ok(self
            .metric_sets
            .iter()
            .zip(&self.dimension_sets)
            .enumerate()
            .map(|(index, (metrics, dimensions))| ReportRequest {
                view_id: self.profile.clone(),
                date_ranges: self.date_ranges.clone(),
                metrics: metrics
                    .iter()
                    .map(|m| MetricSpec {
                        expression: m.clone(),
                    })
                    .collect(),
                dimensions: dimensions
                    .iter()
                    .map(|d| DimensionSpec { name: d.clone() })
                    .collect(),
                sampling_level: V4_SAMPLING_LEVEL,
                page_size: self.page_size,
                page_token: self.page_token.clone(),
                metric_filter_clauses: clause_at(&self.metric_filters, index),
                dimension_filter_clauses: clause_at(&self.dimension_filters, index),
            })
            .collect())
    }
}

fn clause_at(clauses: &[Value], index: usize) -> Option<Value> {
    clauses.get(index).filter(|c| match c {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        _ => true,
    })
    .cloned()
}

/// Flatten one v4 report into rows tagged with `profile`.
///
/// Field names come from the report's own column header; `ga:segment` is
/// dropped. Metric values are taken from the first date range.
pub fn normalize_report(report: &Report, profile: &str) -> Vec<Row> {
    let header = &report.column_header;
    let kept: Vec<usize> = header
        .dimensions
        .iter()
        .enumerate()
        .filter(|(_, name)| name.as_str() != SEGMENT_DIMENSION)
        .map(|(i, _)| i)
        .collect();
    let names = FieldNames::new(
        kept.iter().map(|&i| header.dimensions[i].as_str()),
        header
            .metric_header
            .metric_header_entries
            .iter()
            .map(|m| m.name.as_str()),
        GA_PREFIXES,
    );

    let raw = report.data.rows.iter().map(|row| {
        let dims: Vec<Value> = kept
            .iter()
            .map(|&i| row.dimensions.get(i).cloned().map_or(Value::Null, Value::String))
            .collect();
        let mets: Vec<Value> = row
            .metrics
            .first()
            .map(|range| range.values.iter().cloned().map(Value::String).collect())
            .unwrap_or_default();
        (dims, mets)
    });
    normalize_page(&names, raw, &Origin::profile(profile))
}

impl AnalyticsClient {
    async fn batch_get(&self, requests: &[ReportRequest]) -> Result<Vec<Report>, Error> {
        let url = self.v4_url("reports:batchGet")?;
        let body = BatchGetRequest {
            report_requests: requests,
        };
        let response: BatchGetResponse = self.post_json(url, &body).await?;
        let reports = response.reports.ok_or_else(|| Error::MissingField {
            endpoint: "reports:batchGet".into(),
            field: "reports",
            body: String::new(),
        })?;
        if reports.len() != requests.len() {
            return Err(Error::MissingField {
                endpoint: "reports:batchGet".into(),
                field: "reports",
                body: format!("expected {} reports, got {}", requests.len(), reports.len()),
            });
        }
        Ok(reports)
    }

    /// Fetch a v4 batch report, one row list per metric set.
    ///
    /// Sampled sub-reports are re-requested per day of the first date range;
    /// paginated ones are followed until no continuation token remains.
    pub async fn fetch_report_v4(&self, request: &V4Request) -> Result<Vec<Vec<Row>>, Error> {
        let sub_requests = request.sub_requests()?;
        let reports = self.batch_get(&sub_requests).await?;

        let mut normalized = Vec::with_capacity(reports.len());
        for (sub, report) in sub_requests.into_iter().zip(reports) {
            let rows = if report.is_sampled() {
                warn!(
                    profile = %request.profile,
                    "GA: sampling detected, reducing to daily requests"
                );
                self.fetch_unsampled(sub).await?
            } else if let Some(token) = report.continuation() {
                let mut next = sub.clone();
                next.page_token = token.to_owned();
                let mut rows = normalize_report(&report, &request.profile);
                rows.extend(self.drain_pages(next).await?);
                rows
            } else {
                normalize_report(&report, &request.profile)
            };
            normalized.push(rows);
        }
        Ok(normalized)
    }

    /// Re-issue `sub` once per day of its first date range and concatenate.
    async fn fetch_unsampled(&self, sub: ReportRequest) -> Result<Vec<Row>, Error> {
        let first = sub.date_ranges.first().ok_or_else(|| Error::SamplingRecovery {
            message: "sampled sub-request has no date range".into(),
        })?;
        let start = parse_date(&first.start_date)?;
        let end = parse_date(&first.end_date)?;
        let days = split_days(start, end).map_err(|e| Error::SamplingRecovery {
            message: e.to_string(),
        })?;

        let mut rows = Vec::new();
        for day in days {
            let mut daily = sub.clone();
            daily.date_ranges = vec![DateRange::day(day)];
            rows.extend(self.drain_pages(daily).await?);
        }
        Ok(rows)
    }

    /// Request `sub` and follow `nextPageToken` until it runs out.
    async fn drain_pages(&self, mut sub: ReportRequest) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        loop {
            let report = self
                .batch_get(std::slice::from_ref(&sub))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::MissingField {
                    endpoint: "reports:batchGet".into(),
                    field: "reports",
                    body: String::new(),
                })?;

            if report.is_sampled() {
                warn!(
                    profile = %sub.view_id,
                    range = ?sub.date_ranges,
                    "GA: report still sampled at daily granularity"
                );
            }
            rows.extend(normalize_report(&report, &sub.view_id));

            match report.continuation() {
                Some(token) if token == sub.page_token => {
                    warn!(
                        profile = %sub.view_id,
                        token,
                        "GA: continuation token repeated, stopping"
                    );
                    break;
                }
                Some(token) => {
                    debug!(profile = %sub.view_id, token, "following v4 continuation");
                    sub.page_token = token.to_owned();
                }
                None => break,
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> V4Request {
        V4Request::new(
            "999",
            vec![DateRange::new("2024-01-01", "2024-01-07")],
            vec![vec!["ga:sessions".into()], vec!["ga:users".into()]],
            vec![vec!["ga:date".into()], vec!["ga:country".into()]],
        )
    }

    #[test]
    fn sub_requests_pair_sets_and_route_filters() {
        let filters = vec![json!([{"filters": [{"metricName": "ga:sessions"}]}])];
        let dim_filters = vec![
            Value::Null,
            json!([{"filters": [{"dimensionName": "ga:country"}]}]),
        ];
        let subs = request()
            .with_metric_filters(filters)
            .with_dimension_filters(dim_filters)
            .sub_requests()
            .unwrap();

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].metrics[0].expression, "ga:sessions");
        assert_eq!(subs[1].dimensions[0].name, "ga:country");
        assert!(subs[0].metric_filter_clauses.is_some());
        assert!(subs[0].dimension_filter_clauses.is_none());
        assert!(subs[1].metric_filter_clauses.is_none());
        assert!(subs[1].dimension_filter_clauses.is_some());

        let wire = serde_json::to_value(&subs[0]).unwrap();
        assert_eq!(wire["viewId"], "999");
        assert_eq!(wire["samplingLevel"], "LARGE");
        assert_eq!(wire["pageToken"], "0");
        assert_eq!(wire["pageSize"], 10_000);
        assert_eq!(wire["dateRanges"][0]["startDate"], "2024-01-01");
        assert!(wire.get("dimensionFilterClauses").is_none());
    }

    #[test]
    fn mismatched_sets_are_rejected() {
        let mut req = request();
        req.dimension_sets.pop();
        assert!(matches!(req.sub_requests(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn normalizes_report_and_drops_segment() {
        let report: Report = serde_json::from_value(json!({
            "columnHeader": {
                "dimensions": ["ga:segment", "ga:date"],
                "metricHeader": {
                    "metricHeaderEntries": [{"name": "ga:sessions", "type": "INTEGER"}]
                }
            },
            "data": {
                "rows": [
                    {"dimensions": ["Mobile", "20240101"], "metrics": [{"values": ["12"]}]},
                    {"dimensions": ["Mobile", "20240102"], "metrics": [{"values": [""]}]}
                ]
            }
        }))
        .unwrap();

        let rows = normalize_report(&report, "999");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            serde_json::to_value(&rows[0]).unwrap(),
            json!({"date": "20240101", "sessions": "12", "profile": "999"})
        );
        assert_eq!(rows[1].get("sessions"), Some(&json!(0)));
    }

    #[test]
    fn empty_report_yields_placeholder() {
        let report: Report = serde_json::from_value(json!({
            "columnHeader": {
                "dimensions": ["ga:date"],
                "metricHeader": {"metricHeaderEntries": [{"name": "ga:sessions"}]}
            },
            "data": {"rowCount": 0}
        }))
        .unwrap();

        let rows = normalize_report(&report, "999");
        assert_eq!(rows.len(), 1);
        assert_eq!(
            serde_json::to_value(&rows[0]).unwrap(),
            json!({"date": "", "sessions": 0, "profile": "999"})
        );
    }

    #[test]
    fn sampling_needs_both_fields() {
        let sampled: Report = serde_json::from_value(json!({
            "data": {"samplesReadCounts": ["1"], "samplingSpaceSizes": ["10"]}
        }))
        .unwrap();
        let partial: Report = serde_json::from_value(json!({
            "data": {"samplesReadCounts": ["1"]}
        }))
        .unwrap();
        assert!(sampled.is_sampled());
        assert!(!partial.is_sampled());
    }
}
