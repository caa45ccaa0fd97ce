// Core Reporting API v3 (`data/ga`)
//
// The v3 endpoint caps a response at 10,000 rows. Queries are issued one day
// at a time and, within a day, paged by `start-index` until the declared
// `totalResults` is covered.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, error};

use crate::dates::{format_date, split_days};
use crate::error::Error;
use crate::ga::client::AnalyticsClient;
use crate::ga::types::V3Page;
use crate::normalize::{FieldNames, GA_PREFIXES, Origin, Row, normalize_page};

/// Maximum rows per v3 response.
pub const V3_PAGE_SIZE: u64 = 10_000;

const V3_SAMPLING_LEVEL: &str = "HIGHER_PRECISION";

/// Parameters of a v3 report query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Query {
    /// View (profile) id, without the `ga:` prefix.
    pub profile: String,
    /// Metric names as the API expects them (`ga:sessions`).
    pub metrics: Vec<String>,
    /// Dimension names (`ga:date`).
    pub dimensions: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Raw v3 filter expression (`ga:medium==organic`).
    pub filters: Option<String>,
}

impl V3Query {
    pub fn new(
        profile: impl Into<String>,
        metrics: Vec<String>,
        dimensions: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            profile: profile.into(),
            metrics,
            dimensions,
            start,
            end,
            filters: None,
        }
    }

    pub fn with_filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    fn for_day(&self, day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
            ..self.clone()
        }
    }

    fn field_names(&self) -> FieldNames {
        FieldNames::new(&self.dimensions, &self.metrics, GA_PREFIXES)
    }

    fn params(&self, offset: u64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ids", format!("ga:{}", self.profile)),
            ("start-date", format_date(self.start)),
            ("end-date", format_date(self.end)),
            ("metrics", self.metrics.join(",")),
        ];
        if !self.dimensions.is_empty() {
            params.push(("dimensions", self.dimensions.join(",")));
        }
        if let Some(filters) = &self.filters {
            params.push(("filters", filters.clone()));
        }
        params.push(("samplingLevel", V3_SAMPLING_LEVEL.to_owned()));
        params.push(("start-index", (offset + 1).to_string()));
        params.push(("max-results", V3_PAGE_SIZE.to_string()));
        params
    }
}

/// Outcome of one day-level query.
///
/// A failed day does not abort the rest of the range; callers decide what a
/// partial report is worth.
#[derive(Debug)]
pub struct DayResult<T> {
    pub date: NaiveDate,
    pub outcome: Result<T, Error>,
}

/// Concatenate successful days and collect the failures separately.
pub fn split_outcomes<T>(days: Vec<DayResult<Vec<T>>>) -> (Vec<T>, Vec<(NaiveDate, Error)>) {
    let mut items = Vec::new();
    let mut failures = Vec::new();
    for day in days {
        match day.outcome {
            Ok(mut chunk) => items.append(&mut chunk),
            Err(err) => failures.push((day.date, err)),
        }
    }
    (items, failures)
}

/// Flatten v3 pages into rows tagged with `profile`.
pub fn normalize_v3_pages(pages: &[V3Page], names: &FieldNames, profile: &str) -> Vec<Row> {
    let origin = Origin::profile(profile);
    let split_at = names.dimensions.len();
    pages
        .iter()
        .flat_map(|page| {
            let raw = page.rows.iter().map(|cells| {
                let values: Vec<Value> = cells.iter().cloned().map(Value::String).collect();
                let (dims, mets) = values.split_at(split_at.min(values.len()));
                (dims.to_vec(), mets.to_vec())
            });
            normalize_page(names, raw, &origin)
        })
        .collect()
}

impl AnalyticsClient {
    /// One `data/ga` call starting at zero-based row `offset`.
    async fn query_v3(&self, query: &V3Query, offset: u64) -> Result<V3Page, Error> {
        let url = self.v3_url("data/ga")?;
        self.get_json(url, &query.params(offset)).await
    }

    /// Fetch every page of `query` over its whole date range.
    ///
    /// A first call reads `totalResults`; if it reaches the page cap,
    /// further calls advance `start-index` by the cap until all rows are
    /// covered.
    pub async fn execute_query(&self, query: &V3Query) -> Result<Vec<V3Page>, Error> {
        let first = self.query_v3(query, 0).await?;
        let total = first.total_results.ok_or_else(|| Error::MissingField {
            endpoint: "data/ga".into(),
            field: "totalResults",
            body: String::new(),
        })?;

        let mut pages = vec![first];
        if total >= V3_PAGE_SIZE {
            let mut offset = V3_PAGE_SIZE;
            while offset < total {
                debug!(profile = %query.profile, offset, total, "fetching next v3 page");
                pages.push(self.query_v3(query, offset).await?);
                offset += V3_PAGE_SIZE;
            }
        }
        Ok(pages)
    }

    /// [`execute_query`](Self::execute_query), normalized into rows.
    pub async fn execute_query_normalized(&self, query: &V3Query) -> Result<Vec<Row>, Error> {
        let pages = self.execute_query(query).await?;
        Ok(normalize_v3_pages(&pages, &query.field_names(), &query.profile))
    }

    /// Raw pages for each day of the query's range, in chronological order.
    pub async fn fetch_pages_v3(
        &self,
        query: &V3Query,
    ) -> Result<Vec<DayResult<Vec<V3Page>>>, Error> {
        let days = split_days(query.start, query.end)?;
        let mut results = Vec::with_capacity(days.len());
        for day in days {
            let outcome = self.execute_query(&query.for_day(day)).await;
            if let Err(ref err) = outcome {
                error!(
                    profile = %query.profile,
                    date = %day,
                    kind = %err.kind(),
                    "GA query failed: {err}"
                );
            }
            results.push(DayResult { date: day, outcome });
        }
        Ok(results)
    }

    /// Normalized rows for each day of the query's range, in chronological order.
    pub async fn fetch_report_v3(
        &self,
        query: &V3Query,
    ) -> Result<Vec<DayResult<Vec<Row>>>, Error> {
        let names = query.field_names();
        let days = self.fetch_pages_v3(query).await?;
        Ok(days
            .into_iter()
            .map(|day| DayResult {
                date: day.date,
                outcome: day
                    .outcome
                    .map(|pages| normalize_v3_pages(&pages, &names, &query.profile)),
            })
            .collect())
    }
}
