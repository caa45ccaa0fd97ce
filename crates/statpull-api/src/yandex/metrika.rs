// Metrika reporting and management, AppMetrica application list.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Error;
use crate::normalize::{FieldNames, METRIKA_PREFIXES, Origin, Row, normalize_page};
use crate::yandex::client::{Service, YandexClient};

/// Rows per `stat/v1/data` page.
pub const METRIKA_PAGE_SIZE: u64 = 50_000;

/// Session date plus the five UTM tags.
pub const DEFAULT_DIMENSIONS: &[&str] = &[
    "ym:s:date",
    "ym:s:UTMSource",
    "ym:s:UTMMedium",
    "ym:s:UTMCampaign",
    "ym:s:UTMContent",
    "ym:s:UTMTerm",
];

const STAT_PATH: &str = "stat/v1/data";

/// A Metrika `stat/v1/data` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetrikaQuery {
    pub counter_id: String,
    /// `ym:s:visits`, `ym:pv:pageviews`, ...
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    /// `date1`: ISO date or a relative form Metrika accepts (`7daysAgo`).
    pub start: String,
    /// `date2`.
    pub end: String,
    /// Metrika filter expression.
    pub filters: Option<String>,
    pub limit: u64,
    /// One-based index of the first row.
    pub offset: u64,
}

impl MetrikaQuery {
    pub fn new(
        counter_id: impl Into<String>,
        metrics: Vec<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            counter_id: counter_id.into(),
            metrics,
            dimensions: DEFAULT_DIMENSIONS.iter().map(|d| (*d).to_owned()).collect(),
            start: start.into(),
            end: end.into(),
            filters: None,
            limit: METRIKA_PAGE_SIZE,
            offset: 1,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<String>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit.max(1);
        self
    }

    fn field_names(&self) -> FieldNames {
        FieldNames::new(&self.dimensions, &self.metrics, METRIKA_PREFIXES)
    }

    fn params(&self, offset: u64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ids", self.counter_id.clone()),
            ("metrics", self.metrics.join(",")),
            ("dimensions", self.dimensions.join(",")),
            ("date1", self.start.clone()),
            ("date2", self.end.clone()),
            ("accuracy", "full".to_owned()),
            ("limit", self.limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(filters) = &self.filters {
            params.push(("filters", filters.clone()));
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct StatPage {
    data: Option<Vec<StatRow>>,
    total_rows: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatRow {
    #[serde(default)]
    dimensions: Vec<Value>,
    #[serde(default)]
    metrics: Vec<Value>,
}

/// Dimension cells are objects (`{"name": "google", "id": "..."}`); the
/// display name is what ends up in the row.
fn dimension_value(cell: Value) -> Value {
    match cell {
        Value::Object(mut obj) => obj.remove("name").unwrap_or(Value::Null),
        other => other,
    }
}

/// A Metrika tag counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub site: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CounterPage {
    #[serde(default)]
    rows: u64,
    #[serde(default)]
    counters: Vec<Counter>,
}

/// Paging for [`YandexClient::counters_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterPaging {
    pub per_page: u64,
    /// One-based index of the first counter.
    pub offset: u64,
}

impl Default for CounterPaging {
    fn default() -> Self {
        Self {
            per_page: 1000,
            offset: 1,
        }
    }
}

impl YandexClient {
    /// Run a Metrika report and return every row.
    ///
    /// Pages by `offset` until `offset + limit - 1` covers `total_rows` or
    /// the provider returns an empty page. A first page with no rows yields
    /// one placeholder row.
    pub async fn get_report(&self, query: &MetrikaQuery) -> Result<Vec<Row>, Error> {
        let names = query.field_names();
        let origin = Origin::counter(&query.counter_id);
        let mut rows = Vec::new();
        let mut offset = query.offset.max(1);

        loop {
            let value = self
                .request(Method::GET, Service::Metrika, STAT_PATH, &query.params(offset), true)
                .await?
                .into_json(STAT_PATH)?;
            let body = value.to_string();
            let page: StatPage =
                serde_json::from_value(value).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: body.clone(),
                })?;
            let data = page.data.ok_or_else(|| Error::MissingField {
                endpoint: STAT_PATH.into(),
                field: "data",
                body: body.clone(),
            })?;
            let total = page.total_rows.ok_or_else(|| Error::MissingField {
                endpoint: STAT_PATH.into(),
                field: "total_rows",
                body,
            })?;

            let fetched = u64::try_from(data.len()).unwrap_or(u64::MAX);
            if fetched == 0 {
                if rows.is_empty() {
                    rows = normalize_page(&names, Vec::<(Vec<Value>, Vec<Value>)>::new(), &origin);
                }
                break;
            }

            let raw = data.into_iter().map(|row| {
                let dims: Vec<Value> = row.dimensions.into_iter().map(dimension_value).collect();
                (dims, row.metrics)
            });
            rows.extend(normalize_page(&names, raw, &origin));

            if offset + query.limit - 1 >= total {
                break;
            }
            offset += fetched;
            debug!(counter = %query.counter_id, offset, total, "fetching next metrika page");
        }
        Ok(rows)
    }

    /// Counters visible to the credentials.
    ///
    /// Without `paging`, a single request with Metrika's defaults. With it,
    /// pages until `per_page + offset - 1` covers the declared row count.
    pub async fn counters_list(
        &self,
        paging: Option<CounterPaging>,
    ) -> Result<Vec<Counter>, Error> {
        const PATH: &str = "management/v1/counters";

        let Some(paging) = paging else {
            let page = self.counter_page(PATH, &[]).await?;
            return Ok(page.counters);
        };

        let per_page = paging.per_page.max(1);
        let mut offset = paging.offset.max(1);
        let mut counters = Vec::new();
        loop {
            let params = [("per_page", per_page.to_string()), ("offset", offset.to_string())];
            let page = self.counter_page(PATH, &params).await?;
            let fetched = u64::try_from(page.counters.len()).unwrap_or(u64::MAX);
            counters.extend(page.counters);
            if fetched == 0 || per_page + offset - 1 >= page.rows {
                break;
            }
            offset += fetched;
        }
        Ok(counters)
    }

    async fn counter_page(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<CounterPage, Error> {
        let value = self
            .request(Method::GET, Service::Metrika, path, params, true)
            .await?
            .into_json(path)?;
        decode_value(path, value)
    }

    /// Goals configured on a counter, including deleted ones when asked.
    pub async fn counter_goals(
        &self,
        counter_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Value>, Error> {
        let path = format!("management/v1/counter/{counter_id}/goals");
        let mut params = Vec::new();
        if include_deleted {
            params.push(("useDeleted", "true".to_owned()));
        }
        let value = self
            .request(Method::GET, Service::Metrika, &path, &params, true)
            .await?
            .into_json(&path)?;
        take_array(&path, value, "goals")
    }

    /// AppMetrica applications visible to the credentials.
    pub async fn applications_list(&self) -> Result<Vec<Value>, Error> {
        const PATH: &str = "management/v1/applications";
        let value = self
            .request(Method::GET, Service::AppMetrica, PATH, &[], true)
            .await?
            .into_json(PATH)?;
        take_array(PATH, value, "applications")
    }
}

fn decode_value<T: serde::de::DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, Error> {
    let body = value.to_string();
    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: format!("{endpoint}: {e}"),
        body,
    })
}

fn take_array(endpoint: &str, mut value: Value, field: &'static str) -> Result<Vec<Value>, Error> {
    match value.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(Error::MissingField {
            endpoint: endpoint.to_owned(),
            field,
            body: value.to_string(),
        }),
    }
}
