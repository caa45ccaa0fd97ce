//! Row normalization: positional provider values -> flat named records.
//!
//! Both providers answer with a header (requested dimension and metric
//! names) and rows of positional values. [`zip_row`] pairs them up, fills
//! gaps with sentinels, and tags each record with the profile or counter it
//! came from.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value substituted for an empty dimension.
pub const NONE_DIMENSION: &str = "(none)";

/// Provider name prefixes removed from field names.
pub const GA_PREFIXES: &[&str] = &["ga:"];
pub const METRIKA_PREFIXES: &[&str] = &["ym:s:", "ym:pv:", "ym:ad:", "ym:ud:"];

/// One flat report record: dimensions, then metrics, then the origin field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Field value rendered as text (strings unquoted).
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.0.get(field).map(display_value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }

    fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Render a JSON value the way a spreadsheet cell would show it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The identifier every row is tagged with.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    field: &'static str,
    value: Value,
}

impl Origin {
    /// Google Analytics view (profile) id.
    pub fn profile(id: impl Into<String>) -> Self {
        Self {
            field: "profile",
            value: Value::String(id.into()),
        }
    }

    /// Yandex Metrika counter id.
    pub fn counter(id: impl Into<String>) -> Self {
        Self {
            field: "counter_id",
            value: Value::String(id.into()),
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }
}

/// Requested dimension and metric names with provider prefixes removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNames {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

impl FieldNames {
    pub fn new<D, M, S, T>(dimensions: D, metrics: M, prefixes: &[&str]) -> Self
    where
        D: IntoIterator<Item = S>,
        M: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            dimensions: dimensions
                .into_iter()
                .map(|d| strip_prefix(d.as_ref(), prefixes).to_owned())
                .collect(),
            metrics: metrics
                .into_iter()
                .map(|m| strip_prefix(m.as_ref(), prefixes).to_owned())
                .collect(),
        }
    }
}

/// Remove the first matching provider prefix from a field name.
pub fn strip_prefix<'a>(name: &'a str, prefixes: &[&str]) -> &'a str {
    let name = name.trim();
    prefixes
        .iter()
        .find_map(|p| name.strip_prefix(p))
        .unwrap_or(name)
}

/// Split a comma-separated field list (`"ga:date,ga:source"`).
pub fn split_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Pair names with positional values.
///
/// Blank dimensions become [`NONE_DIMENSION`], blank metrics become `0`.
/// Positions the provider did not return are treated as blank.
pub fn zip_row<D, M>(names: &FieldNames, dimensions: D, metrics: M, origin: &Origin) -> Row
where
    D: IntoIterator<Item = Value>,
    M: IntoIterator<Item = Value>,
{
    let mut row = Row::default();
    let mut dims = dimensions.into_iter();
    for name in &names.dimensions {
        let value = dims
            .next()
            .filter(|v| !is_blank(v))
            .unwrap_or_else(|| Value::String(NONE_DIMENSION.to_owned()));
        row.insert(name.clone(), value);
    }
    let mut mets = metrics.into_iter();
    for name in &names.metrics {
        let value = mets
            .next()
            .filter(|v| !is_blank(v))
            .unwrap_or_else(|| Value::from(0));
        row.insert(name.clone(), value);
    }
    row.insert(origin.field, origin.value.clone());
    row
}

/// The single row standing in for an explicitly empty page: empty-string
/// dimensions, zero metrics.
pub fn placeholder_row(names: &FieldNames, origin: &Origin) -> Row {
    let mut row = Row::default();
    for name in &names.dimensions {
        row.insert(name.clone(), Value::String(String::new()));
    }
    for name in &names.metrics {
        row.insert(name.clone(), Value::from(0));
    }
    row.insert(origin.field, origin.value.clone());
    row
}

/// Normalize a whole page of `(dimensions, metrics)` value rows.
///
/// Yields one record per raw row, or exactly one placeholder when the page
/// holds no rows at all.
pub fn normalize_page<I, D, M>(names: &FieldNames, rows: I, origin: &Origin) -> Vec<Row>
where
    I: IntoIterator<Item = (D, M)>,
    D: IntoIterator<Item = Value>,
    M: IntoIterator<Item = Value>,
{
    let out: Vec<Row> = rows
        .into_iter()
        .map(|(dims, mets)| zip_row(names, dims, mets, origin))
        .collect();
    if out.is_empty() {
        vec![placeholder_row(names, origin)]
    } else {
        out
    }
}
