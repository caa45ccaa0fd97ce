#![allow(clippy::unwrap_used)]
// Integration tests for `AnalyticsClient` using wiremock.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use statpull_api::ga::types::DateRange;
use statpull_api::{
    AnalyticsClient, AppCredentials, ErrorKind, GaEndpoints, TokenBundle, V3Query, V4Request,
    split_outcomes,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn app() -> AppCredentials {
    AppCredentials {
        client_id: "cid".into(),
        client_secret: "csecret".to_string().into(),
        callback_url: None,
    }
}

async fn setup() -> (MockServer, AnalyticsClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = AnalyticsClient::with_client(
        reqwest::Client::new(),
        Duration::from_secs(5),
        GaEndpoints::under(&base).unwrap(),
        app(),
        TokenBundle::from_access_token("ga-token"),
    )
    .await
    .unwrap();
    (server, client)
}

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn v3_query(start: &str, end: &str) -> V3Query {
    V3Query::new(
        "12345",
        vec!["ga:sessions".into()],
        vec!["ga:source".into()],
        date(start),
        date(end),
    )
}

fn v3_page(total: u64, rows: Value) -> Value {
    json!({
        "totalResults": total,
        "columnHeaders": [{"name": "ga:source"}, {"name": "ga:sessions"}],
        "rows": rows,
    })
}

fn query_value(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Matches a batchGet whose first sub-request covers exactly `start..=end`.
struct FirstRange {
    start: &'static str,
    end: &'static str,
}

impl Match for FirstRange {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };
        let range = &body["reportRequests"][0]["dateRanges"][0];
        range["startDate"] == self.start && range["endDate"] == self.end
    }
}

/// Matches a batchGet carrying the given page token.
struct PageToken(&'static str);

impl Match for PageToken {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .is_ok_and(|body| body["reportRequests"][0]["pageToken"] == self.0)
    }
}

fn v4_report(rows: Value, sampled: bool, next: Option<&str>) -> Value {
    let mut data = json!({ "rows": rows });
    if sampled {
        data["samplesReadCounts"] = json!(["500"]);
        data["samplingSpaceSizes"] = json!(["100000"]);
    }
    let mut report = json!({
        "columnHeader": {
            "dimensions": ["ga:segment", "ga:date"],
            "metricHeader": {"metricHeaderEntries": [{"name": "ga:sessions", "type": "INTEGER"}]}
        },
        "data": data,
    });
    if let Some(token) = next {
        report["nextPageToken"] = json!(token);
    }
    json!({ "reports": [report] })
}

fn v4_row(day: &str, sessions: &str) -> Value {
    json!({"dimensions": ["Sessions", day], "metrics": [{"values": [sessions]}]})
}

// ── v3 tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_v3_issues_one_query_per_day_in_order() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analytics/v3/data/ga"))
        .and(header("authorization", "Bearer ga-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(v3_page(1, json!([["google", "5"]]))),
        )
        .expect(3)
        .mount(&server)
        .await;

    let days = client
        .fetch_report_v3(&v3_query("2024-01-30", "2024-02-01"))
        .await
        .unwrap();

    let dates: Vec<String> = days.iter().map(|d| d.date.to_string()).collect();
    assert_eq!(dates, ["2024-01-30", "2024-01-31", "2024-02-01"]);

    let requested: Vec<(String, String)> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| {
            (
                query_value(r, "start-date").unwrap(),
                query_value(r, "end-date").unwrap(),
            )
        })
        .collect();
    assert_eq!(
        requested,
        [
            ("2024-01-30".to_owned(), "2024-01-30".to_owned()),
            ("2024-01-31".to_owned(), "2024-01-31".to_owned()),
            ("2024-02-01".to_owned(), "2024-02-01".to_owned()),
        ]
    );

    let (rows, failures) = split_outcomes(days);
    assert!(failures.is_empty());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get_str("source").as_deref(), Some("google"));
    assert_eq!(rows[0].get_str("profile").as_deref(), Some("12345"));
}

#[tokio::test]
async fn test_v3_pages_until_total_is_covered() {
    let (server, client) = setup().await;

    for (index, source) in [("1", "a"), ("10001", "b"), ("20001", "c")] {
        Mock::given(method("GET"))
            .and(path("/analytics/v3/data/ga"))
            .and(query_param("start-index", index))
            .and(query_param("max-results", "10000"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(v3_page(25_000, json!([[source, "1"]]))),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let pages = client
        .execute_query(&v3_query("2024-01-01", "2024-01-01"))
        .await
        .unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[2].rows[0][0], "c");
}

#[tokio::test]
async fn test_v3_below_cap_is_single_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analytics/v3/data/ga"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(v3_page(9_999, json!([["x", "1"]]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let pages = client
        .execute_query(&v3_query("2024-01-01", "2024-01-01"))
        .await
        .unwrap();
    assert_eq!(pages.len(), 1);
}

#[tokio::test]
async fn test_v3_total_at_cap_is_single_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analytics/v3/data/ga"))
        .and(query_param("start-index", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(v3_page(10_000, json!([["x", "1"]]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let pages = client
        .execute_query(&v3_query("2024-01-01", "2024-01-01"))
        .await
        .unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_v3_failed_day_does_not_abort_range() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analytics/v3/data/ga"))
        .and(query_param("start-date", "2024-01-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/analytics/v3/data/ga"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v3_page(0, json!([]))))
        .mount(&server)
        .await;

    let days = client
        .fetch_report_v3(&v3_query("2024-01-01", "2024-01-03"))
        .await
        .unwrap();
    assert_eq!(days.len(), 3);
    assert!(days[0].outcome.is_ok());
    let err = days[1].outcome.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(days[2].outcome.is_ok());

    // Empty pages still produce one placeholder row per day.
    let placeholder = days[0].outcome.as_ref().unwrap();
    assert_eq!(placeholder.len(), 1);
    assert_eq!(placeholder[0].get_str("source").as_deref(), Some(""));
    assert_eq!(placeholder[0].get("sessions"), Some(&json!(0)));
}

#[tokio::test]
async fn test_v3_http_error_is_transport_kind() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analytics/v3/data/ga"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
        .mount(&server)
        .await;

    let err = client
        .execute_query(&v3_query("2024-01-01", "2024-01-01"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.is_transient());
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_v3_inverted_range_is_rejected() {
    let (_server, client) = setup().await;
    let err = client
        .fetch_report_v3(&v3_query("2024-01-05", "2024-01-01"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SamplingRecovery);
}

// ── v4 tests ────────────────────────────────────────────────────────

fn v4_request(start: &str, end: &str) -> V4Request {
    V4Request::new(
        "999",
        vec![DateRange::new(start, end)],
        vec![vec!["ga:sessions".into()]],
        vec![vec!["ga:segment".into(), "ga:date".into()]],
    )
}

#[tokio::test]
async fn test_v4_unsampled_report_is_used_as_is() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(header("authorization", "Bearer ga-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "4"), v4_row("20240102", "")]),
            false,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let reports = client
        .fetch_report_v4(&v4_request("2024-01-01", "2024-01-02"))
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    let rows = &reports[0];
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("segment"), None);
    assert_eq!(rows[0].get_str("date").as_deref(), Some("20240101"));
    assert_eq!(rows[0].get_str("sessions").as_deref(), Some("4"));
    assert_eq!(rows[1].get("sessions"), Some(&json!(0)));
    assert_eq!(rows[1].get_str("profile").as_deref(), Some("999"));
}

#[tokio::test]
async fn test_v4_sampled_report_is_refetched_per_day() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(FirstRange {
            start: "2024-01-01",
            end: "2024-01-02",
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "999")]),
            true,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    for (day, compact, sessions) in [
        ("2024-01-01", "20240101", "10"),
        ("2024-01-02", "20240102", "20"),
    ] {
        Mock::given(method("POST"))
            .and(path("/v4/reports:batchGet"))
            .and(FirstRange {
                start: day,
                end: day,
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
                json!([v4_row(compact, sessions)]),
                false,
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let reports = client
        .fetch_report_v4(&v4_request("2024-01-01", "2024-01-02"))
        .await
        .unwrap();
    let sessions: Vec<String> = reports[0]
        .iter()
        .map(|r| r.get_str("sessions").unwrap())
        .collect();
    assert_eq!(sessions, ["10", "20"]);
}

#[tokio::test]
async fn test_v4_sampled_day_is_drained_before_next_day() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(FirstRange {
            start: "2024-01-01",
            end: "2024-01-02",
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "999")]),
            true,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    // Day one spans two pages.
    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(FirstRange {
            start: "2024-01-01",
            end: "2024-01-01",
        })
        .and(PageToken("0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "10")]),
            false,
            Some("d1p2"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(FirstRange {
            start: "2024-01-01",
            end: "2024-01-01",
        })
        .and(PageToken("d1p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "11")]),
            false,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(FirstRange {
            start: "2024-01-02",
            end: "2024-01-02",
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240102", "20")]),
            false,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let reports = client
        .fetch_report_v4(&v4_request("2024-01-01", "2024-01-02"))
        .await
        .unwrap();
    let sessions: Vec<String> = reports[0]
        .iter()
        .map(|r| r.get_str("sessions").unwrap())
        .collect();
    assert_eq!(sessions, ["10", "11", "20"]);

    // Both pages of day one come before day two.
    let order: Vec<(String, String)> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .skip(1)
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            let sub = &body["reportRequests"][0];
            (
                sub["dateRanges"][0]["startDate"].as_str().unwrap().to_owned(),
                sub["pageToken"].as_str().unwrap().to_owned(),
            )
        })
        .collect();
    assert_eq!(
        order,
        [
            ("2024-01-01".to_owned(), "0".to_owned()),
            ("2024-01-01".to_owned(), "d1p2".to_owned()),
            ("2024-01-02".to_owned(), "0".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_v4_repeated_continuation_token_stops_paging() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(PageToken("0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "1")]),
            false,
            Some("stuck"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(PageToken("stuck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240102", "2")]),
            false,
            Some("stuck"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let reports = client
        .fetch_report_v4(&v4_request("2024-01-01", "2024-01-02"))
        .await
        .unwrap();
    assert_eq!(reports[0].len(), 2);
}

#[tokio::test]
async fn test_v4_follows_continuation_tokens() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(PageToken("0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "1")]),
            false,
            Some("p2"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .and(PageToken("p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240102", "2")]),
            false,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let reports = client
        .fetch_report_v4(&v4_request("2024-01-01", "2024-01-02"))
        .await
        .unwrap();
    assert_eq!(reports[0].len(), 2);
    assert_eq!(reports[0][1].get_str("date").as_deref(), Some("20240102"));
}

#[tokio::test]
async fn test_v4_missing_reports_is_protocol_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = client
        .fetch_report_v4(&v4_request("2024-01-01", "2024-01-02"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_v4_unparseable_sampled_range_fails_recovery() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/reports:batchGet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(v4_report(
            json!([v4_row("20240101", "1")]),
            true,
            None,
        )))
        .mount(&server)
        .await;

    let err = client
        .fetch_report_v4(&v4_request("7daysAgo", "today"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SamplingRecovery);
}

// ── Management tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_parent_by_profile() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analytics/v3/management/accountSummaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "77",
                "name": "Acme",
                "webProperties": [
                    {"id": "UA-77-1", "name": "www", "profiles": [{"id": "100"}, {"id": "101"}]},
                    {"id": "UA-77-2", "name": "shop", "profiles": [{"id": "102"}]}
                ]
            }]
        })))
        .mount(&server)
        .await;

    let parent = client.parent_by_profile("102").await.unwrap().unwrap();
    assert_eq!(parent.id, "77");
    assert_eq!(parent.web_properties.len(), 1);
    assert_eq!(parent.web_properties[0].id, "UA-77-2");

    assert!(client.parent_by_profile("404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_goals() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(
            "/analytics/v3/management/accounts/77/webproperties/UA-77-1/profiles/100/goals",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "1", "name": "Signup", "type": "URL_DESTINATION"}]
        })))
        .mount(&server)
        .await;

    let goals = client.goals("77", "UA-77-1", "100").await.unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["name"], "Signup");
}
