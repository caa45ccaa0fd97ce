// Wordstat asynchronous reports
//
// Direct builds Wordstat reports in the background: create one, poll the
// report list until its status is `Done`, then fetch it. The server keeps
// only a handful of reports per account, so finished ones should be deleted.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::yandex::client::YandexClient;
use crate::yandex::direct::expect_array;

/// One entry of `GetWordstatReportList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordstatReportInfo {
    #[serde(rename = "ReportID")]
    pub report_id: i64,
    /// `Done`, `Pending` or `Failed`.
    #[serde(rename = "StatusReport")]
    pub status: String,
}

/// Lifecycle of a Wordstat report.
#[derive(Debug, Clone, PartialEq)]
pub enum WordstatStatus {
    /// Accepted by the server, not polled yet.
    Submitted,
    /// The server is still building it.
    Pending,
    /// Built and fetched.
    Ready(Value),
    /// The server gave up on it, or it disappeared from the report list.
    Failed(String),
}

impl WordstatStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// A report created through [`YandexClient::create_wordstat_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct WordstatJob {
    id: i64,
    status: WordstatStatus,
}

impl WordstatJob {
    /// Track a report created earlier (e.g. by another process).
    pub fn resume(id: i64) -> Self {
        Self {
            id,
            status: WordstatStatus::Submitted,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn status(&self) -> &WordstatStatus {
        &self.status
    }

    /// Advance the state machine given the server's report list.
    ///
    /// Terminal states never change.
    fn observe(&mut self, list: &[WordstatReportInfo]) -> Observation {
        if self.status.is_terminal() {
            return Observation::Settled;
        }
        match list.iter().find(|r| r.report_id == self.id) {
            Some(info) if info.status == "Done" => Observation::Done,
            Some(info) if info.status == "Failed" => {
                self.status = WordstatStatus::Failed("server reported Failed".into());
                Observation::Settled
            }
            Some(_) => {
                self.status = WordstatStatus::Pending;
                Observation::Settled
            }
            None => {
                self.status = WordstatStatus::Failed("report not in server list".into());
                Observation::Settled
            }
        }
    }
}

enum Observation {
    Done,
    Settled,
}

impl YandexClient {
    /// Queue a Wordstat report for `phrases`, optionally limited to regions.
    pub async fn create_wordstat_report(
        &self,
        phrases: &[String],
        geo_ids: Option<&[i64]>,
    ) -> Result<WordstatJob, Error> {
        let mut param = json!({ "Phrases": phrases });
        if let Some(geo) = geo_ids {
            param["GeoID"] = json!(geo);
        }
        let data = self
            .direct_request("CreateNewWordstatReport", Some(param), None)
            .await?;
        let id = data.as_i64().ok_or_else(|| Error::MissingField {
            endpoint: "direct/CreateNewWordstatReport".into(),
            field: "data (report id)",
            body: data.to_string(),
        })?;
        info!(report_id = id, phrases = phrases.len(), "YA: wordstat report queued");
        Ok(WordstatJob::resume(id))
    }

    /// Reports currently held by the server.
    pub async fn wordstat_report_list(&self) -> Result<Vec<WordstatReportInfo>, Error> {
        let data = self
            .direct_request("GetWordstatReportList", None, None)
            .await?;
        expect_array("GetWordstatReportList", data)?
            .into_iter()
            .map(|item| {
                let body = item.to_string();
                serde_json::from_value(item).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body,
                })
            })
            .collect()
    }

    /// A finished report's content.
    pub async fn get_wordstat_report(&self, id: i64) -> Result<Value, Error> {
        self.direct_request("GetWordstatReport", Some(json!(id)), None)
            .await
    }

    /// Remove a report from the server.
    pub async fn delete_wordstat_report(&self, id: i64) -> Result<(), Error> {
        let data = self
            .direct_request("DeleteWordstatReport", Some(json!(id)), None)
            .await?;
        if data.as_i64() != Some(1) {
            warn!(report_id = id, %data, "YA: unexpected DeleteWordstatReport answer");
        }
        Ok(())
    }

    /// Check a job once, fetching the report when the server says `Done`.
    ///
    /// Makes no request for a job already in a terminal state.
    pub async fn poll_wordstat(&self, job: &mut WordstatJob) -> Result<WordstatStatus, Error> {
        if job.status.is_terminal() {
            return Ok(job.status.clone());
        }
        let list = self.wordstat_report_list().await?;
        if let Observation::Done = job.observe(&list) {
            let report = self.get_wordstat_report(job.id).await?;
            job.status = WordstatStatus::Ready(report);
        }
        debug!(report_id = job.id, status = job.status.label(), "YA: wordstat polled");
        Ok(job.status.clone())
    }
}
