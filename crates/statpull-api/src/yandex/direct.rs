// Direct v4 Live reference methods.

use serde_json::{Value, json};

use crate::error::Error;
use crate::yandex::client::YandexClient;

impl YandexClient {
    /// The Direct region tree (`GetRegions`), with Russian region names.
    pub async fn regions(&self) -> Result<Vec<Value>, Error> {
        let data = self.direct_request("GetRegions", None, Some("ru")).await?;
        expect_array("GetRegions", data)
    }

    /// Related search phrases for each seed keyword (`GetKeywordsSuggestion`).
    pub async fn keyword_suggestions(&self, keywords: &[String]) -> Result<Vec<String>, Error> {
        let data = self
            .direct_request(
                "GetKeywordsSuggestion",
                Some(json!({ "Keywords": keywords })),
                None,
            )
            .await?;
        Ok(expect_array("GetKeywordsSuggestion", data)?
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect())
    }
}

pub(crate) fn expect_array(method: &str, data: Value) -> Result<Vec<Value>, Error> {
    match data {
        Value::Array(items) => Ok(items),
        other => Err(Error::MissingField {
            endpoint: format!("direct/{method}"),
            field: "data[]",
            body: other.to_string(),
        }),
    }
}
