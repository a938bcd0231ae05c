//! Google Sheets v4 values API backend. Each view is a worksheet tab.

use std::time::Duration;

use async_trait::async_trait;
use outpost_core::AppConfig;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::columns::column_letter;
use crate::store::{RecordStore, Row, RowUpdate};
use crate::RecordStoreError;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsRecordStore {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    access_token: String,
}

impl std::fmt::Debug for SheetsRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsRecordStore")
            .field("base_url", &self.base_url.as_str())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("access_token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl SheetsRecordStore {
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        spreadsheet_id: &str,
        access_token: &str,
        timeout_secs: u64,
    ) -> Result<Self, RecordStoreError> {
        Self::with_base_url(spreadsheet_id, access_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// The configured spreadsheet, or `None` when the id or access token is
    /// unset.
    ///
    /// # Errors
    ///
    /// See [`SheetsRecordStore::with_base_url`].
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, RecordStoreError> {
        match (&config.ledger_spreadsheet_id, &config.ledger_access_token) {
            (Some(id), Some(token)) => Self::with_base_url(
                id,
                token,
                config.request_timeout_secs,
                &config.ledger_base_url,
            )
            .map(Some),
            _ => Ok(None),
        }
    }

    /// Creates a store with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::Http`] if the client cannot be built, or
    /// [`RecordStoreError::Internal`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        spreadsheet_id: &str,
        access_token: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, RecordStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            RecordStoreError::Internal(format!("invalid base URL '{base_url}': {e}"))
        })?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: spreadsheet_id.to_owned(),
            access_token: access_token.to_owned(),
        })
    }

    /// `{base}/v4/spreadsheets/{id}/{tail...}`, each tail segment percent-encoded.
    fn url(&self, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
                .extend(tail);
        }
        url
    }
}

fn quoted(view: &str) -> String {
    format!("'{}'", view.replace('\'', "''"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn check_status(response: Response) -> Result<Response, RecordStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RecordStoreError::Unauthorized(format!("{status}: {body}")));
    }
    Err(RecordStoreError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RecordStore for SheetsRecordStore {
    /// Probe the spreadsheet so bad credentials surface before any work.
    async fn connect(&self) -> Result<(), RecordStoreError> {
        let mut url = self.url(&[]);
        url.query_pairs_mut()
            .append_pair("fields", "spreadsheetId");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!(spreadsheet_id = %self.spreadsheet_id, "record store reachable");
        Ok(())
    }

    async fn read_rows(&self, view: &str) -> Result<Vec<Row>, RecordStoreError> {
        let url = self.url(&["values", &quoted(view)]);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        let range: ValueRange =
            serde_json::from_str(&body).map_err(|e| RecordStoreError::Deserialize {
                context: format!("values.get({view})"),
                source: e,
            })?;

        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn update_rows(
        &self,
        view: &str,
        updates: Vec<RowUpdate>,
    ) -> Result<(), RecordStoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let data: Vec<Value> = updates
            .into_iter()
            .map(|u| {
                json!({
                    "range": format!("{}!A{}", quoted(view), u.row + 1),
                    "values": [u.values],
                })
            })
            .collect();

        let url = self.url(&["values:batchUpdate"]);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "valueInputOption": VALUE_INPUT_OPTION, "data": data }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn append_rows(&self, view: &str, rows: Vec<Row>) -> Result<(), RecordStoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut url = self.url(&["values", &format!("{}:append", quoted(view))]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION)
            .append_pair("insertDataOption", "INSERT_ROWS");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn update_cell(
        &self,
        view: &str,
        row: usize,
        column: usize,
        value: String,
    ) -> Result<(), RecordStoreError> {
        let range = format!("{}!{}{}", quoted(view), column_letter(column), row + 1);
        let mut url = self.url(&["values", &range]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_names_are_quoted_for_a1_ranges() {
        assert_eq!(quoted("POST LOG"), "'POST LOG'");
        assert_eq!(quoted("Bob's"), "'Bob''s'");
    }

    #[test]
    fn url_encodes_view_segment() {
        let store =
            SheetsRecordStore::with_base_url("sheet-1", "t", 5, "http://localhost:9/").unwrap();
        let url = store.url(&["values", &quoted("POST LOG")]);
        assert_eq!(
            url.as_str(),
            "http://localhost:9/v4/spreadsheets/sheet-1/values/'POST%20LOG'"
        );
    }

    #[test]
    fn numeric_cells_are_stringified() {
        assert_eq!(cell_text(&json!(12)), "12");
        assert_eq!(cell_text(&json!("x")), "x");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn debug_redacts_token() {
        let store = SheetsRecordStore::new("s", "ya29.secret", 5).unwrap();
        assert!(!format!("{store:?}").contains("ya29"));
    }
}
