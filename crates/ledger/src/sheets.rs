use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use musicshare_core::{AppendReceipt, Service, SpreadsheetService, TransportError};

use crate::credentials::AuthorizedUser;
use crate::oauth::{refresh_access_token, AccessToken};

/// Appended cells are stored verbatim so titles like `7/11` or `=x` stay text.
const APPEND_QUERY: &[(&str, &str)] =
    &[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")];
const READ_QUERY: &[(&str, &str)] = &[("majorDimension", "ROWS")];
/// The rating cell is parsed so it lands as a number.
const WRITE_QUERY: &[(&str, &str)] = &[("valueInputOption", "USER_ENTERED")];

/// Google Sheets v4 values API authorized with a stored refresh grant.
pub struct SheetsClient {
    http: Client,
    api_base_url: String,
    token_url: String,
    spreadsheet_id: String,
    credentials: AuthorizedUser,
    access: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Serialize)]
struct ValuesBody<'a> {
    values: &'a [Vec<String>],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummary {
    #[serde(default)]
    updated_range: Option<String>,
    #[serde(default)]
    updated_rows: Option<u32>,
    #[serde(default)]
    updated_cells: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<UpdateSummary>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl SheetsClient {
    pub fn new(
        api_base_url: impl Into<String>,
        token_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        credentials: AuthorizedUser,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build().map_err(|error| {
            TransportError::Request { service: Service::Ledger, message: error.to_string() }
        })?;

        Ok(Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            token_url: token_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            access: Mutex::new(None),
        })
    }

    /// Forces a token refresh; used at startup and by diagnostics to prove the grant still works.
    pub async fn authorize(&self) -> Result<(), TransportError> {
        let token = refresh_access_token(&self.http, &self.token_url, &self.credentials).await?;
        *self.access.lock().await = Some(token);
        info!(event_name = "ledger.token.refreshed", "spreadsheet access token refreshed");
        Ok(())
    }

    async fn bearer(&self) -> Result<String, TransportError> {
        let mut access = self.access.lock().await;
        if let Some(token) = access.as_ref().filter(|token| token.is_fresh(Instant::now())) {
            return Ok(token.expose().to_owned());
        }

        let token = refresh_access_token(&self.http, &self.token_url, &self.credentials).await?;
        let value = token.expose().to_owned();
        *access = Some(token);
        debug!(event_name = "ledger.token.refreshed", "spreadsheet access token refreshed");
        Ok(value)
    }

    async fn send<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let bearer = self.bearer().await?;
        let mut request = self.http.request(method, url).bearer_auth(bearer);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| TransportError::Request {
            service: Service::Ledger,
            message: format!("sheets request failed: {error}"),
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(event_name = "ledger.token.rejected", "sheets rejected access token");
            *self.access.lock().await = None;
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                service: Service::Ledger,
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|error| TransportError::Decode {
            service: Service::Ledger,
            message: format!("failed to decode sheets response: {error}"),
        })
    }
}

#[async_trait]
impl SpreadsheetService for SheetsClient {
    async fn append_rows(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<AppendReceipt, TransportError> {
        let url = values_url(
            &self.api_base_url,
            &self.spreadsheet_id,
            range,
            Some("append"),
            APPEND_QUERY,
        )?;
        let response: AppendResponse =
            self.send(Method::POST, url, Some(&ValuesBody { values: &rows })).await?;
        Ok(append_receipt(response))
    }

    async fn read_column(&self, range: &str) -> Result<Vec<String>, TransportError> {
        let url = values_url(
            &self.api_base_url,
            &self.spreadsheet_id,
            range,
            None,
            READ_QUERY,
        )?;
        let response: ValueRange = self.send::<_, ()>(Method::GET, url, None).await?;
        Ok(first_column(response))
    }

    async fn write_cells(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<u32, TransportError> {
        let url = values_url(
            &self.api_base_url,
            &self.spreadsheet_id,
            range,
            None,
            WRITE_QUERY,
        )?;
        let response: UpdateSummary =
            self.send(Method::PUT, url, Some(&ValuesBody { values: &rows })).await?;
        Ok(response.updated_cells.unwrap_or_default())
    }
}

/// `{base}/spreadsheets/{id}/values/{range}[:{action}]?{query}` with every segment encoded.
fn values_url(
    base: &str,
    spreadsheet_id: &str,
    range: &str,
    action: Option<&str>,
    query: &[(&str, &str)],
) -> Result<Url, TransportError> {
    let invalid = |message: String| TransportError::Request { service: Service::Ledger, message };

    let mut url =
        Url::parse(base).map_err(|error| invalid(format!("invalid sheets base url: {error}")))?;
    let last = match action {
        Some(action) => format!("{range}:{action}"),
        None => range.to_owned(),
    };
    url.path_segments_mut()
        .map_err(|()| invalid(format!("sheets base url `{base}` cannot carry a path")))?
        .pop_if_empty()
        .extend(["spreadsheets", spreadsheet_id, "values", last.as_str()]);
    url.query_pairs_mut().extend_pairs(query);
    Ok(url)
}

fn append_receipt(response: AppendResponse) -> AppendReceipt {
    let updates = response.updates.unwrap_or_default();
    AppendReceipt {
        updated_range: updates.updated_range.unwrap_or_default(),
        updated_rows: updates.updated_rows.unwrap_or_default(),
        updated_cells: updates.updated_cells.unwrap_or_default(),
    }
}

fn first_column(range: ValueRange) -> Vec<String> {
    range
        .values
        .into_iter()
        .map(|row| match row.into_iter().next() {
            Some(serde_json::Value::String(text)) => text,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
        .collect()
}
