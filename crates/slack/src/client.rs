use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use musicshare_core::{Service, TransportError};

use crate::blocks::MessageTemplate;

const PAGE_LIMIT: &str = "200";
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Thin Slack Web API client. Every call checks the `ok`/`error` envelope.
#[derive(Clone)]
pub struct SlackWebClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct HistoryMessage {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SlackProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub profile: Option<SlackProfile>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SlackChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct MembersPage {
    #[serde(default)]
    members: Vec<SlackUser>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChannelsPage {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: SlackUser,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct Ignored {}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a MessageTemplate,
}

impl SlackWebClient {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build().map_err(|error| {
            TransportError::Request { service: Service::Chat, message: error.to_string() }
        })?;
        Ok(Self::with_http(http, base_url, bot_token))
    }

    pub fn with_http(http: Client, base_url: impl Into<String>, bot_token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, bot_token }
    }

    pub async fn auth_test(&self) -> Result<AuthIdentity, TransportError> {
        self.call("auth.test", self.http.post(self.url("auth.test"))).await
    }

    /// Messages newer than `oldest` (exclusive), newest first as Slack returns them.
    pub async fn conversations_history(
        &self,
        channel: &str,
        oldest: &str,
    ) -> Result<Vec<HistoryMessage>, TransportError> {
        let mut messages = Vec::new();
        let mut cursor = String::new();
        loop {
            let request = self.http.get(self.url("conversations.history")).query(&with_cursor(
                &[("channel", channel), ("oldest", oldest), ("limit", PAGE_LIMIT)],
                &cursor,
            ));
            let page: HistoryPage = self.call("conversations.history", request).await?;
            messages.extend(page.messages);

            match next_cursor(page.response_metadata) {
                Some(next) => cursor = next,
                None => return Ok(messages),
            }
        }
    }

    /// Channels the bot is a member of.
    pub async fn users_conversations(&self) -> Result<Vec<SlackChannel>, TransportError> {
        let mut channels = Vec::new();
        let mut cursor = String::new();
        loop {
            let request = self.http.get(self.url("users.conversations")).query(&with_cursor(
                &[
                    ("types", "public_channel,private_channel"),
                    ("exclude_archived", "true"),
                    ("limit", PAGE_LIMIT),
                ],
                &cursor,
            ));
            let page: ChannelsPage = self.call("users.conversations", request).await?;
            channels.extend(page.channels);

            match next_cursor(page.response_metadata) {
                Some(next) => cursor = next,
                None => return Ok(channels),
            }
        }
    }

    pub async fn users_info(&self, user_id: &str) -> Result<SlackUser, TransportError> {
        let request = self.http.get(self.url("users.info")).query(&[("user", user_id)]);
        let info: UserInfo = self.call("users.info", request).await?;
        Ok(info.user)
    }

    pub async fn users_list(&self) -> Result<Vec<SlackUser>, TransportError> {
        let mut members = Vec::new();
        let mut cursor = String::new();
        loop {
            let request = self
                .http
                .get(self.url("users.list"))
                .query(&with_cursor(&[("limit", PAGE_LIMIT)], &cursor));
            let page: MembersPage = self.call("users.list", request).await?;
            members.extend(page.members);

            match next_cursor(page.response_metadata) {
                Some(next) => cursor = next,
                None => return Ok(members),
            }
        }
    }

    pub async fn reactions_add(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), TransportError> {
        let request = self.http.post(self.url("reactions.add")).form(&[
            ("channel", channel),
            ("timestamp", timestamp),
            ("name", name),
        ]);
        match self.call::<Ignored>("reactions.add", request).await {
            Ok(_) => Ok(()),
            Err(TransportError::Api { code, .. }) if code == "already_reacted" => Ok(()),
            Err(error) => Err(error),
        }
    }

    pub async fn chat_post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        let request =
            self.http.post(self.url("chat.postMessage")).json(&PostMessage { channel, message });
        self.call::<Ignored>("chat.postMessage", request).await.map(|_| ())
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let retry = request.try_clone();
        let mut response = self.send(method, request).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            if let (Some(wait), Some(retry)) = (retry_after(response.headers()), retry) {
                warn!(
                    event_name = "egress.slack.rate_limited",
                    method,
                    wait_secs = wait.as_secs(),
                    "slack rate limited the call; retrying once after the requested delay"
                );
                tokio::time::sleep(wait).await;
                response = self.send(method, retry).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { service: Service::Chat, status: status.as_u16() });
        }

        let payload: Value = response.json().await.map_err(|error| TransportError::Decode {
            service: Service::Chat,
            message: format!("{method}: {error}"),
        })?;
        debug!(event_name = "egress.slack.call", method, "slack web api call completed");
        decode_envelope(method, payload)
    }

    async fn send(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<Response, TransportError> {
        request.bearer_auth(self.bot_token.expose_secret()).send().await.map_err(|error| {
            TransportError::Request {
                service: Service::Chat,
                message: format!("{method}: {error}"),
            }
        })
    }
}

/// Seconds from a 429's `Retry-After`, capped at `MAX_RETRY_AFTER`.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

/// Checks `ok`, surfaces `error` as an API failure, then decodes the rest of the body.
pub fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    payload: Value,
) -> Result<T, TransportError> {
    let ok = payload.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if !ok {
        let code = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_owned();
        return Err(TransportError::Api { service: Service::Chat, code });
    }

    serde_json::from_value(payload).map_err(|error| TransportError::Decode {
        service: Service::Chat,
        message: format!("{method}: {error}"),
    })
}

fn with_cursor<'a>(params: &[(&'a str, &'a str)], cursor: &'a str) -> Vec<(&'a str, &'a str)> {
    let mut params = params.to_vec();
    if !cursor.is_empty() {
        params.push(("cursor", cursor));
    }
    params
}

fn next_cursor(metadata: Option<ResponseMetadata>) -> Option<String> {
    metadata.map(|metadata| metadata.next_cursor).filter(|cursor| !cursor.is_empty())
}
