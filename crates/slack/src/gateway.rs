use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use musicshare_core::{
    ChatEvent, ChatUser, EventSource, LookupError, Reply, Responder, TransportError,
    UserDirectory,
};

use crate::blocks::reply_message;
use crate::client::{SlackUser, SlackWebClient};
use crate::events::{compare_ts, events_from_history, ts_from_datetime, Watermarks};

/// Slack side of the bot: polls channel history, looks up users and posts replies.
pub struct SlackGateway {
    client: SlackWebClient,
    bot_user_id: String,
    configured_channels: Vec<String>,
    watermarks: Mutex<Watermarks>,
}

impl SlackGateway {
    /// With no configured channels, `connect` watches every channel the bot belongs to then.
    /// Later invitations need a restart.
    pub fn new(
        client: SlackWebClient,
        bot_user_id: impl Into<String>,
        channels: Vec<String>,
    ) -> Self {
        Self {
            client,
            bot_user_id: bot_user_id.into(),
            configured_channels: channels,
            watermarks: Mutex::new(Watermarks::default()),
        }
    }

    async fn watched_channels(&self) -> Result<Vec<String>, TransportError> {
        if !self.configured_channels.is_empty() {
            return Ok(self.configured_channels.clone());
        }
        let channels = self.client.users_conversations().await?;
        Ok(channels.into_iter().map(|channel| channel.id).collect())
    }
}

#[async_trait]
impl EventSource for SlackGateway {
    async fn connect(&self) -> Result<(), TransportError> {
        let identity = self.client.auth_test().await?;
        if identity.user_id != self.bot_user_id {
            warn!(
                event_name = "ingress.slack.bot_id_mismatch",
                configured = %self.bot_user_id,
                token_user = %identity.user_id,
                "bot token belongs to a different user than slack.bot_user_id"
            );
        }

        let channels = self.watched_channels().await?;
        if channels.is_empty() {
            warn!(
                event_name = "ingress.slack.no_channels",
                "bot is not a member of any channel; invite it to one"
            );
        }

        let started_at = ts_from_datetime(Utc::now());
        *self.watermarks.lock().await = Watermarks::starting_at(&channels, &started_at);
        info!(
            event_name = "ingress.slack.connected",
            team = %identity.team,
            bot_user = %identity.user,
            channel_count = channels.len(),
            oldest = %started_at,
            "slack connection established"
        );
        Ok(())
    }

    async fn next_events(&self) -> Result<Vec<ChatEvent>, TransportError> {
        let mut watermarks = self.watermarks.lock().await;
        let channels: Vec<(String, String)> = watermarks
            .channels()
            .map(|(channel, oldest)| (channel.to_owned(), oldest.to_owned()))
            .collect();

        // Watermarks move only after every channel was read, so a failed cycle is re-read whole.
        let mut pages = Vec::with_capacity(channels.len());
        for (channel, oldest) in channels {
            let messages = self.client.conversations_history(&channel, &oldest).await?;
            pages.push((channel, messages));
        }

        let mut events = Vec::new();
        for (channel, messages) in pages {
            if let Some(newest) =
                messages.iter().map(|message| message.ts.as_str()).max_by(|a, b| compare_ts(a, b))
            {
                watermarks.advance(&channel, newest);
            }
            events.extend(events_from_history(&channel, &self.bot_user_id, messages));
        }

        Ok(events)
    }
}

#[async_trait]
impl UserDirectory for SlackGateway {
    async fn lookup_user(&self, user_id: &str) -> Result<ChatUser, LookupError> {
        let user = self.client.users_info(user_id).await.map_err(|error| LookupError {
            user_id: user_id.to_owned(),
            reason: error.to_string(),
        })?;
        Ok(chat_user(user))
    }
}

#[async_trait]
impl Responder for SlackGateway {
    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), TransportError> {
        self.client.reactions_add(channel, timestamp, name).await
    }

    async fn post_reply(
        &self,
        channel: &str,
        reply: &Reply,
        correlation_id: &str,
    ) -> Result<(), TransportError> {
        self.client.chat_post_message(channel, &reply_message(reply, correlation_id)).await
    }
}

pub fn chat_user(user: SlackUser) -> ChatUser {
    let (display_name, profile_real_name) = match user.profile {
        Some(profile) => (profile.display_name, profile.real_name),
        None => (None, None),
    };

    ChatUser {
        id: user.id,
        handle: user.name,
        real_name: profile_real_name.or(user.real_name),
        display_name,
    }
}
