use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::access::{check_permission, AuthorizationDecision, UserAuthorizer};
use crate::catalog::TrackResolver;
use crate::domain::{
    command::{is_bot_directed, parse, ChatEvent, Command},
    ledger::LedgerRow,
    rating::validate,
    reply::Reply,
};
use crate::errors::{Disposition, ErrorClass, LedgerError, PipelineError, ValidationError};
use crate::ledger::LedgerClient;
use crate::ports::{CatalogToken, Responder};

/// Emoji used to acknowledge a recorded share.
pub const ACK_REACTION: &str = "thumbsup";

#[derive(Clone, Debug, PartialEq)]
pub enum EventOutcome {
    /// The message did not mention the bot.
    Ignored,
    Shared { url: String, title: String, sheet_name: String, rows_inserted: u32 },
    Rated { url: String, rating: String, row_index: usize },
    Replied { class: ErrorClass, reply_kind: &'static str },
    Skipped { class: ErrorClass },
}

/// One chat event from parse to reply. Every failure ends inside [`EventPipeline::process`].
pub struct EventPipeline {
    mention: String,
    authorizer: UserAuthorizer,
    resolver: TrackResolver,
    ledger: LedgerClient,
    responder: Arc<dyn Responder>,
    today: fn() -> NaiveDate,
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

impl EventPipeline {
    pub fn new(
        mention: impl Into<String>,
        authorizer: UserAuthorizer,
        resolver: TrackResolver,
        ledger: LedgerClient,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            mention: mention.into(),
            authorizer,
            resolver,
            ledger,
            responder,
            today: utc_today,
        }
    }

    pub fn with_date_source(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn is_addressed(&self, event: &ChatEvent) -> bool {
        is_bot_directed(event, &self.mention)
    }

    pub async fn process(&self, event: &ChatEvent, token: &CatalogToken) -> EventOutcome {
        if !self.is_addressed(event) {
            return EventOutcome::Ignored;
        }

        let correlation_id = event.correlation_id();
        info!(
            event_name = "ingress.slack.event_received",
            correlation_id = %correlation_id,
            channel = %event.channel,
            user = %event.user,
            "received bot-directed message"
        );

        match self.execute(event, token, &correlation_id).await {
            Ok(outcome) => outcome,
            Err(error) => self.handle_failure(event, &correlation_id, error).await,
        }
    }

    async fn execute(
        &self,
        event: &ChatEvent,
        token: &CatalogToken,
        correlation_id: &str,
    ) -> Result<EventOutcome, PipelineError> {
        let command = parse(event, &self.mention);
        let Some(kind) = command.kind() else {
            return Err(ValidationError::UnrecognizedCommand.into());
        };

        let user = match self.authorizer.authorize(&event.user).await? {
            AuthorizationDecision::Authorized(user) => user,
            AuthorizationDecision::Denied { display_name } => {
                return Err(ValidationError::NotAllowed { display_name }.into());
            }
        };
        check_permission(&user, kind)?;
        debug!(
            event_name = "pipeline.command.authorized",
            correlation_id,
            command = kind.as_str(),
            display_name = %user.display_name,
            role = ?user.role,
            "command authorized"
        );

        match command {
            Command::Share { url } => {
                let track = self.resolver.resolve(&url, token).await?;
                let row = LedgerRow::shared((self.today)(), &track, url.clone());
                let appended = self.ledger.append_row(&row).await?;

                info!(
                    event_name = "pipeline.share.recorded",
                    correlation_id,
                    url = %url,
                    title = %track.title,
                    sheet_name = %appended.sheet_name,
                    "share recorded"
                );
                let reacted = self
                    .responder
                    .add_reaction(&event.channel, &event.timestamp, ACK_REACTION)
                    .await;
                if let Err(error) = reacted {
                    warn!(
                        event_name = "egress.slack.reaction_failed",
                        correlation_id,
                        error = %error,
                        "failed to acknowledge share"
                    );
                }

                Ok(EventOutcome::Shared {
                    url,
                    title: track.title,
                    sheet_name: appended.sheet_name,
                    rows_inserted: appended.rows_inserted,
                })
            }
            Command::Rate { url, rating_text } => {
                let rating = validate(&rating_text)?;
                let update = self.ledger.update_rating(&url, rating).await?;

                info!(
                    event_name = "pipeline.rate.recorded",
                    correlation_id,
                    url = %url,
                    rating = %rating,
                    row_index = update.row_index,
                    "rating recorded"
                );
                let reply = Reply::RatingRecorded { url: url.clone(), rating: rating.cell_text() };
                self.send_reply(event, &reply, correlation_id).await;

                Ok(EventOutcome::Rated {
                    url,
                    rating: rating.cell_text(),
                    row_index: update.row_index,
                })
            }
            Command::Invalid => Err(ValidationError::UnrecognizedCommand.into()),
        }
    }

    async fn handle_failure(
        &self,
        event: &ChatEvent,
        correlation_id: &str,
        error: PipelineError,
    ) -> EventOutcome {
        let class = error.class();
        let reply = match (error.disposition(), reply_for(&error)) {
            (Disposition::Reply, Some(reply)) => reply,
            _ => {
                warn!(
                    event_name = "pipeline.event.skipped",
                    correlation_id,
                    class = ?class,
                    error = %error,
                    "event skipped after upstream failure"
                );
                return EventOutcome::Skipped { class };
            }
        };

        match class {
            ErrorClass::Validation => info!(
                event_name = "pipeline.event.rejected",
                correlation_id,
                reason = %error,
                reply = reply.kind(),
                "command rejected"
            ),
            _ => warn!(
                event_name = "pipeline.event.failed",
                correlation_id,
                class = ?class,
                error = %error,
                reply = reply.kind(),
                "command failed"
            ),
        }

        self.send_reply(event, &reply, correlation_id).await;
        EventOutcome::Replied { class, reply_kind: reply.kind() }
    }

    async fn send_reply(&self, event: &ChatEvent, reply: &Reply, correlation_id: &str) {
        if let Err(error) = self.responder.post_reply(&event.channel, reply, correlation_id).await {
            warn!(
                event_name = "egress.slack.reply_failed",
                correlation_id,
                reply = reply.kind(),
                error = %error,
                "failed to post reply; dropping it"
            );
        }
    }
}

fn reply_for(error: &PipelineError) -> Option<Reply> {
    match error {
        PipelineError::Validation(ValidationError::UnrecognizedCommand) => Some(Reply::Usage),
        PipelineError::Validation(ValidationError::InvalidRating { raw }) => {
            Some(Reply::InvalidRating { raw: raw.clone() })
        }
        PipelineError::Validation(ValidationError::NotAllowed { display_name }) => {
            Some(Reply::NotAllowed { display_name: display_name.clone() })
        }
        PipelineError::Validation(ValidationError::RoleRequired { display_name, .. }) => {
            Some(Reply::RoleRequired { display_name: display_name.clone() })
        }
        PipelineError::Lookup(_) => Some(Reply::UnknownUser),
        PipelineError::Business(LedgerError::NoMatchingRow { url }) => {
            Some(Reply::NoMatchingTrack { url: url.clone() })
        }
        PipelineError::Business(_) => Some(Reply::RecordFailed),
        PipelineError::Transport(_) | PipelineError::Upstream(_) => None,
    }
}
