use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::TransportError;
use crate::pipeline::{EventOutcome, EventPipeline};
use crate::ports::{CatalogApi, CatalogToken, EventSource};

/// Lifetime the catalog grants to a client-credentials token.
pub const CATALOG_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);
/// Age after which the loop asks for a fresh token, leaving headroom before expiry.
pub const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(55 * 60);
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Connecting,
    Running,
    Terminated,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("could not connect to the chat platform: {0}")]
    Connect(#[source] TransportError),
    #[error("could not obtain the initial catalog token: {0}")]
    InitialToken(#[source] TransportError),
    #[error("chat event stream failed with unrecoverable credentials: {0}")]
    EventStream(#[source] TransportError),
    #[error("poll loop is {0:?}; expected Running")]
    NotRunning(DriverState),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub token_refreshed: bool,
    pub events_received: usize,
    pub outcomes: Vec<EventOutcome>,
}

struct IssuedToken {
    token: CatalogToken,
    issued_at: Instant,
}

/// The only stateful component: connection state plus the current catalog token.
pub struct PollLoop {
    events: Arc<dyn EventSource>,
    catalog: Arc<dyn CatalogApi>,
    pipeline: EventPipeline,
    interval: Duration,
    state: DriverState,
    token: Option<IssuedToken>,
}

impl PollLoop {
    pub fn new(
        events: Arc<dyn EventSource>,
        catalog: Arc<dyn CatalogApi>,
        pipeline: EventPipeline,
    ) -> Self {
        Self {
            events,
            catalog,
            pipeline,
            interval: POLL_INTERVAL,
            state: DriverState::Connecting,
            token: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Connects once and fetches the first token. Either failure terminates the loop.
    pub async fn start(&mut self, now: Instant) -> Result<(), DriverError> {
        if self.state != DriverState::Connecting {
            return Err(DriverError::NotRunning(self.state));
        }

        info!(event_name = "driver.connect.start", "connecting to chat platform");
        if let Err(transport) = self.events.connect().await {
            self.state = DriverState::Terminated;
            error!(
                event_name = "driver.connect.failed",
                error = %transport,
                "chat connection failed; invalid bot token or bot id?"
            );
            return Err(DriverError::Connect(transport));
        }

        match self.catalog.issue_token().await {
            Ok(token) => {
                self.token = Some(IssuedToken { token, issued_at: now });
                self.state = DriverState::Running;
                info!(
                    event_name = "driver.connect.running",
                    poll_interval_ms = self.interval.as_millis() as u64,
                    "music share bot connected and running"
                );
                Ok(())
            }
            Err(transport) => {
                self.state = DriverState::Terminated;
                error!(
                    event_name = "driver.token.initial_failed",
                    error = %transport,
                    "could not obtain catalog token"
                );
                Err(DriverError::InitialToken(transport))
            }
        }
    }

    pub async fn run_cycle(&mut self, now: Instant) -> Result<CycleReport, DriverError> {
        if self.state != DriverState::Running {
            return Err(DriverError::NotRunning(self.state));
        }

        let cycle_id = Uuid::new_v4();
        let token_refreshed = self.refresh_token_if_due(now, cycle_id).await;

        let events = match self.events.next_events().await {
            Ok(events) => events,
            Err(transport) if transport.is_unrecoverable() => {
                self.state = DriverState::Terminated;
                error!(
                    event_name = "driver.events.unrecoverable",
                    correlation_id = %cycle_id,
                    error = %transport,
                    "chat credentials rejected; stopping poll loop"
                );
                return Err(DriverError::EventStream(transport));
            }
            Err(transport) => {
                warn!(
                    event_name = "driver.events.fetch_failed",
                    correlation_id = %cycle_id,
                    error = %transport,
                    "failed to fetch chat events; continuing"
                );
                return Ok(CycleReport {
                    cycle_id,
                    token_refreshed,
                    events_received: 0,
                    outcomes: Vec::new(),
                });
            }
        };

        let Some(issued) = self.token.as_ref() else {
            return Err(DriverError::NotRunning(self.state));
        };

        let mut outcomes = Vec::with_capacity(events.len());
        for event in &events {
            outcomes.push(self.pipeline.process(event, &issued.token).await);
        }

        if !events.is_empty() {
            debug!(
                event_name = "driver.cycle.completed",
                correlation_id = %cycle_id,
                events_received = events.len(),
                "poll cycle completed"
            );
        }

        Ok(CycleReport { cycle_id, token_refreshed, events_received: events.len(), outcomes })
    }

    /// Runs until the credentials are rejected. Never returns `Ok`.
    pub async fn run(&mut self) -> Result<(), DriverError> {
        self.start(Instant::now()).await?;
        loop {
            self.run_cycle(Instant::now()).await?;
            tokio::time::sleep(self.interval).await;
        }
    }

    async fn refresh_token_if_due(&mut self, now: Instant, cycle_id: Uuid) -> bool {
        let Some(issued_at) = self.token.as_ref().map(|issued| issued.issued_at) else {
            return false;
        };
        let age = now.saturating_duration_since(issued_at);
        if age <= TOKEN_REFRESH_AFTER {
            return false;
        }

        match self.catalog.issue_token().await {
            Ok(token) => {
                self.token = Some(IssuedToken { token, issued_at: now });
                info!(
                    event_name = "driver.token.refreshed",
                    correlation_id = %cycle_id,
                    previous_age_secs = age.as_secs(),
                    "catalog token refreshed"
                );
                true
            }
            Err(transport) => {
                warn!(
                    event_name = "driver.token.refresh_failed",
                    correlation_id = %cycle_id,
                    age_secs = age.as_secs(),
                    expired = age >= CATALOG_TOKEN_LIFETIME,
                    error = %transport,
                    "catalog token refresh failed; keeping previous token until next cycle"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::{DriverError, DriverState, PollLoop, TOKEN_REFRESH_AFTER};
    use crate::access::{AccessPolicy, UserAuthorizer};
    use crate::catalog::TrackResolver;
    use crate::config::UnmatchedRatingPolicy;
    use crate::domain::{command::ChatEvent, track::TrackMetadata, user::ChatUser};
    use crate::errors::{Service, TransportError};
    use crate::ledger::LedgerClient;
    use crate::memory::{InMemoryCatalog, InMemoryChat, InMemorySpreadsheet};
    use crate::pipeline::{EventOutcome, EventPipeline};

    struct Fixture {
        chat: Arc<InMemoryChat>,
        catalog: Arc<InMemoryCatalog>,
        sheet: Arc<InMemorySpreadsheet>,
        driver: PollLoop,
    }

    async fn fixture() -> Fixture {
        let chat = Arc::new(InMemoryChat::default());
        chat.add_user(ChatUser {
            id: "UALICE".to_owned(),
            handle: "alice".to_owned(),
            real_name: Some("Alice".to_owned()),
            display_name: None,
        })
        .await;
        let catalog = Arc::new(InMemoryCatalog::default());
        catalog
            .add_track(
                "abc",
                TrackMetadata {
                    title: "Svefn-g-englar".to_owned(),
                    artists: vec!["Sigur Rós".to_owned()],
                },
            )
            .await;
        let sheet = Arc::new(InMemorySpreadsheet::default());

        let pipeline = EventPipeline::new(
            "<@UBOT>",
            UserAuthorizer::new(chat.clone(), AccessPolicy::new(["Alice"], Vec::<String>::new())),
            TrackResolver::new(catalog.clone()),
            LedgerClient::new(sheet.clone(), "Tracks", UnmatchedRatingPolicy::Reject),
            chat.clone(),
        );
        let driver = PollLoop::new(chat.clone(), catalog.clone(), pipeline);

        Fixture { chat, catalog, sheet, driver }
    }

    fn share(ts: &str, track: &str) -> ChatEvent {
        ChatEvent {
            channel: "CMUSIC".to_owned(),
            user: "UALICE".to_owned(),
            text: format!("<@UBOT> share https://open.spotify.com/track/{track}"),
            timestamp: ts.to_owned(),
        }
    }

    #[tokio::test]
    async fn connect_failure_is_fatal_and_not_retried() {
        let mut fixture = fixture().await;
        fixture
            .chat
            .fail_connect(TransportError::Api {
                service: Service::Chat,
                code: "invalid_auth".to_owned(),
            })
            .await;

        let result = fixture.driver.start(Instant::now()).await;

        assert!(matches!(result, Err(DriverError::Connect(_))));
        assert_eq!(fixture.driver.state(), DriverState::Terminated);
        assert_eq!(fixture.chat.connect_attempts().await, 1);
        assert_eq!(fixture.catalog.tokens_issued().await, 0);
    }

    #[tokio::test]
    async fn initial_token_failure_is_fatal() {
        let mut fixture = fixture().await;
        fixture
            .catalog
            .fail_next_token(TransportError::Status { service: Service::Catalog, status: 400 })
            .await;

        let result = fixture.driver.start(Instant::now()).await;

        assert!(matches!(result, Err(DriverError::InitialToken(_))));
        assert_eq!(fixture.driver.state(), DriverState::Terminated);
    }

    #[tokio::test]
    async fn cycles_require_a_started_loop() {
        let mut fixture = fixture().await;

        let result = fixture.driver.run_cycle(Instant::now()).await;
        assert!(matches!(result, Err(DriverError::NotRunning(DriverState::Connecting))));
    }

    #[tokio::test]
    async fn token_is_refreshed_only_after_threshold() {
        let mut fixture = fixture().await;
        let start = Instant::now();
        fixture.driver.start(start).await.expect("start");

        let early = fixture
            .driver
            .run_cycle(start + Duration::from_secs(54 * 60))
            .await
            .expect("cycle");
        let at_threshold =
            fixture.driver.run_cycle(start + TOKEN_REFRESH_AFTER).await.expect("cycle");
        assert!(!early.token_refreshed);
        assert!(!at_threshold.token_refreshed);
        assert_eq!(fixture.catalog.tokens_issued().await, 1);

        let late = fixture
            .driver
            .run_cycle(start + TOKEN_REFRESH_AFTER + Duration::from_secs(1))
            .await
            .expect("cycle");
        assert!(late.token_refreshed);
        assert_eq!(fixture.catalog.tokens_issued().await, 2);
        assert_ne!(early.cycle_id, late.cycle_id);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_old_token_and_retries_next_cycle() {
        let mut fixture = fixture().await;
        let start = Instant::now();
        fixture.driver.start(start).await.expect("start");
        fixture
            .catalog
            .fail_next_token(TransportError::Request {
                service: Service::Catalog,
                message: "timed out".to_owned(),
            })
            .await;
        fixture.chat.push_batch(vec![share("1.0001", "abc")]).await;

        let due = start + TOKEN_REFRESH_AFTER + Duration::from_secs(5);
        let failed = fixture.driver.run_cycle(due).await.expect("cycle");
        assert!(!failed.token_refreshed);
        assert_eq!(fixture.catalog.tokens_seen().await, vec!["memory-token-1".to_owned()]);

        fixture.chat.push_batch(vec![share("1.0002", "abc")]).await;
        let retried = fixture.driver.run_cycle(due + Duration::from_secs(1)).await.expect("cycle");
        assert!(retried.token_refreshed);
        assert_eq!(
            fixture.catalog.tokens_seen().await,
            vec!["memory-token-1".to_owned(), "memory-token-2".to_owned()]
        );
    }

    #[tokio::test]
    async fn recoverable_fetch_failure_keeps_loop_running() {
        let mut fixture = fixture().await;
        let start = Instant::now();
        fixture.driver.start(start).await.expect("start");
        fixture
            .chat
            .push_failure(TransportError::Status { service: Service::Chat, status: 503 })
            .await;
        fixture.chat.push_batch(vec![share("1.0001", "abc")]).await;

        let failed = fixture.driver.run_cycle(start).await.expect("cycle survives");
        assert_eq!(failed.events_received, 0);
        assert_eq!(fixture.driver.state(), DriverState::Running);

        let next = fixture.driver.run_cycle(start).await.expect("cycle");
        assert_eq!(next.events_received, 1);
        assert_eq!(fixture.sheet.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn revoked_credentials_terminate_the_loop() {
        let mut fixture = fixture().await;
        let start = Instant::now();
        fixture.driver.start(start).await.expect("start");
        fixture
            .chat
            .push_failure(TransportError::Api {
                service: Service::Chat,
                code: "token_revoked".to_owned(),
            })
            .await;

        let result = fixture.driver.run_cycle(start).await;
        assert!(matches!(result, Err(DriverError::EventStream(_))));
        assert_eq!(fixture.driver.state(), DriverState::Terminated);

        let after = fixture.driver.run_cycle(start).await;
        assert!(matches!(after, Err(DriverError::NotRunning(DriverState::Terminated))));
    }

    #[tokio::test]
    async fn failing_event_does_not_stop_the_rest_of_the_batch() {
        let mut fixture = fixture().await;
        let start = Instant::now();
        fixture.driver.start(start).await.expect("start");
        fixture
            .chat
            .push_batch(vec![
                share("1.0001", "abc"),
                share("1.0002", "missing"),
                ChatEvent {
                    channel: "CMUSIC".to_owned(),
                    user: "UALICE".to_owned(),
                    text: "just chatting".to_owned(),
                    timestamp: "1.0003".to_owned(),
                },
                share("1.0004", "abc"),
            ])
            .await;

        let report = fixture.driver.run_cycle(start).await.expect("cycle");

        assert_eq!(report.events_received, 4);
        assert!(matches!(report.outcomes[0], EventOutcome::Shared { .. }));
        assert!(matches!(report.outcomes[1], EventOutcome::Skipped { .. }));
        assert_eq!(report.outcomes[2], EventOutcome::Ignored);
        assert!(matches!(report.outcomes[3], EventOutcome::Shared { .. }));
        assert_eq!(fixture.sheet.rows().await.len(), 2);

        let acknowledged: Vec<String> =
            fixture.chat.reactions().await.into_iter().map(|reaction| reaction.timestamp).collect();
        assert_eq!(acknowledged, vec!["1.0001".to_owned(), "1.0004".to_owned()]);
    }
}
