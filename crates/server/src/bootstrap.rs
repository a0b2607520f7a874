use std::sync::Arc;
use std::time::Duration;

use musicshare_catalog::SpotifyClient;
use musicshare_core::config::{AppConfig, ConfigError};
use musicshare_core::{
    AccessPolicy, EventPipeline, LedgerClient, PollLoop, TrackResolver, TransportError,
    UserAuthorizer,
};
use musicshare_ledger::{AuthorizedUser, CredentialError, SheetsClient};
use musicshare_slack::{SlackGateway, SlackWebClient};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub sheets: Arc<SheetsClient>,
    pub poll_loop: PollLoop,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("could not build http client: {0}")]
    HttpClient(#[from] TransportError),
}

/// Wires adapters into the pipeline. Performs no network calls.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let timeout = Duration::from_secs(config.http.timeout_secs);

    let slack_client =
        SlackWebClient::new(&config.slack.api_base_url, config.slack.bot_token.clone(), timeout)?;
    let gateway = Arc::new(SlackGateway::new(
        slack_client,
        &config.slack.bot_user_id,
        config.slack.channels.clone(),
    ));

    let catalog = Arc::new(SpotifyClient::new(
        &config.catalog.token_url,
        &config.catalog.api_base_url,
        &config.catalog.client_id,
        config.catalog.client_secret.clone(),
        timeout,
    )?);

    let credentials = AuthorizedUser::load(&config.ledger.credentials_path)?;
    let sheets = Arc::new(SheetsClient::new(
        &config.ledger.api_base_url,
        &config.ledger.token_url,
        &config.ledger.spreadsheet_id,
        credentials,
        timeout,
    )?);
    info!(
        event_name = "system.bootstrap.credentials_loaded",
        correlation_id = "bootstrap",
        path = %config.ledger.credentials_path.display(),
        "spreadsheet credentials loaded"
    );

    let pipeline = EventPipeline::new(
        config.bot_mention(),
        UserAuthorizer::new(gateway.clone(), AccessPolicy::from_config(&config.access)),
        TrackResolver::new(catalog.clone()),
        LedgerClient::new(
            sheets.clone(),
            config.ledger.worksheet.clone(),
            config.ledger.unmatched_rating,
        ),
        gateway.clone(),
    );
    let poll_loop = PollLoop::new(gateway, catalog, pipeline)
        .with_interval(Duration::from_millis(config.poll.interval_ms));

    Ok(Application { config, sheets, poll_loop })
}
