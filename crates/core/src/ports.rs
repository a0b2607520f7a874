//! Seams between the core pipeline and the three external services.
//!
//! Adapter crates implement these traits over HTTP; [`crate::memory`] implements them in memory
//! for tests and dry runs.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::{
    command::ChatEvent, reply::Reply, track::TrackMetadata, user::ChatUser,
};
use crate::errors::{CatalogError, LookupError, TransportError};

/// Pull-based stream of chat messages.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Single connection attempt; the caller decides whether failure is fatal.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Messages that arrived since the previous call, oldest first.
    async fn next_events(&self) -> Result<Vec<ChatEvent>, TransportError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup_user(&self, user_id: &str) -> Result<ChatUser, LookupError>;
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), TransportError>;

    async fn post_reply(
        &self,
        channel: &str,
        reply: &Reply,
        correlation_id: &str,
    ) -> Result<(), TransportError>;
}

/// Bearer token for the music catalog. Never printed by `Debug`.
#[derive(Clone, Debug)]
pub struct CatalogToken(SecretString);

impl CatalogToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn issue_token(&self) -> Result<CatalogToken, TransportError>;

    async fn fetch_track(
        &self,
        track_id: &str,
        token: &CatalogToken,
    ) -> Result<TrackMetadata, CatalogError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppendReceipt {
    pub updated_range: String,
    pub updated_rows: u32,
    pub updated_cells: u32,
}

/// A1-notation access to one spreadsheet.
#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    async fn append_rows(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<AppendReceipt, TransportError>;

    /// First column of `range`, top to bottom; empty cells come back as empty strings.
    async fn read_column(&self, range: &str) -> Result<Vec<String>, TransportError>;

    /// Returns the number of cells the service reports as updated.
    async fn write_cells(&self, range: &str, rows: Vec<Vec<String>>)
        -> Result<u32, TransportError>;
}
