//! Music share bot core: command parsing, access control, the ledger rules, and the poll loop
//! that feeds chat events through them.
//!
//! External services sit behind the traits in [`ports`]; the adapter crates implement them over
//! HTTP and [`memory`] implements them in memory.

pub mod access;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod driver;
pub mod errors;
pub mod ledger;
pub mod memory;
pub mod pipeline;
pub mod ports;

pub use access::{check_permission, AccessPolicy, AuthorizationDecision, UserAuthorizer};
pub use catalog::TrackResolver;
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat, UnmatchedRatingPolicy};
pub use domain::command::{ChatEvent, Command, CommandKind};
pub use domain::ledger::LedgerRow;
pub use domain::rating::Rating;
pub use domain::reply::Reply;
pub use domain::track::TrackMetadata;
pub use domain::user::{AuthorizedUser, ChatUser, Role};
pub use driver::{
    CycleReport, DriverError, DriverState, PollLoop, CATALOG_TOKEN_LIFETIME, POLL_INTERVAL,
    TOKEN_REFRESH_AFTER,
};
pub use errors::{
    CatalogError, ErrorClass, LedgerError, LookupError, PipelineError, Service, TransportError,
    ValidationError,
};
pub use ledger::{AppendOutcome, LedgerClient, RatingUpdate};
pub use pipeline::{EventOutcome, EventPipeline, ACK_REACTION};
pub use ports::{
    AppendReceipt, CatalogApi, CatalogToken, EventSource, Responder, SpreadsheetService,
    UserDirectory,
};
