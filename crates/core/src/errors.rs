use std::fmt;

use thiserror::Error;

use crate::domain::user::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Service {
    Chat,
    Catalog,
    Ledger,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Catalog => "catalog",
            Self::Ledger => "ledger",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure talking to one of the external services at the network, auth or API layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("{service} request failed: {message}")]
    Request { service: Service, message: String },
    #[error("{service} responded with HTTP {status}")]
    Status { service: Service, status: u16 },
    #[error("{service} api error: {code}")]
    Api { service: Service, code: String },
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: Service, message: String },
}

const UNRECOVERABLE_API_CODES: &[&str] =
    &["invalid_auth", "not_authed", "account_inactive", "token_revoked", "token_expired"];

impl TransportError {
    pub fn service(&self) -> Service {
        match self {
            Self::Request { service, .. }
            | Self::Status { service, .. }
            | Self::Api { service, .. }
            | Self::Decode { service, .. } => *service,
        }
    }

    /// Credentials were rejected; retrying the same call cannot succeed.
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            Self::Api { code, .. } => UNRECOVERABLE_API_CODES.contains(&code.as_str()),
            Self::Status { status, .. } => *status == 401,
            Self::Request { .. } | Self::Decode { .. } => false,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("lookup of chat user `{user_id}` failed: {reason}")]
pub struct LookupError {
    pub user_id: String,
    pub reason: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("url `{0}` does not contain a catalog track identifier")]
    MissingTrackId(String),
    #[error("catalog responded with HTTP {status} for track `{track_id}`")]
    Status { track_id: String, status: u16 },
    #[error("catalog payload for track `{track_id}` is malformed: {reason}")]
    Malformed { track_id: String, reason: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger reported zero appended cells")]
    NothingAppended,
    #[error("ledger reported zero updated cells for `{url}`")]
    NothingUpdated { url: String },
    #[error("no ledger row matches `{url}`")]
    NoMatchingRow { url: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message is not a recognized command")]
    UnrecognizedCommand,
    #[error("rating `{raw}` is not a number between 0 and 10")]
    InvalidRating { raw: String },
    #[error("`{display_name}` is not on the allow-list")]
    NotAllowed { display_name: String },
    #[error("`{display_name}` lacks the {required:?} role")]
    RoleRequired { display_name: String, required: Role },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Transport,
    Lookup,
    Validation,
    Business,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Reply,
    LogAndSkip,
}

/// Everything that can stop one event's trip through the pipeline.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Upstream(#[from] CatalogError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Business(LedgerError),
}

impl From<LedgerError> for PipelineError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Transport(error) => Self::Transport(error),
            other => Self::Business(other),
        }
    }
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) | Self::Upstream(_) => ErrorClass::Transport,
            Self::Lookup(_) => ErrorClass::Lookup,
            Self::Validation(_) => ErrorClass::Validation,
            Self::Business(_) => ErrorClass::Business,
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self.class() {
            ErrorClass::Transport => Disposition::LogAndSkip,
            ErrorClass::Lookup | ErrorClass::Validation | ErrorClass::Business => {
                Disposition::Reply
            }
        }
    }
}
