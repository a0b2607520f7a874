//! Google Sheets adapter for the track ledger.
//!
//! [`SheetsClient`] implements the core spreadsheet port over the v4 values API. Access tokens
//! come from a stored `authorized_user` grant (see [`credentials`]) that `musicshare sheets-auth`
//! creates through the consent flow in [`oauth`].

pub mod credentials;
pub mod oauth;
pub mod sheets;

pub use credentials::{AuthorizedUser, CredentialError};
pub use sheets::SheetsClient;
