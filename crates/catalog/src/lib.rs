//! Spotify Web API adapter: client-credentials token issuance and track lookup.

pub mod client;

pub use client::{SpotifyClient, TokenResponse};
