use serde::{Deserialize, Serialize};

use crate::domain::command::CATALOG_URL_PREFIX;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artists: Vec<String>,
}

impl TrackMetadata {
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// `https://open.spotify.com/track/<id>?si=...` -> `<id>`
pub fn track_id_from_url(url: &str) -> Option<&str> {
    let prefix = url.get(..CATALOG_URL_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(CATALOG_URL_PREFIX) {
        return None;
    }

    let rest = &url[CATALOG_URL_PREFIX.len()..];
    let id = rest.split(['?', '#', '/']).next().unwrap_or_default();
    (!id.is_empty() && id.chars().all(|ch| ch.is_ascii_alphanumeric())).then_some(id)
}
