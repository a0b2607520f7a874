use std::sync::Arc;

use tracing::debug;

use crate::domain::track::{track_id_from_url, TrackMetadata};
use crate::errors::CatalogError;
use crate::ports::{CatalogApi, CatalogToken};

/// Turns a shared catalog link into title and artists.
pub struct TrackResolver {
    api: Arc<dyn CatalogApi>,
}

impl TrackResolver {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        Self { api }
    }

    pub async fn resolve(
        &self,
        url: &str,
        token: &CatalogToken,
    ) -> Result<TrackMetadata, CatalogError> {
        let track_id =
            track_id_from_url(url).ok_or_else(|| CatalogError::MissingTrackId(url.to_owned()))?;

        let track = self.api.fetch_track(track_id, token).await?;
        if track.title.trim().is_empty() {
            return Err(CatalogError::Malformed {
                track_id: track_id.to_owned(),
                reason: "track has no name".to_owned(),
            });
        }
        if track.artists.iter().all(|artist| artist.trim().is_empty()) {
            return Err(CatalogError::Malformed {
                track_id: track_id.to_owned(),
                reason: "track has no artists".to_owned(),
            });
        }

        debug!(
            event_name = "catalog.track.resolved",
            track_id,
            title = %track.title,
            artist_count = track.artists.len(),
            "resolved catalog track"
        );
        Ok(track)
    }
}
