use chrono::NaiveDate;

use crate::domain::{rating::Rating, track::TrackMetadata};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of the shared-tracks worksheet: `[date, title, artists, url, rating]`.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub title: String,
    pub artists: String,
    pub url: String,
    pub rating: Option<Rating>,
}

impl LedgerRow {
    pub fn shared(date: NaiveDate, track: &TrackMetadata, url: impl Into<String>) -> Self {
        Self {
            date,
            title: track.title.clone(),
            artists: track.artist_line(),
            url: url.into(),
            rating: None,
        }
    }

    pub fn cells(&self) -> Vec<String> {
        vec![
            self.date.format(DATE_FORMAT).to_string(),
            self.title.clone(),
            self.artists.clone(),
            self.url.clone(),
            self.rating.map(Rating::cell_text).unwrap_or_default(),
        ]
    }
}
