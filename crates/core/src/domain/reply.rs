/// What the bot says back in the channel. Rendering into chat markup belongs to the adapter.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Usage,
    NotAllowed { display_name: String },
    RoleRequired { display_name: String },
    InvalidRating { raw: String },
    RatingRecorded { url: String, rating: String },
    NoMatchingTrack { url: String },
    RecordFailed,
    UnknownUser,
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Usage => "usage",
            Self::NotAllowed { .. } => "not_allowed",
            Self::RoleRequired { .. } => "role_required",
            Self::InvalidRating { .. } => "invalid_rating",
            Self::RatingRecorded { .. } => "rating_recorded",
            Self::NoMatchingTrack { .. } => "no_matching_track",
            Self::RecordFailed => "record_failed",
            Self::UnknownUser => "unknown_user",
        }
    }

    /// Plain-text version, also used as the chat notification fallback.
    pub fn text(&self) -> String {
        match self {
            Self::Usage => {
                "Usage: `share <spotify track link>` or `rate <spotify track link> <0-10>`"
                    .to_owned()
            }
            Self::NotAllowed { display_name } => {
                format!("Sorry {display_name}, you are not allowed to use this bot.")
            }
            Self::RoleRequired { display_name } => {
                format!("Sorry {display_name}, only the designated rater can rate tracks.")
            }
            Self::InvalidRating { raw } => {
                format!("`{raw}` is not a valid rating. Use a number from 0 to 10.")
            }
            Self::RatingRecorded { url, rating } => format!("Rated {url}: {rating}/10"),
            Self::NoMatchingTrack { url } => {
                format!("No shared track matches {url}. Share it before rating it.")
            }
            Self::RecordFailed => "Failed to record that in the spreadsheet.".to_owned(),
            Self::UnknownUser => "Could not look up who sent that message.".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Reply;

    #[test]
    fn denial_names_the_user() {
        let reply = Reply::NotAllowed { display_name: "Casey".to_owned() };
        assert!(reply.text().contains("Casey"));
        assert_eq!(reply.kind(), "not_allowed");
    }
}
