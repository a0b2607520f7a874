use std::fmt;

use crate::errors::ValidationError;

pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 10.0;

/// A rating that has passed validation; always within `RATING_MIN..=RATING_MAX`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Rating(f64);

impl Rating {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn cell_text(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn validate(raw: &str) -> Result<Rating, ValidationError> {
    let invalid = || ValidationError::InvalidRating { raw: raw.to_owned() };
    let value = raw.trim().parse::<f64>().map_err(|_| invalid())?;

    if !value.is_finite() || !(RATING_MIN..=RATING_MAX).contains(&value) {
        return Err(invalid());
    }

    // -0 parses and is in range, but should be written as 0
    Ok(Rating(if value == 0.0 { 0.0 } else { value }))
}
