//! Issued-code records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use beatschain_core::{DomainError, UserId};

use crate::code::Isrc;

/// One issued ISRC, as persisted by the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsrcRecord {
    pub isrc: Isrc,
    pub track_title: String,
    pub artist_name: String,
    pub user_id: UserId,
    pub generated_at: DateTime<Utc>,
    /// Set once the code has been embedded in a release.
    pub used: bool,
}

impl IsrcRecord {
    pub fn new(
        isrc: Isrc,
        track_title: impl Into<String>,
        artist_name: impl Into<String>,
        user_id: UserId,
    ) -> Result<Self, DomainError> {
        let track_title = track_title.into();
        let artist_name = artist_name.into();
        if track_title.trim().is_empty() {
            return Err(DomainError::validation("track title must not be empty"));
        }
        if artist_name.trim().is_empty() {
            return Err(DomainError::validation("artist name must not be empty"));
        }
        Ok(Self {
            isrc,
            track_title,
            artist_name,
            user_id,
            generated_at: Utc::now(),
            used: false,
        })
    }

    pub fn mark_used(&mut self) {
        self.used = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_unused() {
        let code = Isrc::new(26, 200).unwrap();
        let rec = IsrcRecord::new(code, "Midnight", "DJ Kalahari", UserId::new("u1").unwrap())
            .unwrap();
        assert!(!rec.used);
    }

    #[test]
    fn blank_metadata_is_rejected() {
        let code = Isrc::new(26, 200).unwrap();
        assert!(IsrcRecord::new(code.clone(), " ", "a", UserId::new("u1").unwrap()).is_err());
        assert!(IsrcRecord::new(code, "t", "", UserId::new("u1").unwrap()).is_err());
    }
}
