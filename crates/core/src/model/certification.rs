use chrono::{DateTime, Utc};

use crate::model::ids::{Level, UserId};

/// Persisted proof that a user validated a level.
///
/// One record exists per (user, level); issuing again for the same pair
/// returns the existing record instead of inserting a duplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certification {
    pub user: UserId,
    pub level: Level,
    pub score: u8,
    pub certified_at: DateTime<Utc>,
}

impl Certification {
    #[must_use]
    pub fn new(user: UserId, level: Level, score: u8, certified_at: DateTime<Utc>) -> Self {
        Self {
            user,
            level,
            score,
            certified_at,
        }
    }
}
