use thiserror::Error;

use crate::model::ids::Level;

/// Fallback questions percentage when configuration is missing or malformed.
pub const DEFAULT_QUESTIONS_PERCENTAGE: u8 = 20;

/// Sentinel session number for the remedial (catch-up) session of a level.
///
/// Regular sessions are numbered from 1; any number at or above this sentinel
/// identifies the single remedial session.
pub const REMEDIAL_SESSION_NUMBER: u32 = 99;

/// Returns true when the given session number designates a remedial session.
#[must_use]
pub fn is_remedial_number(session_number: u32) -> bool {
    session_number >= REMEDIAL_SESSION_NUMBER
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LevelPlanError {
    #[error("questions percentage must be in 1..=100, got {0}")]
    InvalidPercentage(u8),
}

//
// ─── LEVEL PLAN ────────────────────────────────────────────────────────────────
//

/// Session sizing for one level.
///
/// Each regular session covers `questions_percentage` percent of the level's
/// question pool, so a level needs `ceil(100 / percentage)` regular sessions.
/// The plan is recomputed from configuration on every load; stored progress is
/// clamped against it when the percentage changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPlan {
    level: Level,
    questions_percentage: u8,
}

impl LevelPlan {
    /// Creates a sizing plan for a level.
    ///
    /// # Errors
    ///
    /// Returns `LevelPlanError::InvalidPercentage` unless the percentage is in
    /// `1..=100`.
    pub fn new(level: Level, questions_percentage: u8) -> Result<Self, LevelPlanError> {
        if questions_percentage == 0 || questions_percentage > 100 {
            return Err(LevelPlanError::InvalidPercentage(questions_percentage));
        }
        Ok(Self {
            level,
            questions_percentage,
        })
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn questions_percentage(&self) -> u8 {
        self.questions_percentage
    }

    /// Number of regular sessions needed to cover the whole question pool.
    #[must_use]
    pub fn total_sessions(&self) -> u32 {
        100u32.div_ceil(u32::from(self.questions_percentage))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
