use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{Level, UserId};

/// Minimum score (percent) for a session to count as validated.
pub const PASS_THRESHOLD: u8 = 75;

/// Kind of test session within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    /// Sequential sessions covering the level's question pool.
    Regular,
    /// The single catch-up session replaying previously failed questions.
    Remedial,
}

/// Terminal status of a session attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Completed,
    Abandoned,
}

/// Percentage score for a batch of answers, rounded half-up to an integer.
///
/// An empty batch scores zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn compute_score(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let score = (f64::from(correct) * 100.0 / f64::from(total)).round();
    score as u8
}

/// True when the score meets the validation threshold.
#[must_use]
pub fn is_passing(score: u8) -> bool {
    score >= PASS_THRESHOLD
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestSessionError {
    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("score {0} is out of range 0..=100")]
    ScoreOutOfRange(u8),
}

//
// ─── TEST SESSION ──────────────────────────────────────────────────────────────
//

/// Summary row for one session attempt.
///
/// One row exists per (user, level, session_number, session_type); re-running
/// a session overwrites its prior summary, so no per-attempt history is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSession {
    user: UserId,
    level: Level,
    session_number: u32,
    session_type: SessionType,
    score: u8,
    status: SessionStatus,
    total_questions: u32,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    is_validated: bool,
}

impl TestSession {
    /// Build the summary of a finished session from its answer counts.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError::InvalidTimeRange` if `ended_at` is before
    /// `started_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        correct: u32,
        total_questions: u32,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<Self, TestSessionError> {
        let score = compute_score(correct, total_questions);
        Self::from_persisted(
            user,
            level,
            session_number,
            session_type,
            score,
            SessionStatus::Completed,
            total_questions,
            started_at,
            ended_at,
            is_passing(score),
        )
    }

    /// Rehydrate a session summary from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError` if the time range or score is invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        score: u8,
        status: SessionStatus,
        total_questions: u32,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        is_validated: bool,
    ) -> Result<Self, TestSessionError> {
        if ended_at < started_at {
            return Err(TestSessionError::InvalidTimeRange);
        }
        if score > 100 {
            return Err(TestSessionError::ScoreOutOfRange(score));
        }

        Ok(Self {
            user,
            level,
            session_number,
            session_type,
            score,
            status,
            total_questions,
            started_at,
            ended_at,
            is_validated,
        })
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn session_number(&self) -> u32 {
        self.session_number
    }

    #[must_use]
    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.is_validated
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
