use chrono::{DateTime, Utc};

use crate::model::ids::{Level, QuestionId, UserId};

/// Record of a single answered question within a session attempt.
///
/// Answer rows for a session are replaced wholesale when the session is
/// re-attempted; no partial-answer history is retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub user: UserId,
    pub question: QuestionId,
    pub user_answer: String,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

impl AnswerRecord {
    #[must_use]
    pub fn new(
        user: UserId,
        question: QuestionId,
        user_answer: impl Into<String>,
        is_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user,
            question,
            user_answer: user_answer.into(),
            is_correct,
            answered_at,
        }
    }
}

/// A question the user got wrong, pending remediation.
///
/// Created when an answer is incorrect; flipped to remediated when the user
/// passes a remedial session for the level. Keyed by (user, question, level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedQuestion {
    pub user: UserId,
    pub question: QuestionId,
    pub level: Level,
    pub is_remediated: bool,
}

impl FailedQuestion {
    /// A fresh, unremediated failure.
    #[must_use]
    pub fn new(user: UserId, question: QuestionId, level: Level) -> Self {
        Self {
            user,
            question,
            level,
            is_remediated: false,
        }
    }
}
