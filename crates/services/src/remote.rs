use async_trait::async_trait;
use serde::Deserialize;

use certi_core::model::{AnswerVerdict, Level, Question, QuestionId, SessionType, UserId};

use crate::error::RemoteError;

/// Remote function returning the selected question set for one session.
///
/// Selection and ordering happen server-side; the client only forwards the
/// session coordinates and the configured percentage. An empty result means
/// "no questions available" for those coordinates.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the question set for a session.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failures or malformed payloads.
    async fn fetch_questions(
        &self,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        questions_percentage: u8,
    ) -> Result<Vec<Question>, RemoteError>;
}

/// Remote function validating a single answer.
///
/// The correct answer never reaches the client; only the verdict does, with
/// explanation/rule text on incorrect answers.
#[async_trait]
pub trait AnswerValidator: Send + Sync {
    /// Validate one submitted answer.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failures or malformed payloads.
    async fn validate(
        &self,
        question: QuestionId,
        user_answer: &str,
    ) -> Result<AnswerVerdict, RemoteError>;
}

/// Stored-procedure-style call computing a user's highest certified level.
#[async_trait]
pub trait CertifiedLevelSource: Send + Sync {
    /// Highest certified level, or `None` when the user holds none.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failures or malformed payloads.
    async fn max_certified_level(&self, user: UserId) -> Result<Option<Level>, RemoteError>;
}

/// Wire shapes observed for the question-set payload.
///
/// Depending on the function version the set arrives bare, under `questions`,
/// or under `data`; all three decode to the same list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionSetEnvelope {
    Bare(Vec<Question>),
    Wrapped { questions: Vec<Question> },
    Data { data: Vec<Question> },
}

pub(crate) fn decode_question_set(value: serde_json::Value) -> Result<Vec<Question>, RemoteError> {
    let envelope: QuestionSetEnvelope =
        serde_json::from_value(value).map_err(|e| RemoteError::Payload(e.to_string()))?;
    Ok(match envelope {
        QuestionSetEnvelope::Bare(questions)
        | QuestionSetEnvelope::Wrapped { questions }
        | QuestionSetEnvelope::Data { data: questions } => questions,
    })
}
