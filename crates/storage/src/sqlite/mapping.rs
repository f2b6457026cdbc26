use certi_core::model::{Level, QuestionId, SessionStatus, SessionType, UserId};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("question_id overflow".into()))
}

pub(crate) fn level_from_i64(v: i64) -> Result<Level, StorageError> {
    Ok(Level::new(u32_from_i64("level", v)?))
}

pub(crate) fn level_to_i64(level: Level) -> i64 {
    i64::from(level.value())
}

pub(crate) fn user_id_to_string(user: UserId) -> String {
    user.value().to_string()
}

/// Storage encoding for session types. This must stay consistent with
/// `session_type_from_str`.
pub(crate) fn session_type_to_str(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Regular => "regular",
        SessionType::Remedial => "remedial",
    }
}

pub(crate) fn session_type_from_str(s: &str) -> Result<SessionType, StorageError> {
    match s {
        "regular" => Ok(SessionType::Regular),
        "remedial" => Ok(SessionType::Remedial),
        _ => Err(StorageError::Serialization(format!(
            "invalid session_type: {s}"
        ))),
    }
}

pub(crate) fn session_status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Completed => "completed",
        SessionStatus::Abandoned => "abandoned",
    }
}

pub(crate) fn session_status_from_str(s: &str) -> Result<SessionStatus, StorageError> {
    match s {
        "completed" => Ok(SessionStatus::Completed),
        "abandoned" => Ok(SessionStatus::Abandoned),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}
