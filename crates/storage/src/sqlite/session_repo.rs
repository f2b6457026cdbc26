use async_trait::async_trait;
use certi_core::model::{AnswerRecord, Level, SessionType, TestSession, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    level_from_i64, level_to_i64, question_id_from_i64, question_id_to_i64, ser,
    session_status_from_str, session_status_to_str, session_type_from_str, session_type_to_str,
    u8_from_i64, u32_from_i64, user_id_to_string,
};
use crate::repository::{AnswerRepository, SessionRepository, StorageError};

fn map_session_row(user: UserId, row: &sqlx::sqlite::SqliteRow) -> Result<TestSession, StorageError> {
    let level = level_from_i64(row.try_get::<i64, _>("level").map_err(ser)?)?;
    let session_number = u32_from_i64(
        "session_number",
        row.try_get::<i64, _>("session_number").map_err(ser)?,
    )?;
    let session_type =
        session_type_from_str(row.try_get::<String, _>("session_type").map_err(ser)?.as_str())?;
    let score = u8_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let status =
        session_status_from_str(row.try_get::<String, _>("status").map_err(ser)?.as_str())?;
    let total_questions = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let started_at = row.try_get("started_at").map_err(ser)?;
    let ended_at = row.try_get("ended_at").map_err(ser)?;
    let is_validated: bool = row.try_get("is_validated").map_err(ser)?;

    TestSession::from_persisted(
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
    )
    .map_err(ser)
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn upsert_session(&self, session: &TestSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO test_sessions (
                    user_id, level, session_number, session_type,
                    score, status, total_questions, started_at, ended_at, is_validated
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(user_id, level, session_number, session_type) DO UPDATE SET
                    score = excluded.score,
                    status = excluded.status,
                    total_questions = excluded.total_questions,
                    started_at = excluded.started_at,
                    ended_at = excluded.ended_at,
                    is_validated = excluded.is_validated
            ",
        )
        .bind(user_id_to_string(session.user()))
        .bind(level_to_i64(session.level()))
        .bind(i64::from(session.session_number()))
        .bind(session_type_to_str(session.session_type()))
        .bind(i64::from(session.score()))
        .bind(session_status_to_str(session.status()))
        .bind(i64::from(session.total_questions()))
        .bind(session.started_at())
        .bind(session.ended_at())
        .bind(session.is_validated())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_session(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
    ) -> Result<Option<TestSession>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT level, session_number, session_type, score, status,
                       total_questions, started_at, ended_at, is_validated
                FROM test_sessions
                WHERE user_id = ?1 AND level = ?2
                  AND session_number = ?3 AND session_type = ?4
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .bind(i64::from(session_number))
        .bind(session_type_to_str(session_type))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_session_row(user, &row)).transpose()
    }

    async fn list_sessions(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Vec<TestSession>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT level, session_number, session_type, score, status,
                       total_questions, started_at, ended_at, is_validated
                FROM test_sessions
                WHERE user_id = ?1 AND level = ?2
                ORDER BY session_number ASC, session_type ASC
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(user, &row)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl AnswerRepository for SqliteRepository {
    async fn replace_answers(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
                DELETE FROM test_answers
                WHERE user_id = ?1 AND level = ?2
                  AND session_number = ?3 AND session_type = ?4
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .bind(i64::from(session_number))
        .bind(session_type_to_str(session_type))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        for answer in answers {
            sqlx::query(
                r"
                    INSERT INTO test_answers (
                        user_id, level, session_number, session_type,
                        question_id, user_answer, is_correct, answered_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(user_id_to_string(answer.user))
            .bind(level_to_i64(level))
            .bind(i64::from(session_number))
            .bind(session_type_to_str(session_type))
            .bind(question_id_to_i64(answer.question)?)
            .bind(answer.user_answer.as_str())
            .bind(answer.is_correct)
            .bind(answer.answered_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_answers(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id, user_answer, is_correct, answered_at
                FROM test_answers
                WHERE user_id = ?1 AND level = ?2
                  AND session_number = ?3 AND session_type = ?4
                ORDER BY id ASC
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .bind(i64::from(session_number))
        .bind(session_type_to_str(session_type))
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(AnswerRecord {
                user,
                question: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
                user_answer: row.try_get("user_answer").map_err(ser)?,
                is_correct: row.try_get("is_correct").map_err(ser)?,
                answered_at: row.try_get("answered_at").map_err(ser)?,
            });
        }
        Ok(out)
    }
}
