use async_trait::async_trait;
use certi_core::model::{FailedQuestion, Level, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{level_to_i64, question_id_from_i64, question_id_to_i64, ser, user_id_to_string};
use crate::repository::{FailedQuestionRepository, StorageError};

#[async_trait]
impl FailedQuestionRepository for SqliteRepository {
    async fn record_failed(&self, failed: &FailedQuestion) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO failed_questions (user_id, question_id, level, is_remediated)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, question_id, level) DO UPDATE SET
                    is_remediated = excluded.is_remediated
            ",
        )
        .bind(user_id_to_string(failed.user))
        .bind(question_id_to_i64(failed.question)?)
        .bind(level_to_i64(failed.level))
        .bind(failed.is_remediated)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn unremediated(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Vec<FailedQuestion>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id
                FROM failed_questions
                WHERE user_id = ?1 AND level = ?2 AND is_remediated = 0
                ORDER BY question_id ASC
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let question = question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?;
            out.push(FailedQuestion::new(user, question, level));
        }
        Ok(out)
    }

    async fn mark_remediated(&self, user: UserId, level: Level) -> Result<u64, StorageError> {
        let res = sqlx::query(
            r"
                UPDATE failed_questions
                SET is_remediated = 1
                WHERE user_id = ?1 AND level = ?2 AND is_remediated = 0
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.rows_affected())
    }
}
