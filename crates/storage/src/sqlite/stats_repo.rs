use async_trait::async_trait;
use chrono::{DateTime, Utc};
use certi_core::model::{QuestionId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{question_id_from_i64, question_id_to_i64, ser, u32_from_i64, user_id_to_string};
use crate::repository::{QuestionStat, QuestionStatRepository, StorageError, UserStatRepository, UserStats};

#[async_trait]
impl QuestionStatRepository for SqliteRepository {
    async fn record_attempt(
        &self,
        user: UserId,
        question: QuestionId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO question_stats (user_id, question_id, attempts, correct, last_attempted_at)
                VALUES (?1, ?2, 1, ?3, ?4)
                ON CONFLICT(user_id, question_id) DO UPDATE SET
                    attempts = attempts + 1,
                    correct = correct + excluded.correct,
                    last_attempted_at = excluded.last_attempted_at
            ",
        )
        .bind(user_id_to_string(user))
        .bind(question_id_to_i64(question)?)
        .bind(i64::from(is_correct))
        .bind(at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_stat(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<QuestionStat>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT question_id, attempts, correct, last_attempted_at
                FROM question_stats
                WHERE user_id = ?1 AND question_id = ?2
            ",
        )
        .bind(user_id_to_string(user))
        .bind(question_id_to_i64(question)?)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(QuestionStat {
            user,
            question: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
            attempts: u32_from_i64("attempts", row.try_get::<i64, _>("attempts").map_err(ser)?)?,
            correct: u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
            last_attempted_at: row.try_get("last_attempted_at").map_err(ser)?,
        }))
    }
}

#[async_trait]
impl UserStatRepository for SqliteRepository {
    async fn refresh_user_stats(&self, user: UserId) -> Result<UserStats, StorageError> {
        let row = sqlx::query(
            r"
                SELECT COUNT(*) AS completed,
                       COALESCE(SUM(is_validated), 0) AS validated,
                       COALESCE(AVG(score), 0.0) AS average_score
                FROM test_sessions
                WHERE user_id = ?1 AND status = 'completed'
            ",
        )
        .bind(user_id_to_string(user))
        .fetch_one(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let stats = UserStats {
            user,
            sessions_completed: u32_from_i64(
                "completed",
                row.try_get::<i64, _>("completed").map_err(ser)?,
            )?,
            sessions_validated: u32_from_i64(
                "validated",
                row.try_get::<i64, _>("validated").map_err(ser)?,
            )?,
            average_score: row.try_get("average_score").map_err(ser)?,
            updated_at: Utc::now(),
        };

        sqlx::query(
            r"
                INSERT INTO user_stats (
                    user_id, sessions_completed, sessions_validated, average_score, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id) DO UPDATE SET
                    sessions_completed = excluded.sessions_completed,
                    sessions_validated = excluded.sessions_validated,
                    average_score = excluded.average_score,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(user_id_to_string(user))
        .bind(i64::from(stats.sessions_completed))
        .bind(i64::from(stats.sessions_validated))
        .bind(stats.average_score)
        .bind(stats.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(stats)
    }

    async fn get_user_stats(&self, user: UserId) -> Result<Option<UserStats>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT sessions_completed, sessions_validated, average_score, updated_at
                FROM user_stats
                WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_string(user))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserStats {
            user,
            sessions_completed: u32_from_i64(
                "sessions_completed",
                row.try_get::<i64, _>("sessions_completed").map_err(ser)?,
            )?,
            sessions_validated: u32_from_i64(
                "sessions_validated",
                row.try_get::<i64, _>("sessions_validated").map_err(ser)?,
            )?,
            average_score: row.try_get("average_score").map_err(ser)?,
            updated_at: row.try_get("updated_at").map_err(ser)?,
        }))
    }
}
