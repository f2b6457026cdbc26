use async_trait::async_trait;
use certi_core::model::{Level, LevelProgress, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{level_to_i64, ser, u32_from_i64, user_id_to_string};
use crate::repository::{ProgressRepository, StorageError};

fn map_progress_row(
    user: UserId,
    level: Level,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LevelProgress, StorageError> {
    let current = u32_from_i64(
        "current_session_number",
        row.try_get::<i64, _>("current_session_number").map_err(ser)?,
    )?;
    let total = u32_from_i64(
        "total_sessions",
        row.try_get::<i64, _>("total_sessions").map_err(ser)?,
    )?;
    let completed = u32_from_i64(
        "completed_sessions",
        row.try_get::<i64, _>("completed_sessions").map_err(ser)?,
    )?;
    let is_completed: bool = row.try_get("is_level_completed").map_err(ser)?;

    LevelProgress::from_persisted(user, level, current, total, completed, is_completed)
        .map_err(ser)
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Option<LevelProgress>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT current_session_number, total_sessions,
                       completed_sessions, is_level_completed
                FROM session_progress
                WHERE user_id = ?1 AND level = ?2
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_progress_row(user, level, &row)).transpose()
    }

    async fn upsert_progress(&self, progress: &LevelProgress) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO session_progress (
                    user_id, level, current_session_number,
                    total_sessions, completed_sessions, is_level_completed
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(user_id, level) DO UPDATE SET
                    current_session_number = excluded.current_session_number,
                    total_sessions = excluded.total_sessions,
                    completed_sessions = excluded.completed_sessions,
                    is_level_completed = excluded.is_level_completed
            ",
        )
        .bind(user_id_to_string(progress.user()))
        .bind(level_to_i64(progress.level()))
        .bind(i64::from(progress.current_session_number()))
        .bind(i64::from(progress.total_sessions()))
        .bind(i64::from(progress.completed_sessions()))
        .bind(progress.is_level_completed())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
