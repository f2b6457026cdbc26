use async_trait::async_trait;
use certi_core::model::{Certification, Level, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{level_from_i64, level_to_i64, ser, u8_from_i64, user_id_to_string};
use crate::repository::{CertificationRepository, StorageError};

fn map_certification_row(
    user: UserId,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Certification, StorageError> {
    Ok(Certification {
        user,
        level: level_from_i64(row.try_get::<i64, _>("level").map_err(ser)?)?,
        score: u8_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        certified_at: row.try_get("certified_at").map_err(ser)?,
    })
}

#[async_trait]
impl CertificationRepository for SqliteRepository {
    async fn insert_certification(
        &self,
        certification: &Certification,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO user_certifications (user_id, level, score, certified_at)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(user_id_to_string(certification.user))
        .bind(level_to_i64(certification.level))
        .bind(i64::from(certification.score))
        .bind(certification.certified_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                StorageError::Conflict
            } else {
                StorageError::Connection(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn get_certification(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Option<Certification>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT level, score, certified_at
                FROM user_certifications
                WHERE user_id = ?1 AND level = ?2
            ",
        )
        .bind(user_id_to_string(user))
        .bind(level_to_i64(level))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.map(|row| map_certification_row(user, &row)).transpose()
    }

    async fn list_certifications(&self, user: UserId) -> Result<Vec<Certification>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT level, score, certified_at
                FROM user_certifications
                WHERE user_id = ?1
                ORDER BY level ASC
            ",
        )
        .bind(user_id_to_string(user))
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_certification_row(user, &row)?);
        }
        Ok(out)
    }
}
