use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (progress, failed questions, sessions with answers,
/// certifications, statistics, configuration, and indexes).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_progress (
                    user_id TEXT NOT NULL,
                    level INTEGER NOT NULL CHECK (level >= 1),
                    current_session_number INTEGER NOT NULL CHECK (current_session_number >= 1),
                    total_sessions INTEGER NOT NULL CHECK (total_sessions >= 1),
                    completed_sessions INTEGER NOT NULL CHECK (completed_sessions >= 0),
                    is_level_completed INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (user_id, level)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS failed_questions (
                    user_id TEXT NOT NULL,
                    question_id INTEGER NOT NULL,
                    level INTEGER NOT NULL,
                    is_remediated INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (user_id, question_id, level)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS test_sessions (
                    user_id TEXT NOT NULL,
                    level INTEGER NOT NULL,
                    session_number INTEGER NOT NULL,
                    session_type TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                    status TEXT NOT NULL,
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    started_at TEXT NOT NULL,
                    ended_at TEXT NOT NULL,
                    is_validated INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (user_id, level, session_number, session_type)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS test_answers (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    level INTEGER NOT NULL,
                    session_number INTEGER NOT NULL,
                    session_type TEXT NOT NULL,
                    question_id INTEGER NOT NULL,
                    user_answer TEXT NOT NULL,
                    is_correct INTEGER NOT NULL,
                    answered_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_certifications (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    level INTEGER NOT NULL,
                    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                    certified_at TEXT NOT NULL,
                    UNIQUE (user_id, level)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_stats (
                    user_id TEXT NOT NULL,
                    question_id INTEGER NOT NULL,
                    attempts INTEGER NOT NULL CHECK (attempts >= 0),
                    correct INTEGER NOT NULL CHECK (correct >= 0),
                    last_attempted_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, question_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_stats (
                    user_id TEXT PRIMARY KEY,
                    sessions_completed INTEGER NOT NULL CHECK (sessions_completed >= 0),
                    sessions_validated INTEGER NOT NULL CHECK (sessions_validated >= 0),
                    average_score REAL NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS app_config (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_test_answers_session
                    ON test_answers (user_id, level, session_number, session_type);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_failed_questions_user_level
                    ON failed_questions (user_id, level, is_remediated);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_test_sessions_user_level
                    ON test_sessions (user_id, level, session_number);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
