use async_trait::async_trait;
use chrono::{DateTime, Utc};
use certi_core::model::{
    AnswerRecord, Certification, FailedQuestion, Level, LevelProgress, QuestionId, SessionType,
    TestSession, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Per-question attempt counters for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionStat {
    pub user: UserId,
    pub question: QuestionId,
    pub attempts: u32,
    pub correct: u32,
    pub last_attempted_at: DateTime<Utc>,
}

/// Aggregate counters recomputed from a user's session summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub user: UserId,
    pub sessions_completed: u32,
    pub sessions_validated: u32,
    pub average_score: f64,
    pub updated_at: DateTime<Utc>,
}

/// Repository contract for per-level progress rows.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress row for a (user, level) pair, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_progress(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Option<LevelProgress>, StorageError>;

    /// Persist or update a progress row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(&self, progress: &LevelProgress) -> Result<(), StorageError>;
}

/// Repository contract for failed-question rows.
#[async_trait]
pub trait FailedQuestionRepository: Send + Sync {
    /// Idempotent upsert keyed by (user, question, level).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn record_failed(&self, failed: &FailedQuestion) -> Result<(), StorageError>;

    /// All unremediated failures for a (user, level) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn unremediated(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Vec<FailedQuestion>, StorageError>;

    /// Mark every failure for a (user, level) pair as remediated.
    ///
    /// Returns the number of rows touched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn mark_remediated(&self, user: UserId, level: Level) -> Result<u64, StorageError>;
}

/// Repository contract for session summary rows.
///
/// Summaries are keyed by (user, level, session_number, session_type);
/// upserting an existing key overwrites the prior attempt.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist or overwrite a session summary.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_session(&self, session: &TestSession) -> Result<(), StorageError>;

    /// Fetch one summary by its full key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_session(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
    ) -> Result<Option<TestSession>, StorageError>;

    /// All summaries for a (user, level) pair, ordered by session number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_sessions(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Vec<TestSession>, StorageError>;
}

/// Repository contract for per-session answer rows.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Replace the answers of one session attempt wholesale.
    ///
    /// Prior rows for the key are deleted before the new batch is inserted;
    /// re-attempting a session therefore keeps no partial-answer history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be stored.
    async fn replace_answers(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError>;

    /// Current answer rows for one session attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_answers(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
    ) -> Result<Vec<AnswerRecord>, StorageError>;
}

/// Repository contract for certification records.
#[async_trait]
pub trait CertificationRepository: Send + Sync {
    /// Insert a certification.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when a record already exists for the
    /// (user, level) pair, or another `StorageError` on storage failures.
    async fn insert_certification(&self, certification: &Certification)
    -> Result<(), StorageError>;

    /// Fetch the certification for a (user, level) pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_certification(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Option<Certification>, StorageError>;

    /// All certifications held by a user, ordered by level.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_certifications(&self, user: UserId) -> Result<Vec<Certification>, StorageError>;
}

/// Repository contract for per-question attempt statistics.
#[async_trait]
pub trait QuestionStatRepository: Send + Sync {
    /// Fold one attempt into the (user, question) counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counters cannot be stored.
    async fn record_attempt(
        &self,
        user: UserId,
        question: QuestionId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Current counters for a (user, question) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_stat(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<QuestionStat>, StorageError>;
}

/// Repository contract for aggregate user statistics.
#[async_trait]
pub trait UserStatRepository: Send + Sync {
    /// Recompute the user's aggregates from session summaries and persist them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn refresh_user_stats(&self, user: UserId) -> Result<UserStats, StorageError>;

    /// Last persisted aggregates for the user, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_user_stats(&self, user: UserId) -> Result<Option<UserStats>, StorageError>;
}

/// Generic key/value configuration store (admin-editable settings).
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Raw configuration value for a key, if set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Set or overwrite a configuration value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

type SessionKey = (UserId, Level, u32, SessionType);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(UserId, Level), LevelProgress>>>,
    failed: Arc<Mutex<HashMap<(UserId, QuestionId, Level), FailedQuestion>>>,
    sessions: Arc<Mutex<HashMap<SessionKey, TestSession>>>,
    answers: Arc<Mutex<HashMap<SessionKey, Vec<AnswerRecord>>>>,
    certifications: Arc<Mutex<HashMap<(UserId, Level), Certification>>>,
    question_stats: Arc<Mutex<HashMap<(UserId, QuestionId), QuestionStat>>>,
    user_stats: Arc<Mutex<HashMap<UserId, UserStats>>>,
    config: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a, T>(
        map: &'a Arc<Mutex<T>>,
    ) -> Result<std::sync::MutexGuard<'a, T>, StorageError> {
        map.lock().map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Option<LevelProgress>, StorageError> {
        let guard = Self::lock(&self.progress)?;
        Ok(guard.get(&(user, level)).cloned())
    }

    async fn upsert_progress(&self, progress: &LevelProgress) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.progress)?;
        guard.insert((progress.user(), progress.level()), progress.clone());
        Ok(())
    }
}

#[async_trait]
impl FailedQuestionRepository for InMemoryRepository {
    async fn record_failed(&self, failed: &FailedQuestion) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.failed)?;
        guard.insert(
            (failed.user, failed.question, failed.level),
            failed.clone(),
        );
        Ok(())
    }

    async fn unremediated(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Vec<FailedQuestion>, StorageError> {
        let guard = Self::lock(&self.failed)?;
        let mut rows: Vec<FailedQuestion> = guard
            .values()
            .filter(|f| f.user == user && f.level == level && !f.is_remediated)
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.question);
        Ok(rows)
    }

    async fn mark_remediated(&self, user: UserId, level: Level) -> Result<u64, StorageError> {
        let mut guard = Self::lock(&self.failed)?;
        let mut touched = 0;
        for failed in guard.values_mut() {
            if failed.user == user && failed.level == level && !failed.is_remediated {
                failed.is_remediated = true;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn upsert_session(&self, session: &TestSession) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.sessions)?;
        let key = (
            session.user(),
            session.level(),
            session.session_number(),
            session.session_type(),
        );
        guard.insert(key, session.clone());
        Ok(())
    }

    async fn get_session(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
    ) -> Result<Option<TestSession>, StorageError> {
        let guard = Self::lock(&self.sessions)?;
        Ok(guard.get(&(user, level, session_number, session_type)).cloned())
    }

    async fn list_sessions(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Vec<TestSession>, StorageError> {
        let guard = Self::lock(&self.sessions)?;
        let mut rows: Vec<TestSession> = guard
            .values()
            .filter(|s| s.user() == user && s.level() == level)
            .cloned()
            .collect();
        rows.sort_by_key(TestSession::session_number);
        Ok(rows)
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn replace_answers(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.answers)?;
        guard.insert(
            (user, level, session_number, session_type),
            answers.to_vec(),
        );
        Ok(())
    }

    async fn list_answers(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
    ) -> Result<Vec<AnswerRecord>, StorageError> {
        let guard = Self::lock(&self.answers)?;
        Ok(guard
            .get(&(user, level, session_number, session_type))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CertificationRepository for InMemoryRepository {
    async fn insert_certification(
        &self,
        certification: &Certification,
    ) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.certifications)?;
        let key = (certification.user, certification.level);
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, certification.clone());
        Ok(())
    }

    async fn get_certification(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Option<Certification>, StorageError> {
        let guard = Self::lock(&self.certifications)?;
        Ok(guard.get(&(user, level)).cloned())
    }

    async fn list_certifications(&self, user: UserId) -> Result<Vec<Certification>, StorageError> {
        let guard = Self::lock(&self.certifications)?;
        let mut rows: Vec<Certification> = guard
            .values()
            .filter(|c| c.user == user)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.level);
        Ok(rows)
    }
}

#[async_trait]
impl QuestionStatRepository for InMemoryRepository {
    async fn record_attempt(
        &self,
        user: UserId,
        question: QuestionId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.question_stats)?;
        let stat = guard.entry((user, question)).or_insert(QuestionStat {
            user,
            question,
            attempts: 0,
            correct: 0,
            last_attempted_at: at,
        });
        stat.attempts += 1;
        if is_correct {
            stat.correct += 1;
        }
        stat.last_attempted_at = at;
        Ok(())
    }

    async fn get_stat(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<QuestionStat>, StorageError> {
        let guard = Self::lock(&self.question_stats)?;
        Ok(guard.get(&(user, question)).cloned())
    }
}

#[async_trait]
impl UserStatRepository for InMemoryRepository {
    async fn refresh_user_stats(&self, user: UserId) -> Result<UserStats, StorageError> {
        let completed: Vec<TestSession> = {
            let guard = Self::lock(&self.sessions)?;
            guard
                .values()
                .filter(|s| s.user() == user)
                .cloned()
                .collect()
        };

        let sessions_completed = u32::try_from(completed.len())
            .map_err(|_| StorageError::Serialization("session count overflow".into()))?;
        let sessions_validated = u32::try_from(
            completed.iter().filter(|s| s.is_validated()).count(),
        )
        .map_err(|_| StorageError::Serialization("session count overflow".into()))?;
        let average_score = if completed.is_empty() {
            0.0
        } else {
            let sum: u32 = completed.iter().map(|s| u32::from(s.score())).sum();
            f64::from(sum) / completed.len() as f64
        };

        let stats = UserStats {
            user,
            sessions_completed,
            sessions_validated,
            average_score,
            updated_at: Utc::now(),
        };

        let mut guard = Self::lock(&self.user_stats)?;
        guard.insert(user, stats.clone());
        Ok(stats)
    }

    async fn get_user_stats(&self, user: UserId) -> Result<Option<UserStats>, StorageError> {
        let guard = Self::lock(&self.user_stats)?;
        Ok(guard.get(&user).cloned())
    }
}

#[async_trait]
impl ConfigRepository for InMemoryRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = Self::lock(&self.config)?;
        Ok(guard.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = Self::lock(&self.config)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Aggregates entity repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub failed_questions: Arc<dyn FailedQuestionRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub certifications: Arc<dyn CertificationRepository>,
    pub question_stats: Arc<dyn QuestionStatRepository>,
    pub user_stats: Arc<dyn UserStatRepository>,
    pub config: Arc<dyn ConfigRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            progress: Arc::new(repo.clone()),
            failed_questions: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            certifications: Arc::new(repo.clone()),
            question_stats: Arc::new(repo.clone()),
            user_stats: Arc::new(repo.clone()),
            config: Arc::new(repo),
        }
    }
}
