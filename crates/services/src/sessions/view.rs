use chrono::{DateTime, Utc};
use std::sync::Arc;

use certi_core::model::{Certification, Level, SessionType, TestSession, UserId};
use storage::repository::{CertificationRepository, FailedQuestionRepository, SessionRepository};

use crate::config::TestConfigService;
use crate::error::SessionError;
use crate::progress::ProgressTracker;

/// Presentation-agnostic overview of a user's standing on one level.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no localization assumptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelOverview {
    pub level: Level,
    pub current_session_number: u32,
    pub total_sessions: u32,
    pub completed_sessions: u32,
    pub is_level_completed: bool,
    pub pending_remediation: usize,
    /// All regular sessions are done but failed questions block completion.
    pub remedial_available: bool,
}

/// Presentation-agnostic list item for a past session attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistoryItem {
    pub session_number: u32,
    pub session_type: SessionType,
    pub score: u8,
    pub is_validated: bool,
    pub ended_at: DateTime<Utc>,
}

impl SessionHistoryItem {
    #[must_use]
    pub fn from_session(session: &TestSession) -> Self {
        Self {
            session_number: session.session_number(),
            session_type: session.session_type(),
            score: session.score(),
            is_validated: session.is_validated(),
            ended_at: session.ended_at(),
        }
    }
}

/// Read-side facade over progress, history, and certifications.
///
/// Hides repositories and sizing configuration from callers; the admin and
/// student screens both render from these items.
#[derive(Clone)]
pub struct ProgressViewService {
    tracker: ProgressTracker,
    config: TestConfigService,
    failed: Arc<dyn FailedQuestionRepository>,
    sessions: Arc<dyn SessionRepository>,
    certifications: Arc<dyn CertificationRepository>,
}

impl ProgressViewService {
    #[must_use]
    pub fn new(
        tracker: ProgressTracker,
        config: TestConfigService,
        failed: Arc<dyn FailedQuestionRepository>,
        sessions: Arc<dyn SessionRepository>,
        certifications: Arc<dyn CertificationRepository>,
    ) -> Self {
        Self {
            tracker,
            config,
            failed,
            sessions,
            certifications,
        }
    }

    /// Current standing on a level, creating the progress row if needed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` on storage failures.
    pub async fn level_overview(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<LevelOverview, SessionError> {
        let percentage = self.config.questions_percentage(level).await;
        let progress = self.tracker.load_or_create(user, level, percentage).await?;
        let pending = self.failed.unremediated(user, level).await?;

        let remedial_available = progress.all_regular_sessions_done()
            && !progress.is_level_completed()
            && !pending.is_empty();

        Ok(LevelOverview {
            level,
            current_session_number: progress.current_session_number(),
            total_sessions: progress.total_sessions(),
            completed_sessions: progress.completed_sessions(),
            is_level_completed: progress.is_level_completed(),
            pending_remediation: pending.len(),
            remedial_available,
        })
    }

    /// Past attempts for a level, ordered by session number.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` on storage failures.
    pub async fn session_history(
        &self,
        user: UserId,
        level: Level,
    ) -> Result<Vec<SessionHistoryItem>, SessionError> {
        let sessions = self.sessions.list_sessions(user, level).await?;
        Ok(sessions.iter().map(SessionHistoryItem::from_session).collect())
    }

    /// All certifications held by the user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` on storage failures.
    pub async fn certifications(&self, user: UserId) -> Result<Vec<Certification>, SessionError> {
        Ok(self.certifications.list_certifications(user).await?)
    }
}
