use std::sync::Arc;

use certi_core::Clock;
use certi_core::model::{
    Certification, FailedQuestion, Level, LevelPlan, LevelProgress, QuestionId, UserId,
    is_remedial_number,
};
use storage::repository::{CertificationRepository, FailedQuestionRepository, ProgressRepository};

use crate::certification::CertificationService;
use crate::error::ProgressTrackerError;

/// What a progress update decided.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressOutcome {
    pub level_completed: bool,
    pub certification: Option<Certification>,
}

/// Tracks how far a user is through a level's sessions and decides when the
/// level is complete.
///
/// The progress row is created lazily per (user, level) and re-sized against
/// the configured percentage on every load. Updates are two sequential writes
/// (progress row, then the failed-questions batch) with no atomicity
/// guarantee; a crash between them can leave the two inconsistent.
#[derive(Clone)]
pub struct ProgressTracker {
    progress: Arc<dyn ProgressRepository>,
    failed: Arc<dyn FailedQuestionRepository>,
    certifications: CertificationService,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        failed: Arc<dyn FailedQuestionRepository>,
        certifications: Arc<dyn CertificationRepository>,
    ) -> Self {
        Self {
            progress,
            failed,
            certifications: CertificationService::new(clock, certifications),
        }
    }

    /// Load the progress row for a (user, level) pair, creating it lazily.
    ///
    /// The session count is recomputed from the configured percentage; when it
    /// differs from the stored total, the counters are clamped and the clamped
    /// row is persisted before being returned.
    ///
    /// # Errors
    ///
    /// Returns `ProgressTrackerError` on invalid configuration or storage
    /// failures.
    pub async fn load_or_create(
        &self,
        user: UserId,
        level: Level,
        questions_percentage: u8,
    ) -> Result<LevelProgress, ProgressTrackerError> {
        let plan = LevelPlan::new(level, questions_percentage)?;
        let total = plan.total_sessions();

        match self.progress.get_progress(user, level).await? {
            Some(mut progress) => {
                if progress.total_sessions() != total {
                    progress.resize(total)?;
                    self.progress.upsert_progress(&progress).await?;
                }
                Ok(progress)
            }
            None => {
                let progress = LevelProgress::start(user, level, total)?;
                self.progress.upsert_progress(&progress).await?;
                Ok(progress)
            }
        }
    }

    /// Fallible progress update for one attempted session.
    ///
    /// Regular sessions advance the counters; the level's last regular session
    /// completes the level only when no unremediated failed questions remain.
    /// A remedial session (sentinel number) completes the level
    /// unconditionally and remediates the failed questions. Certification is
    /// requested whenever the level completes.
    ///
    /// # Errors
    ///
    /// Returns `ProgressTrackerError` on storage failures or invalid state.
    pub async fn try_update_progress(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        is_completed: bool,
        score: u8,
        questions_percentage: u8,
    ) -> Result<ProgressOutcome, ProgressTrackerError> {
        if !is_completed {
            return Ok(ProgressOutcome::default());
        }

        let mut progress = self.load_or_create(user, level, questions_percentage).await?;

        if is_remedial_number(session_number) {
            progress.mark_completed();
            self.progress.upsert_progress(&progress).await?;
            self.failed.mark_remediated(user, level).await?;
            let certification = self.certifications.issue(user, level, score).await?;
            return Ok(ProgressOutcome {
                level_completed: true,
                certification: Some(certification),
            });
        }

        let is_final = progress.record_regular(session_number);
        if !is_final {
            self.progress.upsert_progress(&progress).await?;
            return Ok(ProgressOutcome::default());
        }

        let pending = self.failed.unremediated(user, level).await?;
        if pending.is_empty() {
            progress.mark_completed();
            self.progress.upsert_progress(&progress).await?;
            let certification = self.certifications.issue(user, level, score).await?;
            Ok(ProgressOutcome {
                level_completed: true,
                certification: Some(certification),
            })
        } else {
            // The level stays open until a remedial session clears these.
            self.progress.upsert_progress(&progress).await?;
            Ok(ProgressOutcome::default())
        }
    }

    /// Compatibility wrapper preserving the original failure semantics:
    /// errors are logged and swallowed, and the caller sees the same outcome
    /// as "not yet complete". Callers that need to distinguish failures use
    /// [`try_update_progress`](Self::try_update_progress).
    pub async fn update_progress(
        &self,
        user: UserId,
        level: Level,
        session_number: u32,
        is_completed: bool,
        score: u8,
        questions_percentage: u8,
    ) -> ProgressOutcome {
        match self
            .try_update_progress(user, level, session_number, is_completed, score, questions_percentage)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    %user,
                    %level,
                    session_number,
                    error = %err,
                    "progress update failed; reporting level as incomplete"
                );
                ProgressOutcome::default()
            }
        }
    }

    /// Record one failed question. Idempotent per (user, question, level); no
    /// side effects beyond the single row write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressTrackerError` on storage failures.
    pub async fn record_failed_question(
        &self,
        user: UserId,
        question: QuestionId,
        level: Level,
    ) -> Result<(), ProgressTrackerError> {
        self.failed
            .record_failed(&FailedQuestion::new(user, question, level))
            .await?;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
