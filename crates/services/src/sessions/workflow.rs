use std::sync::Arc;

use certi_core::Clock;
use certi_core::model::{
    Level, QuestionId, REMEDIAL_SESSION_NUMBER, SessionType, TestSession, UserId,
};
use storage::repository::{
    AnswerRepository, QuestionStatRepository, SessionRepository, UserStatRepository,
};

use super::runner::TestRunner;
use crate::config::TestConfigService;
use crate::error::SessionError;
use crate::progress::{ProgressOutcome, ProgressTracker};
use crate::remote::{AnswerValidator, QuestionSource};

/// Result of submitting one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAnswerResult {
    pub question: QuestionId,
    pub is_correct: bool,
    pub explanation: Option<String>,
    pub rule: Option<String>,
    pub awaiting_acknowledgement: bool,
    pub is_complete: bool,
}

/// Result of the completion sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCompletion {
    pub session: TestSession,
    pub outcome: ProgressOutcome,
}

/// Orchestrates session start, remote-validated answering, and completion.
#[derive(Clone)]
pub struct SessionWorkflow {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    answers: Arc<dyn AnswerRepository>,
    question_stats: Arc<dyn QuestionStatRepository>,
    user_stats: Arc<dyn UserStatRepository>,
    tracker: ProgressTracker,
    config: TestConfigService,
    source: Arc<dyn QuestionSource>,
    validator: Arc<dyn AnswerValidator>,
}

impl SessionWorkflow {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        answers: Arc<dyn AnswerRepository>,
        question_stats: Arc<dyn QuestionStatRepository>,
        user_stats: Arc<dyn UserStatRepository>,
        tracker: ProgressTracker,
        config: TestConfigService,
        source: Arc<dyn QuestionSource>,
        validator: Arc<dyn AnswerValidator>,
    ) -> Self {
        Self {
            clock,
            sessions,
            answers,
            question_stats,
            user_stats,
            tracker,
            config,
            source,
            validator,
        }
    }

    /// Start a session for the user's next regular session of a level, or for
    /// the level's remedial session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when the selector returns no questions,
    /// or other `SessionError`s for remote/storage failures.
    pub async fn start(
        &self,
        user: UserId,
        level: Level,
        session_type: SessionType,
    ) -> Result<TestRunner, SessionError> {
        let percentage = self.config.questions_percentage(level).await;
        let progress = self.tracker.load_or_create(user, level, percentage).await?;

        let session_number = match session_type {
            SessionType::Regular => progress.current_session_number(),
            SessionType::Remedial => REMEDIAL_SESSION_NUMBER,
        };

        let questions = self
            .source
            .fetch_questions(level, session_number, session_type, percentage)
            .await?;
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        TestRunner::new(
            user,
            level,
            session_number,
            session_type,
            percentage,
            questions,
            self.clock.now(),
        )
    }

    /// Validate the current question's answer remotely and record the verdict.
    ///
    /// Incorrect answers also record a failed-question row and leave the
    /// runner waiting for [`acknowledge_explanation`](Self::acknowledge_explanation).
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for remote, storage, or state failures.
    pub async fn answer_current(
        &self,
        runner: &mut TestRunner,
        user_answer: &str,
    ) -> Result<SessionAnswerResult, SessionError> {
        if runner.is_complete() {
            return Err(SessionError::Completed);
        }
        if runner.pending_explanation().is_some() {
            return Err(SessionError::PendingExplanation);
        }
        let question = runner.current_question().ok_or(SessionError::Completed)?;
        let question_id = question.id;

        let verdict = self.validator.validate(question_id, user_answer).await?;
        let is_correct = verdict.is_correct;
        let explanation = verdict.explanation.clone();
        let rule = verdict.rule.clone();

        runner.record_verdict(user_answer, verdict, self.clock.now())?;

        if !is_correct {
            self.tracker
                .record_failed_question(runner.user(), question_id, runner.level())
                .await?;
        }

        Ok(SessionAnswerResult {
            question: question_id,
            is_correct,
            explanation,
            rule,
            awaiting_acknowledgement: !is_correct,
            is_complete: runner.is_complete(),
        })
    }

    /// Acknowledge the explanation of a wrong answer and advance.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NothingToAcknowledge` when no explanation is
    /// pending.
    pub fn acknowledge_explanation(&self, runner: &mut TestRunner) -> Result<(), SessionError> {
        runner.acknowledge_explanation(self.clock.now())
    }

    /// Run the completion sequence for a finished session.
    ///
    /// In order: persist the summary, replace the answer rows, fold the
    /// per-question statistics, update level progress, refresh the user's
    /// aggregates. A failing step aborts the rest; there is no compensating
    /// rollback, and the caller retries the whole session. Calling this twice
    /// on the same runner returns the stored result instead of re-running the
    /// sequence (the in-memory guard; the upsert keys protect everything
    /// else).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Incomplete` while questions remain and
    /// propagates the first failing step otherwise.
    pub async fn complete(&self, runner: &mut TestRunner) -> Result<SessionCompletion, SessionError> {
        if let Some(done) = runner.completion() {
            return Ok(done.clone());
        }
        if !runner.is_complete() {
            return Err(SessionError::Incomplete);
        }
        if runner.completion_started() {
            // A previous attempt failed mid-sequence; the session must be
            // retried from the start rather than resumed.
            return Err(SessionError::Completed);
        }
        runner.mark_completion_started();

        let summary = runner.build_summary()?;

        self.sessions.upsert_session(&summary).await?;

        self.answers
            .replace_answers(
                runner.user(),
                runner.level(),
                runner.session_number(),
                runner.session_type(),
                runner.answers(),
            )
            .await?;

        for answer in runner.answers() {
            self.question_stats
                .record_attempt(answer.user, answer.question, answer.is_correct, answer.answered_at)
                .await?;
        }

        let outcome = self
            .tracker
            .try_update_progress(
                runner.user(),
                runner.level(),
                runner.session_number(),
                true,
                summary.score(),
                runner.questions_percentage(),
            )
            .await?;

        self.user_stats.refresh_user_stats(runner.user()).await?;

        let completion = SessionCompletion {
            session: summary,
            outcome,
        };
        runner.set_completion(completion.clone());
        Ok(completion)
    }
}
