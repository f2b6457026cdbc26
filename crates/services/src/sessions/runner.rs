use chrono::{DateTime, Utc};
use std::fmt;

use certi_core::model::{
    AnswerRecord, AnswerVerdict, Level, Question, SessionType, TestSession, UserId, compute_score,
    is_passing,
};

use super::progress::RunnerProgress;
use super::workflow::SessionCompletion;
use crate::error::SessionError;

/// Where the runner currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerPhase {
    /// Waiting for the user to answer the current question.
    AwaitingAnswer,
    /// A wrong answer's explanation must be acknowledged before advancing.
    ShowingExplanation,
    /// Every question has been answered.
    Completed,
}

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one test session.
///
/// Steps through the fetched questions one at a time. Verdicts come from the
/// remote validator, never from the client: the runner only records them.
/// Correct answers advance immediately; incorrect ones hold the session in
/// `ShowingExplanation` until the user acknowledges the rule text.
pub struct TestRunner {
    user: UserId,
    level: Level,
    session_number: u32,
    session_type: SessionType,
    questions_percentage: u8,
    questions: Vec<Question>,
    current: usize,
    answers: Vec<AnswerRecord>,
    correct_count: u32,
    pending_explanation: Option<AnswerVerdict>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    completion_started: bool,
    completion: Option<SessionCompletion>,
}

impl TestRunner {
    /// Create a runner over a fetched question set.
    ///
    /// `started_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions were provided.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        user: UserId,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        questions_percentage: u8,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(Self {
            user,
            level,
            session_number,
            session_type,
            questions_percentage,
            questions,
            current: 0,
            answers: Vec::new(),
            correct_count: 0,
            pending_explanation: None,
            started_at,
            completed_at: None,
            completion_started: false,
            completion: None,
        })
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn session_number(&self) -> u32 {
        self.session_number
    }

    #[must_use]
    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    #[must_use]
    pub fn questions_percentage(&self) -> u8 {
        self.questions_percentage
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Total number of questions in this session.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Number of questions that have already been answered.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Number of remaining unanswered questions.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.questions.len().saturating_sub(self.answers.len())
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    /// Verdict of the last wrong answer, until it is acknowledged.
    #[must_use]
    pub fn pending_explanation(&self) -> Option<&AnswerVerdict> {
        self.pending_explanation.as_ref()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.current < self.questions.len() {
            Some(&self.questions[self.current])
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> RunnerPhase {
        if self.is_complete() {
            RunnerPhase::Completed
        } else if self.pending_explanation.is_some() {
            RunnerPhase::ShowingExplanation
        } else {
            RunnerPhase::AwaitingAnswer
        }
    }

    /// Returns a summary of the current runner progress.
    #[must_use]
    pub fn progress(&self) -> RunnerProgress {
        RunnerProgress {
            total: self.total_questions(),
            answered: self.answered_count(),
            remaining: self.remaining(),
            is_complete: self.is_complete(),
        }
    }

    /// Session score so far, as a rounded percentage of answered questions.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn score(&self) -> u8 {
        compute_score(self.correct_count, self.questions.len() as u32)
    }

    /// True once complete and at or above the pass threshold.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.is_complete() && is_passing(self.score())
    }

    /// Record the validator's verdict for the current question.
    ///
    /// `answered_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is finished and
    /// `SessionError::PendingExplanation` while an explanation awaits
    /// acknowledgement.
    pub(crate) fn record_verdict(
        &mut self,
        user_answer: &str,
        verdict: AnswerVerdict,
        answered_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        if self.pending_explanation.is_some() {
            return Err(SessionError::PendingExplanation);
        }
        let question_id = match self.current_question() {
            Some(question) => question.id,
            None => return Err(SessionError::Completed),
        };

        self.answers.push(AnswerRecord::new(
            self.user,
            question_id,
            user_answer,
            verdict.is_correct,
            answered_at,
        ));

        if verdict.is_correct {
            self.correct_count += 1;
            self.advance(answered_at);
        } else {
            self.pending_explanation = Some(verdict);
        }

        Ok(())
    }

    /// Acknowledge the explanation of a wrong answer and advance.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NothingToAcknowledge` when no explanation is
    /// pending.
    pub fn acknowledge_explanation(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        if self.pending_explanation.take().is_none() {
            return Err(SessionError::NothingToAcknowledge);
        }
        self.advance(at);
        Ok(())
    }

    fn advance(&mut self, at: DateTime<Utc>) {
        self.current += 1;
        if self.current >= self.questions.len() {
            self.completed_at = Some(at);
        }
    }

    /// Build the persistable summary for this finished session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Incomplete` while questions remain.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn build_summary(&self) -> Result<TestSession, SessionError> {
        let ended_at = self.completed_at.ok_or(SessionError::Incomplete)?;
        Ok(TestSession::completed(
            self.user,
            self.level,
            self.session_number,
            self.session_type,
            self.correct_count,
            self.questions.len() as u32,
            self.started_at,
            ended_at,
        )?)
    }

    pub(crate) fn completion_started(&self) -> bool {
        self.completion_started
    }

    pub(crate) fn mark_completion_started(&mut self) {
        self.completion_started = true;
    }

    pub(crate) fn completion(&self) -> Option<&SessionCompletion> {
        self.completion.as_ref()
    }

    pub(crate) fn set_completion(&mut self, completion: SessionCompletion) {
        self.completion = Some(completion);
    }
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRunner")
            .field("user", &self.user)
            .field("level", &self.level)
            .field("session_number", &self.session_number)
            .field("session_type", &self.session_type)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("correct_count", &self.correct_count)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use certi_core::model::QuestionId;
    use certi_core::time::fixed_now;

    fn build_question(id: u64) -> Question {
        Question {
            id: QuestionId::new(id),
            content: format!("Question {id}"),
            kind: "qcm".into(),
            level: Level::new(1),
            rule: None,
            explanation: None,
            choices: vec!["a".into(), "b".into()],
        }
    }

    fn build_runner(count: u64) -> TestRunner {
        let questions = (1..=count).map(build_question).collect();
        TestRunner::new(
            UserId::random(),
            Level::new(1),
            1,
            SessionType::Regular,
            20,
            questions,
            fixed_now(),
        )
        .unwrap()
    }

    fn correct() -> AnswerVerdict {
        AnswerVerdict {
            is_correct: true,
            explanation: None,
            rule: None,
        }
    }

    fn incorrect() -> AnswerVerdict {
        AnswerVerdict {
            is_correct: false,
            explanation: Some("Accord du participe passé.".into()),
            rule: Some("participe passé".into()),
        }
    }

    #[test]
    fn empty_question_set_is_rejected() {
        let err = TestRunner::new(
            UserId::random(),
            Level::new(1),
            1,
            SessionType::Regular,
            20,
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Empty));
    }

    #[test]
    fn correct_answers_advance_to_completion() {
        let mut runner = build_runner(2);
        assert_eq!(runner.phase(), RunnerPhase::AwaitingAnswer);

        runner.record_verdict("a", correct(), fixed_now()).unwrap();
        assert_eq!(runner.phase(), RunnerPhase::AwaitingAnswer);
        assert!(!runner.is_complete());

        runner.record_verdict("b", correct(), fixed_now()).unwrap();
        assert_eq!(runner.phase(), RunnerPhase::Completed);
        assert_eq!(runner.score(), 100);
        assert!(runner.passed());
    }

    #[test]
    fn wrong_answer_requires_acknowledgement() {
        let mut runner = build_runner(2);

        runner.record_verdict("b", incorrect(), fixed_now()).unwrap();
        assert_eq!(runner.phase(), RunnerPhase::ShowingExplanation);
        assert!(runner.pending_explanation().is_some());

        // Cannot answer the next question while the explanation is up.
        let err = runner
            .record_verdict("a", correct(), fixed_now())
            .unwrap_err();
        assert!(matches!(err, SessionError::PendingExplanation));

        runner.acknowledge_explanation(fixed_now()).unwrap();
        assert_eq!(runner.phase(), RunnerPhase::AwaitingAnswer);

        let err = runner.acknowledge_explanation(fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::NothingToAcknowledge));
    }

    #[test]
    fn score_counts_only_correct_answers() {
        let mut runner = build_runner(4);

        runner.record_verdict("a", correct(), fixed_now()).unwrap();
        runner.record_verdict("b", incorrect(), fixed_now()).unwrap();
        runner.acknowledge_explanation(fixed_now()).unwrap();
        runner.record_verdict("a", correct(), fixed_now()).unwrap();
        runner.record_verdict("a", correct(), fixed_now()).unwrap();

        assert!(runner.is_complete());
        // 3 of 4 lands exactly on the pass threshold.
        assert_eq!(runner.score(), 75);
        assert!(runner.passed());
        assert_eq!(runner.answers().len(), 4);
    }

    #[test]
    fn answering_after_completion_fails() {
        let mut runner = build_runner(1);
        runner.record_verdict("a", correct(), fixed_now()).unwrap();
        let err = runner
            .record_verdict("a", correct(), fixed_now())
            .unwrap_err();
        assert!(matches!(err, SessionError::Completed));
    }

    #[test]
    fn summary_reflects_counts() {
        let mut runner = build_runner(2);
        runner.record_verdict("a", correct(), fixed_now()).unwrap();
        runner.record_verdict("b", incorrect(), fixed_now()).unwrap();
        runner.acknowledge_explanation(fixed_now()).unwrap();

        let summary = runner.build_summary().unwrap();
        assert_eq!(summary.total_questions(), 2);
        assert_eq!(summary.score(), 50);
        assert!(!summary.is_validated());
    }

    #[test]
    fn summary_requires_completion() {
        let runner = build_runner(2);
        assert!(matches!(
            runner.build_summary(),
            Err(SessionError::Incomplete)
        ));
    }
}
