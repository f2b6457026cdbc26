use std::sync::Arc;

use async_trait::async_trait;
use certi_core::model::{
    AnswerVerdict, Level, Question, QuestionId, SessionType, UserId,
};
use certi_core::time::fixed_clock;
use services::{
    AnswerValidator, ProgressTracker, ProgressViewService, QuestionSource, RemoteError,
    SessionError, SessionWorkflow, TestConfigService, TestRunner,
};
use storage::repository::{
    AnswerRepository, ConfigRepository, FailedQuestionRepository, InMemoryRepository,
    SessionRepository, UserStatRepository,
};

/// Stand-in for the remote selector/validator pair.
///
/// Regular sessions get `per_session` questions with ids derived from the
/// session number; the remedial session replays `remedial_ids`. The only
/// correct answer is "bon".
struct StubExam {
    per_session: u32,
    remedial_ids: Vec<u64>,
}

fn build_question(id: u64, level: Level) -> Question {
    Question {
        id: QuestionId::new(id),
        content: format!("Question {id}"),
        kind: "qcm".into(),
        level,
        rule: None,
        explanation: None,
        choices: vec!["bon".into(), "mauvais".into()],
    }
}

#[async_trait]
impl QuestionSource for StubExam {
    async fn fetch_questions(
        &self,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        _questions_percentage: u8,
    ) -> Result<Vec<Question>, RemoteError> {
        let ids: Vec<u64> = match session_type {
            SessionType::Regular => (1..=u64::from(self.per_session))
                .map(|i| u64::from(session_number) * 100 + i)
                .collect(),
            SessionType::Remedial => self.remedial_ids.clone(),
        };
        Ok(ids.into_iter().map(|id| build_question(id, level)).collect())
    }
}

#[async_trait]
impl AnswerValidator for StubExam {
    async fn validate(
        &self,
        _question: QuestionId,
        user_answer: &str,
    ) -> Result<AnswerVerdict, RemoteError> {
        let is_correct = user_answer == "bon";
        Ok(AnswerVerdict {
            is_correct,
            explanation: (!is_correct).then(|| "Ce n'est pas la bonne forme.".into()),
            rule: (!is_correct).then(|| "accord".into()),
        })
    }
}

fn build_workflow(repo: &InMemoryRepository, exam: Arc<StubExam>) -> SessionWorkflow {
    let clock = fixed_clock();
    let tracker = ProgressTracker::new(
        clock,
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let config = TestConfigService::new(Arc::new(repo.clone()));
    SessionWorkflow::new(
        clock,
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        tracker,
        config,
        exam.clone(),
        exam,
    )
}

fn build_view(repo: &InMemoryRepository) -> ProgressViewService {
    let clock = fixed_clock();
    let tracker = ProgressTracker::new(
        clock,
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    ProgressViewService::new(
        tracker,
        TestConfigService::new(Arc::new(repo.clone())),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
}

/// Answer every question, acknowledging explanations on wrong answers.
async fn answer_all(workflow: &SessionWorkflow, runner: &mut TestRunner, wrong: &[u64]) {
    while !runner.is_complete() {
        let question = runner.current_question().expect("question available");
        let answer = if wrong.contains(&question.id.value()) {
            "mauvais"
        } else {
            "bon"
        };
        let result = workflow.answer_current(runner, answer).await.unwrap();
        if result.awaiting_acknowledgement {
            workflow.acknowledge_explanation(runner).unwrap();
        }
    }
}

#[tokio::test]
async fn clean_run_completes_level_with_one_certification() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 4,
        remedial_ids: Vec::new(),
    });
    let workflow = build_workflow(&repo, exam);
    let view = build_view(&repo);
    let user = UserId::random();
    let level = Level::new(1);

    // Default 20% sizing: five regular sessions.
    for expected_number in 1..=5u32 {
        let mut runner = workflow
            .start(user, level, SessionType::Regular)
            .await
            .unwrap();
        assert_eq!(runner.session_number(), expected_number);

        answer_all(&workflow, &mut runner, &[]).await;
        let completion = workflow.complete(&mut runner).await.unwrap();

        assert_eq!(completion.session.score(), 100);
        assert!(completion.session.is_validated());
        assert_eq!(completion.outcome.level_completed, expected_number == 5);
    }

    let overview = view.level_overview(user, level).await.unwrap();
    assert!(overview.is_level_completed);
    assert_eq!(overview.completed_sessions, 5);
    assert_eq!(overview.pending_remediation, 0);

    let certifications = view.certifications(user).await.unwrap();
    assert_eq!(certifications.len(), 1);
    assert_eq!(certifications[0].score, 100);

    let history = view.session_history(user, level).await.unwrap();
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|item| item.is_validated));
}

#[tokio::test]
async fn failed_questions_block_completion_until_remediated() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 4,
        remedial_ids: vec![301, 302],
    });
    let workflow = build_workflow(&repo, exam);
    let view = build_view(&repo);
    let user = UserId::random();
    let level = Level::new(2);

    for number in 1..=5u32 {
        let mut runner = workflow
            .start(user, level, SessionType::Regular)
            .await
            .unwrap();
        // Two questions of session 3 go wrong.
        let wrong: &[u64] = if number == 3 { &[301, 302] } else { &[] };
        answer_all(&workflow, &mut runner, wrong).await;
        let completion = workflow.complete(&mut runner).await.unwrap();
        assert!(!completion.outcome.level_completed);
    }

    let overview = view.level_overview(user, level).await.unwrap();
    assert!(!overview.is_level_completed);
    assert_eq!(overview.completed_sessions, 5);
    assert_eq!(overview.pending_remediation, 2);
    assert!(overview.remedial_available);
    assert!(view.certifications(user).await.unwrap().is_empty());

    // The remedial session replays the failed questions and clears them.
    let mut runner = workflow
        .start(user, level, SessionType::Remedial)
        .await
        .unwrap();
    assert_eq!(runner.total_questions(), 2);
    answer_all(&workflow, &mut runner, &[]).await;
    let completion = workflow.complete(&mut runner).await.unwrap();

    assert!(completion.outcome.level_completed);
    assert!(completion.outcome.certification.is_some());
    assert!(repo.unremediated(user, level).await.unwrap().is_empty());

    let overview = view.level_overview(user, level).await.unwrap();
    assert!(overview.is_level_completed);
    assert_eq!(overview.pending_remediation, 0);
    assert!(!overview.remedial_available);
}

#[tokio::test]
async fn retrying_remedial_does_not_duplicate_certification() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 2,
        remedial_ids: vec![101],
    });
    let workflow = build_workflow(&repo, exam);
    let view = build_view(&repo);
    let user = UserId::random();
    let level = Level::new(1);

    // Fail one question in session 1, then finish the level.
    for number in 1..=5u32 {
        let mut runner = workflow
            .start(user, level, SessionType::Regular)
            .await
            .unwrap();
        let wrong: &[u64] = if number == 1 { &[101] } else { &[] };
        answer_all(&workflow, &mut runner, wrong).await;
        workflow.complete(&mut runner).await.unwrap();
    }

    let mut first = workflow
        .start(user, level, SessionType::Remedial)
        .await
        .unwrap();
    answer_all(&workflow, &mut first, &[]).await;
    let first_completion = workflow.complete(&mut first).await.unwrap();
    let first_certification = first_completion.outcome.certification.unwrap();

    // Taking the remedial session again re-runs the whole sequence but the
    // certification record stays unique.
    let mut second = workflow
        .start(user, level, SessionType::Remedial)
        .await
        .unwrap();
    answer_all(&workflow, &mut second, &[]).await;
    let second_completion = workflow.complete(&mut second).await.unwrap();

    assert_eq!(
        second_completion.outcome.certification.unwrap(),
        first_certification
    );
    assert_eq!(view.certifications(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reattempting_a_session_overwrites_its_rows() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 4,
        remedial_ids: Vec::new(),
    });
    let workflow = build_workflow(&repo, exam);
    let user = UserId::random();
    let level = Level::new(1);

    // Two runners for the same session number, as with two open tabs.
    let mut first = workflow
        .start(user, level, SessionType::Regular)
        .await
        .unwrap();
    let mut second = workflow
        .start(user, level, SessionType::Regular)
        .await
        .unwrap();
    assert_eq!(first.session_number(), second.session_number());

    answer_all(&workflow, &mut first, &[101, 102]).await;
    workflow.complete(&mut first).await.unwrap();

    answer_all(&workflow, &mut second, &[]).await;
    workflow.complete(&mut second).await.unwrap();

    // One summary row for the key, carrying the latest attempt.
    let sessions = repo.list_sessions(user, level).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].score(), 100);

    let answers = repo
        .list_answers(user, level, 1, SessionType::Regular)
        .await
        .unwrap();
    assert_eq!(answers.len(), 4);
    assert!(answers.iter().all(|a| a.is_correct));
}

#[tokio::test]
async fn completing_twice_reuses_the_stored_result() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 2,
        remedial_ids: Vec::new(),
    });
    let workflow = build_workflow(&repo, exam);
    let user = UserId::random();

    let mut runner = workflow
        .start(user, Level::new(1), SessionType::Regular)
        .await
        .unwrap();
    answer_all(&workflow, &mut runner, &[]).await;

    let first = workflow.complete(&mut runner).await.unwrap();
    let second = workflow.complete(&mut runner).await.unwrap();
    assert_eq!(first, second);

    // Completing before the last answer is refused.
    let mut early = workflow
        .start(user, Level::new(3), SessionType::Regular)
        .await
        .unwrap();
    let err = workflow.complete(&mut early).await.unwrap_err();
    assert!(matches!(err, SessionError::Incomplete));
}

#[tokio::test]
async fn empty_question_set_aborts_the_session() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 0,
        remedial_ids: Vec::new(),
    });
    let workflow = build_workflow(&repo, exam);

    let err = workflow
        .start(UserId::random(), Level::new(1), SessionType::Regular)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Empty));
}

#[tokio::test]
async fn resizing_percentage_clamps_progress() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 2,
        remedial_ids: Vec::new(),
    });
    let workflow = build_workflow(&repo, exam);
    let view = build_view(&repo);
    let user = UserId::random();
    let level = Level::new(1);

    // 10% → ten sessions; work through eight of them.
    repo.set_value("questions_percentage_per_level", "10")
        .await
        .unwrap();
    for _ in 1..=8u32 {
        let mut runner = workflow
            .start(user, level, SessionType::Regular)
            .await
            .unwrap();
        answer_all(&workflow, &mut runner, &[]).await;
        workflow.complete(&mut runner).await.unwrap();
    }

    let overview = view.level_overview(user, level).await.unwrap();
    assert_eq!(overview.total_sessions, 10);
    assert_eq!(overview.completed_sessions, 8);
    assert_eq!(overview.current_session_number, 9);

    // Admin bumps the percentage to 20; the next load clamps everything to
    // the new five-session total.
    repo.set_value("questions_percentage_per_level", "20")
        .await
        .unwrap();

    let overview = view.level_overview(user, level).await.unwrap();
    assert_eq!(overview.total_sessions, 5);
    assert_eq!(overview.completed_sessions, 5);
    assert_eq!(overview.current_session_number, 5);
    // The flag itself is only set by a completed session, not by the resize.
    assert!(!overview.is_level_completed);
}

#[tokio::test]
async fn completion_refreshes_user_statistics() {
    let repo = InMemoryRepository::new();
    let exam = Arc::new(StubExam {
        per_session: 4,
        remedial_ids: Vec::new(),
    });
    let workflow = build_workflow(&repo, exam);
    let user = UserId::random();

    let mut runner = workflow
        .start(user, Level::new(1), SessionType::Regular)
        .await
        .unwrap();
    answer_all(&workflow, &mut runner, &[101]).await;
    workflow.complete(&mut runner).await.unwrap();

    let stats = repo.get_user_stats(user).await.unwrap().unwrap();
    assert_eq!(stats.sessions_completed, 1);
    assert_eq!(stats.sessions_validated, 1);
    assert!((stats.average_score - 75.0).abs() < f64::EPSILON);
}
