use certi_core::model::{
    AnswerRecord, Certification, FailedQuestion, Level, LevelProgress, QuestionId, SessionType,
    TestSession, UserId,
};
use certi_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{
    AnswerRepository, CertificationRepository, ConfigRepository, FailedQuestionRepository,
    ProgressRepository, QuestionStatRepository, SessionRepository, StorageError,
    UserStatRepository,
};
use storage::sqlite::SqliteRepository;

fn build_session(user: UserId, number: u32, correct: u32, total: u32) -> TestSession {
    let started = fixed_now();
    TestSession::completed(
        user,
        Level::new(1),
        number,
        SessionType::Regular,
        correct,
        total,
        started,
        started + Duration::minutes(12),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_persists_progress() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = UserId::random();
    let level = Level::new(2);

    assert!(repo.get_progress(user, level).await.unwrap().is_none());

    let mut progress = LevelProgress::start(user, level, 5).unwrap();
    progress.record_regular(1);
    repo.upsert_progress(&progress).await.unwrap();

    let fetched = repo.get_progress(user, level).await.unwrap().unwrap();
    assert_eq!(fetched.current_session_number(), 2);
    assert_eq!(fetched.completed_sessions(), 1);
    assert!(!fetched.is_level_completed());

    progress.record_regular(5);
    progress.mark_completed();
    repo.upsert_progress(&progress).await.unwrap();

    let fetched = repo.get_progress(user, level).await.unwrap().unwrap();
    assert!(fetched.is_level_completed());
    assert_eq!(fetched.completed_sessions(), 5);
}

#[tokio::test]
async fn sqlite_session_upsert_is_idempotent_per_key() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_sessions?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = UserId::random();

    // First attempt fails, retry passes. Same key, one row, latest score.
    repo.upsert_session(&build_session(user, 3, 2, 5)).await.unwrap();
    repo.upsert_session(&build_session(user, 3, 5, 5)).await.unwrap();

    let rows = repo.list_sessions(user, Level::new(1)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score(), 100);
    assert!(rows[0].is_validated());

    let fetched = repo
        .get_session(user, Level::new(1), 3, SessionType::Regular)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.session_number(), 3);
}

#[tokio::test]
async fn sqlite_answers_are_replaced_wholesale() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_answers?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = UserId::random();
    let level = Level::new(1);
    let now = fixed_now();

    let first = vec![
        AnswerRecord::new(user, QuestionId::new(1), "le", false, now),
        AnswerRecord::new(user, QuestionId::new(2), "la", true, now),
    ];
    repo.replace_answers(user, level, 1, SessionType::Regular, &first)
        .await
        .unwrap();

    let second = vec![
        AnswerRecord::new(user, QuestionId::new(1), "la", true, now),
        AnswerRecord::new(user, QuestionId::new(2), "les", true, now),
        AnswerRecord::new(user, QuestionId::new(3), "un", true, now),
    ];
    repo.replace_answers(user, level, 1, SessionType::Regular, &second)
        .await
        .unwrap();

    let rows = repo
        .list_answers(user, level, 1, SessionType::Regular)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|a| a.is_correct));

    // Other keys are untouched.
    let other = repo
        .list_answers(user, level, 2, SessionType::Regular)
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn sqlite_failed_questions_remediate_in_batch() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_failed?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = UserId::random();
    let level = Level::new(3);

    for id in [10, 11] {
        repo.record_failed(&FailedQuestion::new(user, QuestionId::new(id), level))
            .await
            .unwrap();
    }
    // Re-recording the same failure must not duplicate it.
    repo.record_failed(&FailedQuestion::new(user, QuestionId::new(10), level))
        .await
        .unwrap();

    let pending = repo.unremediated(user, level).await.unwrap();
    assert_eq!(pending.len(), 2);

    let touched = repo.mark_remediated(user, level).await.unwrap();
    assert_eq!(touched, 2);
    assert!(repo.unremediated(user, level).await.unwrap().is_empty());

    // A second pass has nothing left to touch.
    assert_eq!(repo.mark_remediated(user, level).await.unwrap(), 0);
}

#[tokio::test]
async fn sqlite_certifications_enforce_uniqueness() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_certs?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = UserId::random();
    let cert = Certification::new(user, Level::new(1), 85, fixed_now());

    repo.insert_certification(&cert).await.unwrap();
    let err = repo.insert_certification(&cert).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let fetched = repo
        .get_certification(user, Level::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.score, 85);
    assert_eq!(repo.list_certifications(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_stats_accumulate_and_refresh() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_stats?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = UserId::random();
    let question = QuestionId::new(42);
    let now = fixed_now();

    repo.record_attempt(user, question, false, now).await.unwrap();
    repo.record_attempt(user, question, true, now + Duration::minutes(1))
        .await
        .unwrap();

    let stat = repo.get_stat(user, question).await.unwrap().unwrap();
    assert_eq!(stat.attempts, 2);
    assert_eq!(stat.correct, 1);

    repo.upsert_session(&build_session(user, 1, 4, 5)).await.unwrap();
    repo.upsert_session(&build_session(user, 2, 2, 5)).await.unwrap();

    let stats = repo.refresh_user_stats(user).await.unwrap();
    assert_eq!(stats.sessions_completed, 2);
    assert_eq!(stats.sessions_validated, 1);
    assert!((stats.average_score - 60.0).abs() < 0.001);

    let persisted = repo.get_user_stats(user).await.unwrap().unwrap();
    assert_eq!(persisted.sessions_completed, 2);
}

#[tokio::test]
async fn sqlite_config_roundtrips() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_config?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(repo.get_value("questions_percentage_per_level").await.unwrap().is_none());

    repo.set_value("questions_percentage_per_level", "25").await.unwrap();
    repo.set_value("questions_percentage_per_level", "10").await.unwrap();

    let value = repo
        .get_value("questions_percentage_per_level")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, "10");
}
