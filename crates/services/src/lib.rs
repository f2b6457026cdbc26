#![forbid(unsafe_code)]

pub mod certification;
pub mod config;
pub mod error;
pub mod http;
pub mod progress;
pub mod remote;
pub mod sessions;

pub use certi_core::Clock;
pub use sessions as session;

pub use error::{CertificationError, ProgressTrackerError, RemoteError, SessionError};

pub use certification::CertificationService;
pub use config::TestConfigService;
pub use http::{ExamApiConfig, HttpExamApi};
pub use progress::{ProgressOutcome, ProgressTracker};
pub use remote::{AnswerValidator, CertifiedLevelSource, QuestionSource};

pub use sessions::{
    LevelOverview, ProgressViewService, RunnerPhase, RunnerProgress, SessionAnswerResult,
    SessionCompletion, SessionHistoryItem, SessionWorkflow, TestRunner,
};
