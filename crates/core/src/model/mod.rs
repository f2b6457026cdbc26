mod answer;
mod certification;
mod ids;
mod level;
mod progress;
mod question;
mod session;

pub use ids::{Level, ParseIdError, QuestionId, UserId};

pub use answer::{AnswerRecord, FailedQuestion};
pub use certification::Certification;
pub use level::{
    DEFAULT_QUESTIONS_PERCENTAGE, LevelPlan, LevelPlanError, REMEDIAL_SESSION_NUMBER,
    is_remedial_number,
};
pub use progress::{LevelProgress, ProgressError};
pub use question::{AnswerVerdict, Question};
pub use session::{
    PASS_THRESHOLD, SessionStatus, SessionType, TestSession, TestSessionError, compute_score,
    is_passing,
};
