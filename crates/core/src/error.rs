use thiserror::Error;

use crate::model::{LevelPlanError, ProgressError, TestSessionError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    LevelPlan(#[from] LevelPlanError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Session(#[from] TestSessionError),
}
