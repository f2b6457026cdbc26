use thiserror::Error;

use crate::model::ids::{Level, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("a level needs at least one session")]
    ZeroTotalSessions,

    #[error("completed sessions ({completed}) exceed total sessions ({total})")]
    CompletedExceedsTotal { completed: u32, total: u32 },

    #[error("current session {current} is out of range 1..={total}")]
    CurrentOutOfRange { current: u32, total: u32 },
}

/// Per-user, per-level record of test-session progress.
///
/// `current_session_number` is the next regular session to attempt, always in
/// `1..=total_sessions`. `completed_sessions` counts finished regular sessions
/// and never exceeds `total_sessions`. The row is created lazily on first
/// access for a (user, level) pair and is never deleted in normal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelProgress {
    user: UserId,
    level: Level,
    current_session_number: u32,
    total_sessions: u32,
    completed_sessions: u32,
    is_level_completed: bool,
}

impl LevelProgress {
    /// Fresh progress for a user starting a level.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ZeroTotalSessions` if the level has no sessions.
    pub fn start(user: UserId, level: Level, total_sessions: u32) -> Result<Self, ProgressError> {
        if total_sessions == 0 {
            return Err(ProgressError::ZeroTotalSessions);
        }
        Ok(Self {
            user,
            level,
            current_session_number: 1,
            total_sessions,
            completed_sessions: 0,
            is_level_completed: false,
        })
    }

    /// Rehydrate progress from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the persisted counters violate the
    /// invariants (`completed <= total`, `1 <= current <= total`).
    pub fn from_persisted(
        user: UserId,
        level: Level,
        current_session_number: u32,
        total_sessions: u32,
        completed_sessions: u32,
        is_level_completed: bool,
    ) -> Result<Self, ProgressError> {
        if total_sessions == 0 {
            return Err(ProgressError::ZeroTotalSessions);
        }
        if completed_sessions > total_sessions {
            return Err(ProgressError::CompletedExceedsTotal {
                completed: completed_sessions,
                total: total_sessions,
            });
        }
        if current_session_number == 0 || current_session_number > total_sessions {
            return Err(ProgressError::CurrentOutOfRange {
                current: current_session_number,
                total: total_sessions,
            });
        }

        Ok(Self {
            user,
            level,
            current_session_number,
            total_sessions,
            completed_sessions,
            is_level_completed,
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
    pub fn current_session_number(&self) -> u32 {
        self.current_session_number
    }

    #[must_use]
    pub fn total_sessions(&self) -> u32 {
        self.total_sessions
    }

    #[must_use]
    pub fn completed_sessions(&self) -> u32 {
        self.completed_sessions
    }

    #[must_use]
    pub fn is_level_completed(&self) -> bool {
        self.is_level_completed
    }

    /// True once every regular session has been completed.
    #[must_use]
    pub fn all_regular_sessions_done(&self) -> bool {
        self.completed_sessions >= self.total_sessions
    }

    /// Re-size the level after a configuration change.
    ///
    /// Counters are clamped into the new bounds. Shrinking below the user's
    /// position makes in-flight progress complete early; there is no audit
    /// trail for this, so callers should treat re-sizing as a rare admin
    /// action.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ZeroTotalSessions` if `new_total` is zero.
    pub fn resize(&mut self, new_total: u32) -> Result<(), ProgressError> {
        if new_total == 0 {
            return Err(ProgressError::ZeroTotalSessions);
        }
        self.total_sessions = new_total;
        self.completed_sessions = self.completed_sessions.min(new_total);
        self.current_session_number = self.current_session_number.clamp(1, new_total);
        Ok(())
    }

    /// Record a completed regular session.
    ///
    /// Non-final sessions advance `current_session_number`; the final session
    /// caps `completed_sessions` at the total. Returns true when the recorded
    /// session was the level's last regular one.
    pub fn record_regular(&mut self, session_number: u32) -> bool {
        if session_number >= self.total_sessions {
            self.completed_sessions = self.total_sessions;
            self.current_session_number = self.total_sessions;
            true
        } else {
            self.completed_sessions = session_number;
            self.current_session_number = session_number + 1;
            false
        }
    }

    /// Mark the level as completed.
    pub fn mark_completed(&mut self) {
        self.is_level_completed = true;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(total: u32) -> LevelProgress {
        LevelProgress::start(UserId::random(), Level::new(1), total).unwrap()
    }

    #[test]
    fn start_points_at_first_session() {
        let progress = fresh(5);
        assert_eq!(progress.current_session_number(), 1);
        assert_eq!(progress.completed_sessions(), 0);
        assert!(!progress.is_level_completed());
    }

    #[test]
    fn from_persisted_rejects_bad_counters() {
        let user = UserId::random();
        let level = Level::new(2);

        let err = LevelProgress::from_persisted(user, level, 3, 5, 6, false).unwrap_err();
        assert!(matches!(
            err,
            ProgressError::CompletedExceedsTotal { completed: 6, total: 5 }
        ));

        let err = LevelProgress::from_persisted(user, level, 0, 5, 2, false).unwrap_err();
        assert!(matches!(
            err,
            ProgressError::CurrentOutOfRange { current: 0, total: 5 }
        ));

        let err = LevelProgress::from_persisted(user, level, 6, 5, 2, false).unwrap_err();
        assert!(matches!(
            err,
            ProgressError::CurrentOutOfRange { current: 6, total: 5 }
        ));
    }

    #[test]
    fn regular_sessions_advance_monotonically() {
        let mut progress = fresh(5);
        let mut last_current = 0;
        for n in 1..=4u32 {
            let finished = progress.record_regular(n);
            assert!(!finished);
            assert_eq!(progress.completed_sessions(), n);
            assert_eq!(progress.current_session_number(), n + 1);
            assert!(progress.current_session_number() > last_current);
            last_current = progress.current_session_number();
        }
        assert!(progress.record_regular(5));
        assert_eq!(progress.completed_sessions(), 5);
        assert!(progress.all_regular_sessions_done());
    }

    #[test]
    fn resize_clamps_counters() {
        let mut progress =
            LevelProgress::from_persisted(UserId::random(), Level::new(1), 8, 10, 8, false)
                .unwrap();

        progress.resize(5).unwrap();

        assert_eq!(progress.total_sessions(), 5);
        assert_eq!(progress.completed_sessions(), 5);
        assert_eq!(progress.current_session_number(), 5);
    }

    #[test]
    fn resize_keeps_smaller_counters() {
        let mut progress =
            LevelProgress::from_persisted(UserId::random(), Level::new(1), 2, 5, 1, false)
                .unwrap();

        progress.resize(10).unwrap();

        assert_eq!(progress.total_sessions(), 10);
        assert_eq!(progress.completed_sessions(), 1);
        assert_eq!(progress.current_session_number(), 2);
    }

    #[test]
    fn resize_rejects_zero() {
        let mut progress = fresh(5);
        assert!(matches!(
            progress.resize(0),
            Err(ProgressError::ZeroTotalSessions)
        ));
    }
}
