use std::sync::Arc;

use certi_core::Clock;
use certi_core::model::{Certification, Level, UserId};
use storage::repository::{CertificationRepository, StorageError};

use crate::error::CertificationError;

/// Issues one certification per (user, level) qualifying event.
///
/// The repository carries a uniqueness constraint on the pair, so a retried
/// remedial session or a concurrent issuer cannot produce duplicate records:
/// issuing against an existing pair returns the original record.
#[derive(Clone)]
pub struct CertificationService {
    clock: Clock,
    certifications: Arc<dyn CertificationRepository>,
}

impl CertificationService {
    #[must_use]
    pub fn new(clock: Clock, certifications: Arc<dyn CertificationRepository>) -> Self {
        Self {
            clock,
            certifications,
        }
    }

    /// Issue a certification, or return the existing one for the pair.
    ///
    /// # Errors
    ///
    /// Returns `CertificationError` on storage failures.
    pub async fn issue(
        &self,
        user: UserId,
        level: Level,
        score: u8,
    ) -> Result<Certification, CertificationError> {
        if let Some(existing) = self.certifications.get_certification(user, level).await? {
            return Ok(existing);
        }

        let certification = Certification::new(user, level, score, self.clock.now());
        match self.certifications.insert_certification(&certification).await {
            Ok(()) => Ok(certification),
            // Lost a race with another issuer; the row that won is the record.
            Err(StorageError::Conflict) => self
                .certifications
                .get_certification(user, level)
                .await?
                .ok_or(CertificationError::Storage(StorageError::NotFound)),
            Err(err) => Err(err.into()),
        }
    }

    /// All certifications held by a user, ordered by level.
    ///
    /// # Errors
    ///
    /// Returns `CertificationError` on storage failures.
    pub async fn list(&self, user: UserId) -> Result<Vec<Certification>, CertificationError> {
        Ok(self.certifications.list_certifications(user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certi_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn issue_is_idempotent_per_user_level() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = CertificationService::new(fixed_clock(), repo);
        let user = UserId::random();

        let first = service.issue(user, Level::new(1), 80).await.unwrap();
        let second = service.issue(user, Level::new(1), 95).await.unwrap();

        // The second issue returns the original record, score included.
        assert_eq!(second, first);
        assert_eq!(service.list(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn different_levels_certify_independently() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = CertificationService::new(fixed_clock(), repo);
        let user = UserId::random();

        service.issue(user, Level::new(1), 80).await.unwrap();
        service.issue(user, Level::new(2), 90).await.unwrap();

        let certifications = service.list(user).await.unwrap();
        assert_eq!(certifications.len(), 2);
        assert_eq!(certifications[0].level, Level::new(1));
        assert_eq!(certifications[1].level, Level::new(2));
    }
}
