use std::sync::Arc;

use certi_core::model::{DEFAULT_QUESTIONS_PERCENTAGE, Level};
use storage::repository::{ConfigRepository, StorageError};

/// Global key holding the questions percentage applied to every level.
pub const GLOBAL_PERCENTAGE_KEY: &str = "questions_percentage_per_level";

/// Per-level override key for the questions percentage.
#[must_use]
pub fn level_percentage_key(level: Level) -> String {
    format!("test_questions_percentage_level_{level}")
}

fn parse_percentage(raw: &str) -> Option<u8> {
    let value = raw.trim().parse::<u8>().ok()?;
    (1..=100).contains(&value).then_some(value)
}

/// Read side of the test configuration stored in the generic key/value table.
#[derive(Clone)]
pub struct TestConfigService {
    config: Arc<dyn ConfigRepository>,
}

impl TestConfigService {
    #[must_use]
    pub fn new(config: Arc<dyn ConfigRepository>) -> Self {
        Self { config }
    }

    /// Questions percentage for a level.
    ///
    /// Lookup order: per-level override key, then the global key, then the
    /// hardcoded default. Malformed or out-of-range values fall back the same
    /// way missing values do; storage failures are logged and treated as
    /// missing.
    pub async fn questions_percentage(&self, level: Level) -> u8 {
        let keys = [level_percentage_key(level), GLOBAL_PERCENTAGE_KEY.to_string()];
        for key in &keys {
            match self.config.get_value(key).await {
                Ok(Some(raw)) => {
                    if let Some(value) = parse_percentage(&raw) {
                        return value;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(key, error = %err, "config lookup failed; falling back");
                }
            }
        }
        DEFAULT_QUESTIONS_PERCENTAGE
    }

    /// Persist a percentage, globally or as a per-level override.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    pub async fn set_questions_percentage(
        &self,
        level: Option<Level>,
        percentage: u8,
    ) -> Result<(), StorageError> {
        let key = level.map_or_else(|| GLOBAL_PERCENTAGE_KEY.to_string(), level_percentage_key);
        self.config.set_value(&key, &percentage.to_string()).await
    }
}
