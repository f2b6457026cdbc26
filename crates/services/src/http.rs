use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use certi_core::model::{AnswerVerdict, Level, Question, QuestionId, SessionType, UserId};

use crate::error::RemoteError;
use crate::remote::{AnswerValidator, CertifiedLevelSource, QuestionSource, decode_question_set};

#[derive(Clone, Debug)]
pub struct ExamApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ExamApiConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("CERTI_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("CERTI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        Some(Self { base_url, api_key })
    }
}

/// HTTP client for the exam backend's serverless functions.
///
/// No request timeout is configured; a hung call hangs the caller, and
/// dropping the future is the only cancellation.
#[derive(Clone, Debug)]
pub struct HttpExamApi {
    client: Client,
    config: ExamApiConfig,
}

impl HttpExamApi {
    /// Build a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidBaseUrl` if the base URL does not parse.
    pub fn new(config: ExamApiConfig) -> Result<Self, RemoteError> {
        if Url::parse(&config.base_url).is_err() {
            return Err(RemoteError::InvalidBaseUrl);
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<reqwest::Response, RemoteError> {
        let mut request = self.client.post(self.endpoint(path)).json(payload);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct SelectQuestionsRequest {
    level: u32,
    session_number: u32,
    session_type: &'static str,
    questions_percentage: u8,
}

#[derive(Debug, Serialize)]
struct ValidateAnswerRequest<'a> {
    question_id: u64,
    user_answer: &'a str,
}

#[derive(Debug, Serialize)]
struct MaxCertifiedLevelRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct MaxCertifiedLevelResponse {
    level: Option<u32>,
}

fn session_type_param(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Regular => "regular",
        SessionType::Remedial => "remedial",
    }
}

#[async_trait]
impl QuestionSource for HttpExamApi {
    async fn fetch_questions(
        &self,
        level: Level,
        session_number: u32,
        session_type: SessionType,
        questions_percentage: u8,
    ) -> Result<Vec<Question>, RemoteError> {
        let payload = SelectQuestionsRequest {
            level: level.value(),
            session_number,
            session_type: session_type_param(session_type),
            questions_percentage,
        };
        let response = self.post_json("functions/select-questions", &payload).await?;
        let body: serde_json::Value = response.json().await?;
        decode_question_set(body)
    }
}

#[async_trait]
impl AnswerValidator for HttpExamApi {
    async fn validate(
        &self,
        question: QuestionId,
        user_answer: &str,
    ) -> Result<AnswerVerdict, RemoteError> {
        let payload = ValidateAnswerRequest {
            question_id: question.value(),
            user_answer,
        };
        let response = self.post_json("functions/validate-answer", &payload).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CertifiedLevelSource for HttpExamApi {
    async fn max_certified_level(&self, user: UserId) -> Result<Option<Level>, RemoteError> {
        let payload = MaxCertifiedLevelRequest {
            user_id: user.to_string(),
        };
        let response = self.post_json("rpc/max-certified-level", &payload).await?;
        let body: MaxCertifiedLevelResponse = response.json().await?;
        Ok(body.level.map(Level::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_base_url() {
        let err = HttpExamApi::new(ExamApiConfig {
            base_url: "not a url".into(),
            api_key: None,
        })
        .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidBaseUrl));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let api = HttpExamApi::new(ExamApiConfig {
            base_url: "https://exam.example.test/".into(),
            api_key: None,
        })
        .unwrap();
        assert_eq!(
            api.endpoint("functions/validate-answer"),
            "https://exam.example.test/functions/validate-answer"
        );
    }
}
