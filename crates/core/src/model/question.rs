use serde::Deserialize;

use crate::model::ids::{Level, QuestionId};

/// One question as delivered by the remote selector.
///
/// The client holds this only for the duration of a session; the correct
/// answer is never part of the payload. `rule` and `explanation` are usually
/// absent here and arrive through the validator verdict on wrong answers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub level: Level,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub choices: Vec<String>,
}

/// Remote validator output for one submitted answer.
///
/// `explanation`/`rule` are only populated for incorrect answers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerVerdict {
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub rule: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_deserializes_with_sparse_fields() {
        let json = r#"{"id": 7, "content": "Accordez le participe.", "level": 2}"#;
        let question: Question = serde_json::from_str(json).unwrap();
        assert_eq!(question.id, QuestionId::new(7));
        assert_eq!(question.level, Level::new(2));
        assert!(question.kind.is_empty());
        assert!(question.choices.is_empty());
        assert!(question.rule.is_none());
    }

    #[test]
    fn verdict_carries_rule_only_when_present() {
        let json = r#"{"is_correct": false, "explanation": "Accord avec l'auxiliaire avoir.", "rule": "participe passé"}"#;
        let verdict: AnswerVerdict = serde_json::from_str(json).unwrap();
        assert!(!verdict.is_correct);
        assert!(verdict.rule.is_some());

        let json = r#"{"is_correct": true}"#;
        let verdict: AnswerVerdict = serde_json::from_str(json).unwrap();
        assert!(verdict.is_correct);
        assert!(verdict.explanation.is_none());
    }
}
