use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Quiz, QuizQuestion, TestCase};
use crate::db::types::{DifficultyLevel, QuestionType};

pub(crate) const DEFAULT_LANGUAGES: &[&str] = &["python", "java", "cpp", "c"];

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) duration_minutes: Option<i32>,
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct QuestionPayload {
    #[validate(length(min = 1))]
    pub(crate) prompt: String,
    pub(crate) qtype: QuestionType,
    #[validate(range(min = 1))]
    pub(crate) marks: i32,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[serde(default)]
    pub(crate) answer: Option<String>,
    #[serde(default)]
    pub(crate) test_cases: Vec<TestCase>,
    #[serde(default)]
    pub(crate) allowed_languages: Vec<String>,
    #[serde(default)]
    pub(crate) time_limit_seconds: Option<i32>,
    #[serde(default)]
    pub(crate) memory_limit_mb: Option<i32>,
    #[serde(default)]
    pub(crate) sample_input: Option<String>,
    #[serde(default)]
    pub(crate) sample_output: Option<String>,
    #[serde(default)]
    pub(crate) starter_code: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) code: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) question_count: i64,
    pub(crate) created_at: String,
}

impl QuizResponse {
    pub(crate) fn from_quiz(quiz: &Quiz, question_count: i64) -> Self {
        Self {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            code: quiz.code.clone(),
            difficulty: quiz.difficulty,
            duration_minutes: quiz.duration_minutes,
            question_count,
            created_at: format_primitive(quiz.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DraftStagedResponse {
    pub(crate) draft_token: String,
    pub(crate) expires_in_seconds: u64,
}

/// A test case as shown to participants before grading: only non-hidden
/// pairs are ever serialized.
#[derive(Debug, Serialize)]
pub(crate) struct VisibleTestCase {
    pub(crate) input: String,
    pub(crate) expected_output: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) id: String,
    pub(crate) prompt: String,
    pub(crate) qtype: QuestionType,
    pub(crate) marks: i32,
    pub(crate) options: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) visible_test_cases: Vec<VisibleTestCase>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) allowed_languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) time_limit_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) memory_limit_mb: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sample_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sample_output: Option<String>,
    pub(crate) starter_code: serde_json::Value,
}

impl QuestionView {
    pub(crate) fn from_question(question: &QuizQuestion) -> Self {
        let visible_test_cases = question
            .test_cases
            .0
            .iter()
            .filter(|case| !case.is_hidden)
            .map(|case| VisibleTestCase {
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
            })
            .collect();

        let allowed_languages = if question.allowed_languages.0.is_empty()
            && question.qtype == QuestionType::Coding
        {
            DEFAULT_LANGUAGES.iter().map(|language| language.to_string()).collect()
        } else {
            question.allowed_languages.0.clone()
        };

        Self {
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            qtype: question.qtype,
            marks: question.marks,
            options: question.options.0.clone(),
            visible_test_cases,
            allowed_languages,
            time_limit_seconds: question.time_limit_seconds,
            memory_limit_mb: question.memory_limit_mb,
            sample_input: question.sample_input.clone(),
            sample_output: question.sample_output.clone(),
            starter_code: question.starter_code.0.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TakeQuizResponse {
    pub(crate) quiz: QuizResponse,
    pub(crate) submission_id: String,
    pub(crate) started_at: String,
    pub(crate) questions: Vec<QuestionView>,
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;

    use super::*;
    use crate::core::time::primitive_now_utc;

    #[test]
    fn question_view_drops_hidden_cases_and_answer() {
        let question = QuizQuestion {
            id: "q-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            prompt: "Sum two numbers".to_string(),
            qtype: QuestionType::Coding,
            marks: 5,
            options: Json(Vec::new()),
            answer: Some("secret".to_string()),
            test_cases: Json(vec![
                TestCase {
                    input: "1 2".to_string(),
                    expected_output: "3".to_string(),
                    is_hidden: false,
                },
                TestCase {
                    input: "10 20".to_string(),
                    expected_output: "30".to_string(),
                    is_hidden: true,
                },
            ]),
            allowed_languages: Json(Vec::new()),
            time_limit_seconds: Some(2),
            memory_limit_mb: Some(256),
            sample_input: Some("1 2".to_string()),
            sample_output: Some("3".to_string()),
            starter_code: Json(serde_json::json!({})),
            order_index: 0,
            created_at: primitive_now_utc(),
        };

        let view = QuestionView::from_question(&question);

        assert_eq!(view.visible_test_cases.len(), 1);
        assert_eq!(view.visible_test_cases[0].input, "1 2");
        assert_eq!(view.allowed_languages, vec!["python", "java", "cpp", "c"]);

        let serialized = serde_json::to_string(&view).expect("serialize view");
        assert!(!serialized.contains("secret"));
        assert!(!serialized.contains("10 20"));
    }
}
