use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::QuizSubmission;
use crate::db::types::QuestionType;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) answer: String,
    #[serde(default)]
    pub(crate) language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitQuizRequest {
    #[serde(default)]
    pub(crate) answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub(crate) fullscreen_exit: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AutoSubmitRequest {
    #[serde(default)]
    pub(crate) answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) score: f64,
    pub(crate) total: f64,
    pub(crate) percentage: f64,
    pub(crate) passed: bool,
    pub(crate) completed: bool,
    pub(crate) integrity_violation: bool,
    pub(crate) answered_count: i32,
    pub(crate) question_count: i32,
    pub(crate) full_completion: bool,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) review_unlocked_at: Option<String>,
}

impl From<&QuizSubmission> for SubmissionResponse {
    fn from(submission: &QuizSubmission) -> Self {
        Self {
            id: submission.id.clone(),
            quiz_id: submission.quiz_id.clone(),
            score: submission.score,
            total: submission.total,
            percentage: submission.percentage,
            passed: submission.passed,
            completed: submission.completed,
            integrity_violation: submission.integrity_violation,
            answered_count: submission.answered_count,
            question_count: submission.question_count,
            full_completion: submission.full_completion,
            started_at: format_primitive(submission.started_at),
            submitted_at: submission.submitted_at.map(format_primitive),
            review_unlocked_at: submission.review_unlocked_at.map(format_primitive),
        }
    }
}

/// Per-question entry of the review page. Fields are populated per question
/// type, mirroring what the participant is allowed to see.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionReview {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) qtype: QuestionType,
    pub(crate) marks: i32,
    pub(crate) user_answer: String,
    pub(crate) scored_marks: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sample_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ai_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) passed_test_cases: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) total_test_cases: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) test_results: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResultResponse {
    pub(crate) quiz_title: String,
    pub(crate) submission: SubmissionResponse,
    pub(crate) results: Vec<QuestionReview>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResultsRow {
    pub(crate) submission: SubmissionResponse,
    pub(crate) student_id: String,
    pub(crate) student_username: String,
}
