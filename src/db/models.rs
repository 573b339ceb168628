use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{DifficultyLevel, QuestionType, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Quiz {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) code: String,
    pub(crate) created_by: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One graded test case: input fed to stdin, expected stdout, and whether the
/// pair is withheld from participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TestCase {
    pub(crate) input: String,
    pub(crate) expected_output: String,
    #[serde(default)]
    pub(crate) is_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizQuestion {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) prompt: String,
    pub(crate) qtype: QuestionType,
    pub(crate) marks: i32,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) answer: Option<String>,
    pub(crate) test_cases: Json<Vec<TestCase>>,
    pub(crate) allowed_languages: Json<Vec<String>>,
    pub(crate) time_limit_seconds: Option<i32>,
    pub(crate) memory_limit_mb: Option<i32>,
    pub(crate) sample_input: Option<String>,
    pub(crate) sample_output: Option<String>,
    pub(crate) starter_code: Json<serde_json::Value>,
    pub(crate) order_index: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizSubmission {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) score: f64,
    pub(crate) total: f64,
    pub(crate) percentage: f64,
    pub(crate) passed: bool,
    pub(crate) completed: bool,
    pub(crate) integrity_violation: bool,
    pub(crate) answered_count: i32,
    pub(crate) question_count: i32,
    pub(crate) full_completion: bool,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) review_unlocked_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizAnswer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) user_answer: String,
    pub(crate) is_correct: Option<bool>,
    pub(crate) ai_score: Option<f64>,
    pub(crate) scored_marks: f64,
    pub(crate) code_language: Option<String>,
    pub(crate) test_results: Option<Json<serde_json::Value>>,
    pub(crate) passed_test_cases: i32,
    pub(crate) total_test_cases: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl QuizQuestion {
    pub(crate) fn time_limit(&self) -> u64 {
        self.time_limit_seconds.map(|value| value.max(1) as u64).unwrap_or(2)
    }

    pub(crate) fn memory_limit(&self) -> u64 {
        self.memory_limit_mb.map(|value| value.max(1) as u64).unwrap_or(256)
    }
}
