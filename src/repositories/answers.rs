use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::QuizAnswer;

const COLUMNS: &str = "\
    id, submission_id, question_id, user_answer, is_correct, ai_score, \
    scored_marks, code_language, test_results, passed_test_cases, \
    total_test_cases, created_at, updated_at";

pub(crate) async fn list_by_submission(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
) -> Result<Vec<QuizAnswer>, sqlx::Error> {
    sqlx::query_as::<_, QuizAnswer>(&format!(
        "SELECT {COLUMNS} FROM quiz_answers WHERE submission_id = $1"
    ))
    .bind(submission_id)
    .fetch_all(executor)
    .await
}

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) user_answer: &'a str,
    pub(crate) is_correct: Option<bool>,
    pub(crate) ai_score: Option<f64>,
    pub(crate) scored_marks: f64,
    pub(crate) code_language: Option<&'a str>,
    pub(crate) test_results: Option<serde_json::Value>,
    pub(crate) passed_test_cases: i32,
    pub(crate) total_test_cases: i32,
    pub(crate) now: PrimitiveDateTime,
}

/// Keyed by (submission, question); idempotent under retry.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO quiz_answers (
            id, submission_id, question_id, user_answer, is_correct, ai_score,
            scored_marks, code_language, test_results, passed_test_cases,
            total_test_cases, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$12)
        ON CONFLICT (submission_id, question_id) DO UPDATE
        SET user_answer = EXCLUDED.user_answer,
            is_correct = EXCLUDED.is_correct,
            ai_score = EXCLUDED.ai_score,
            scored_marks = EXCLUDED.scored_marks,
            code_language = EXCLUDED.code_language,
            test_results = EXCLUDED.test_results,
            passed_test_cases = EXCLUDED.passed_test_cases,
            total_test_cases = EXCLUDED.total_test_cases,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(params.id)
    .bind(params.submission_id)
    .bind(params.question_id)
    .bind(params.user_answer)
    .bind(params.is_correct)
    .bind(params.ai_score)
    .bind(params.scored_marks)
    .bind(params.code_language)
    .bind(params.test_results.map(Json))
    .bind(params.passed_test_cases)
    .bind(params.total_test_cases)
    .bind(params.now)
    .execute(executor)
    .await?;

    Ok(())
}

pub(crate) async fn delete_by_submission(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM quiz_answers WHERE submission_id = $1")
        .bind(submission_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
