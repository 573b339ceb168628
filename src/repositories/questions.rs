use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{QuizQuestion, TestCase};
use crate::db::types::QuestionType;

const COLUMNS: &str = "\
    id, quiz_id, prompt, qtype, marks, options, answer, test_cases, \
    allowed_languages, time_limit_seconds, memory_limit_mb, sample_input, \
    sample_output, starter_code, order_index, created_at";

pub(crate) async fn list_by_quiz(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<QuizQuestion>, sqlx::Error> {
    sqlx::query_as::<_, QuizQuestion>(&format!(
        "SELECT {COLUMNS} FROM quiz_questions WHERE quiz_id = $1 ORDER BY order_index, id"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_quiz(pool: &PgPool, quiz_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) prompt: &'a str,
    pub(crate) qtype: QuestionType,
    pub(crate) marks: i32,
    pub(crate) options: Vec<String>,
    pub(crate) answer: Option<&'a str>,
    pub(crate) test_cases: Vec<TestCase>,
    pub(crate) allowed_languages: Vec<String>,
    pub(crate) time_limit_seconds: Option<i32>,
    pub(crate) memory_limit_mb: Option<i32>,
    pub(crate) sample_input: Option<&'a str>,
    pub(crate) sample_output: Option<&'a str>,
    pub(crate) starter_code: serde_json::Value,
    pub(crate) order_index: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO quiz_questions (
            id, quiz_id, prompt, qtype, marks, options, answer, test_cases,
            allowed_languages, time_limit_seconds, memory_limit_mb, sample_input,
            sample_output, starter_code, order_index, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)",
    )
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.prompt)
    .bind(params.qtype)
    .bind(params.marks)
    .bind(Json(params.options))
    .bind(params.answer)
    .bind(Json(params.test_cases))
    .bind(Json(params.allowed_languages))
    .bind(params.time_limit_seconds)
    .bind(params.memory_limit_mb)
    .bind(params.sample_input)
    .bind(params.sample_output)
    .bind(Json(params.starter_code))
    .bind(params.order_index)
    .bind(params.created_at)
    .execute(executor)
    .await?;

    Ok(())
}
