use sqlx::PgPool;

use crate::db::models::Quiz;
use crate::db::types::DifficultyLevel;

const COLUMNS: &str =
    "id, title, code, created_by, difficulty, duration_minutes, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE code = $1"))
        .bind(code)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_code(pool: &PgPool, code: &str) -> Result<bool, sqlx::Error> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM quizzes WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn list_by_creator(
    pool: &PgPool,
    created_by: &str,
) -> Result<Vec<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {COLUMNS} FROM quizzes WHERE created_by = $1 ORDER BY created_at DESC"
    ))
    .bind(created_by)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateQuiz<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) code: &'a str,
    pub(crate) created_by: &'a str,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuiz<'_>,
) -> Result<Quiz, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (
            id, title, code, created_by, difficulty, duration_minutes, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.code)
    .bind(params.created_by)
    .bind(params.difficulty)
    .bind(params.duration_minutes)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}
