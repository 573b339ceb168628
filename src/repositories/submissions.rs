use time::PrimitiveDateTime;

use crate::db::models::QuizSubmission;

const COLUMNS: &str = "\
    id, quiz_id, student_id, score, total, percentage, passed, completed, \
    integrity_violation, answered_count, question_count, full_completion, \
    started_at, submitted_at, review_unlocked_at, created_at, updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<QuizSubmission>, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {COLUMNS} FROM quiz_submissions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_completed(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<Option<QuizSubmission>, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {COLUMNS} FROM quiz_submissions \
         WHERE quiz_id = $1 AND student_id = $2 AND completed"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_open(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<Option<QuizSubmission>, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {COLUMNS} FROM quiz_submissions \
         WHERE quiz_id = $1 AND student_id = $2 AND NOT completed"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

/// Row-locked variant used inside the finalize transaction so concurrent
/// submits for the same attempt serialize.
pub(crate) async fn find_open_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<Option<QuizSubmission>, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {COLUMNS} FROM quiz_submissions \
         WHERE quiz_id = $1 AND student_id = $2 AND NOT completed \
         FOR UPDATE"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<Vec<QuizSubmission>, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {COLUMNS} FROM quiz_submissions WHERE quiz_id = $1 \
         ORDER BY submitted_at DESC NULLS LAST, started_at DESC"
    ))
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_by_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
) -> Result<Vec<QuizSubmission>, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {COLUMNS} FROM quiz_submissions WHERE student_id = $1 \
         ORDER BY started_at DESC"
    ))
    .bind(student_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn create_open(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    quiz_id: &str,
    student_id: &str,
    question_count: i32,
    now: PrimitiveDateTime,
) -> Result<QuizSubmission, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "INSERT INTO quiz_submissions (
            id, quiz_id, student_id, question_count, started_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(quiz_id)
    .bind(student_id)
    .bind(question_count)
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) struct FinalizeSubmission {
    pub(crate) score: f64,
    pub(crate) total: f64,
    pub(crate) percentage: f64,
    pub(crate) passed: bool,
    pub(crate) integrity_violation: bool,
    pub(crate) answered_count: i32,
    pub(crate) question_count: i32,
    pub(crate) full_completion: bool,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) review_unlocked_at: PrimitiveDateTime,
}

pub(crate) async fn finalize(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: FinalizeSubmission,
) -> Result<QuizSubmission, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "UPDATE quiz_submissions
         SET score = $1,
             total = $2,
             percentage = $3,
             passed = $4,
             integrity_violation = $5,
             answered_count = $6,
             question_count = $7,
             full_completion = $8,
             submitted_at = $9,
             review_unlocked_at = $10,
             completed = TRUE,
             updated_at = $9
         WHERE id = $11
         RETURNING {COLUMNS}",
    ))
    .bind(params.score)
    .bind(params.total)
    .bind(params.percentage)
    .bind(params.passed)
    .bind(params.integrity_violation)
    .bind(params.answered_count)
    .bind(params.question_count)
    .bind(params.full_completion)
    .bind(params.submitted_at)
    .bind(params.review_unlocked_at)
    .bind(id)
    .fetch_one(executor)
    .await
}

/// Reverts a completed submission to the no-answers state for a retake.
pub(crate) async fn reset_for_retake(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quiz_submissions
         SET score = 0,
             total = 0,
             percentage = 0,
             passed = FALSE,
             completed = FALSE,
             integrity_violation = FALSE,
             answered_count = 0,
             full_completion = FALSE,
             submitted_at = NULL,
             review_unlocked_at = NULL,
             updated_at = $1
         WHERE id = $2",
    )
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(())
}
