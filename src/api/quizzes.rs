use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentTeacher, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::Quiz;
use crate::db::types::{DifficultyLevel, QuestionType};
use crate::repositories;
use crate::schemas::quiz::{
    CreateQuizRequest, DraftStagedResponse, QuestionView, QuizResponse, TakeQuizResponse,
};
use crate::schemas::submission::{
    AutoSubmitRequest, QuizResultsRow, SubmissionResponse, SubmitQuizRequest,
};
use crate::services::{quiz_codes, quiz_drafts, submission_flow};

const CODE_GENERATION_ATTEMPTS: usize = 5;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_quiz).get(list_my_quizzes))
        .route("/drafts", post(stage_draft))
        .route("/drafts/:token", get(preview_draft))
        .route("/drafts/:token/finalize", post(finalize_draft))
        .route("/:code", get(take_quiz))
        .route("/:code/submit", post(submit_quiz))
        .route("/:code/auto-submit", post(auto_submit))
        .route("/:code/results", get(quiz_results))
        .route("/:code/submissions/:submission_id/allow-retake", post(allow_retake))
}

async fn create_quiz(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<Json<QuizResponse>, ApiError> {
    let quiz = persist_quiz(&state, &payload, &teacher.id).await?;
    let question_count = payload.questions.len() as i64;
    Ok(Json(QuizResponse::from_quiz(&quiz, question_count)))
}

async fn list_my_quizzes(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuizResponse>>, ApiError> {
    let quizzes = repositories::quizzes::list_by_creator(state.db(), &teacher.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list quizzes"))?;

    let mut response = Vec::with_capacity(quizzes.len());
    for quiz in &quizzes {
        let question_count = repositories::questions::count_by_quiz(state.db(), &quiz.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
        response.push(QuizResponse::from_quiz(quiz, question_count));
    }

    Ok(Json(response))
}

async fn stage_draft(
    CurrentTeacher(_teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<Json<DraftStagedResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;
    validate_quiz_payload(&payload)?;

    let ttl_seconds = state.settings().quiz().draft_ttl_seconds;
    let draft_token = quiz_drafts::stage(state.redis(), &payload, ttl_seconds)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to stage quiz draft"))?;

    Ok(Json(DraftStagedResponse { draft_token, expires_in_seconds: ttl_seconds }))
}

async fn preview_draft(
    CurrentTeacher(_teacher): CurrentTeacher,
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CreateQuizRequest>, ApiError> {
    let draft = quiz_drafts::fetch(state.redis(), &token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to read quiz draft"))?
        .ok_or_else(|| ApiError::NotFound("Draft not found or expired".to_string()))?;

    Ok(Json(draft))
}

async fn finalize_draft(
    CurrentTeacher(teacher): CurrentTeacher,
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QuizResponse>, ApiError> {
    let draft = quiz_drafts::fetch(state.redis(), &token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to read quiz draft"))?
        .ok_or_else(|| ApiError::NotFound("Draft not found or expired".to_string()))?;

    let quiz = persist_quiz(&state, &draft, &teacher.id).await?;

    if let Err(err) = quiz_drafts::discard(state.redis(), &token).await {
        tracing::warn!(error = %err, "Failed to discard finalized quiz draft");
    }

    Ok(Json(QuizResponse::from_quiz(&quiz, draft.questions.len() as i64)))
}

async fn take_quiz(
    CurrentUser(user): CurrentUser,
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TakeQuizResponse>, ApiError> {
    let quiz = fetch_quiz_by_code(&state, &code).await?;

    let submission = submission_flow::start_or_resume(&state, &quiz, &user).await?;

    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    let views = questions.iter().map(QuestionView::from_question).collect();

    Ok(Json(TakeQuizResponse {
        quiz: QuizResponse::from_quiz(&quiz, questions.len() as i64),
        submission_id: submission.id,
        started_at: format_primitive(submission.started_at),
        questions: views,
    }))
}

async fn submit_quiz(
    CurrentUser(user): CurrentUser,
    Path(code): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let quiz = fetch_quiz_by_code(&state, &code).await?;

    let submission = submission_flow::submit(
        &state,
        &quiz,
        &user,
        &payload.answers,
        submission_flow::SubmitMode::Manual { fullscreen_exit: payload.fullscreen_exit },
    )
    .await?;

    Ok(Json(SubmissionResponse::from(&submission)))
}

/// Beacon endpoint: grades whatever answers arrived and never fails the
/// client. A completed attempt stays untouched.
async fn auto_submit(
    CurrentUser(user): CurrentUser,
    Path(code): Path<String>,
    State(state): State<AppState>,
    payload: Option<Json<AutoSubmitRequest>>,
) -> StatusCode {
    // Beacons fire on tab close; a missing or malformed body still counts as
    // an empty partial submission.
    let answers = payload.map(|Json(payload)| payload.answers).unwrap_or_default();

    let quiz = match repositories::quizzes::find_by_code(state.db(), &code.to_uppercase()).await {
        Ok(Some(quiz)) => quiz,
        Ok(None) => return StatusCode::NO_CONTENT,
        Err(err) => {
            tracing::error!(error = %err, "Failed to fetch quiz for auto-submit");
            return StatusCode::NO_CONTENT;
        }
    };

    match submission_flow::submit(
        &state,
        &quiz,
        &user,
        &answers,
        submission_flow::SubmitMode::AutoPartial,
    )
    .await
    {
        Ok(_) => {}
        Err(submission_flow::FlowError::AlreadyAttempted) => {}
        Err(err) => {
            tracing::error!(error = %err, quiz_id = %quiz.id, "Auto-submit failed");
        }
    }

    StatusCode::NO_CONTENT
}

async fn quiz_results(
    CurrentTeacher(teacher): CurrentTeacher,
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuizResultsRow>>, ApiError> {
    let quiz = fetch_quiz_by_code(&state, &code).await?;
    if quiz.created_by != teacher.id {
        return Err(ApiError::Forbidden("Not enough permissions"));
    }

    let submissions = repositories::submissions::list_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    let student_ids: Vec<String> =
        submissions.iter().map(|submission| submission.student_id.clone()).collect();
    let usernames: std::collections::HashMap<String, String> =
        repositories::users::usernames_by_ids(state.db(), &student_ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to resolve students"))?
            .into_iter()
            .collect();

    let rows = submissions
        .iter()
        .map(|submission| QuizResultsRow {
            submission: SubmissionResponse::from(submission),
            student_id: submission.student_id.clone(),
            student_username: usernames
                .get(&submission.student_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
        })
        .collect();

    Ok(Json(rows))
}

async fn allow_retake(
    CurrentUser(user): CurrentUser,
    Path((code, submission_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    submission_flow::reset_for_retake(&state, &code.to_uppercase(), &submission_id, &user).await?;

    Ok(Json(serde_json::json!({
        "detail": "Submission reset; the student can retake the quiz"
    })))
}

async fn fetch_quiz_by_code(state: &AppState, code: &str) -> Result<Quiz, ApiError> {
    repositories::quizzes::find_by_code(state.db(), &code.to_uppercase())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))
}

async fn persist_quiz(
    state: &AppState,
    payload: &CreateQuizRequest,
    created_by: &str,
) -> Result<Quiz, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;
    validate_quiz_payload(payload)?;

    let code = generate_unique_code(state).await?;
    let now = primitive_now_utc();
    let quiz_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to open transaction"))?;

    let quiz = repositories::quizzes::create(
        &mut *tx,
        repositories::quizzes::CreateQuiz {
            id: &quiz_id,
            title: &payload.title,
            code: &code,
            created_by,
            difficulty: payload.difficulty.unwrap_or(DifficultyLevel::Beginner),
            duration_minutes: payload.duration_minutes,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create quiz"))?;

    for (index, question) in payload.questions.iter().enumerate() {
        repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                quiz_id: &quiz_id,
                prompt: &question.prompt,
                qtype: question.qtype,
                marks: question.marks,
                options: question.options.clone(),
                answer: question.answer.as_deref(),
                test_cases: question.test_cases.clone(),
                allowed_languages: question.allowed_languages.clone(),
                time_limit_seconds: question.time_limit_seconds,
                memory_limit_mb: question.memory_limit_mb,
                sample_input: question.sample_input.as_deref(),
                sample_output: question.sample_output.as_deref(),
                starter_code: question
                    .starter_code
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({})),
                order_index: index as i32,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit quiz"))?;

    tracing::info!(quiz_id = %quiz.id, code = %quiz.code, "Quiz created");

    Ok(quiz)
}

fn validate_quiz_payload(payload: &CreateQuizRequest) -> Result<(), ApiError> {
    for (index, question) in payload.questions.iter().enumerate() {
        match question.qtype {
            QuestionType::Mcq => {
                if question.options.is_empty() {
                    return Err(ApiError::BadRequest(format!(
                        "Question {}: multiple-choice questions need options",
                        index + 1
                    )));
                }
                if question.answer.as_deref().unwrap_or("").is_empty() {
                    return Err(ApiError::BadRequest(format!(
                        "Question {}: multiple-choice questions need a correct option letter",
                        index + 1
                    )));
                }
            }
            QuestionType::Subjective | QuestionType::Coding => {}
        }
    }

    Ok(())
}

async fn generate_unique_code(state: &AppState) -> Result<String, ApiError> {
    for _ in 0..CODE_GENERATION_ATTEMPTS {
        let code = quiz_codes::generate_join_code();
        let exists = repositories::quizzes::exists_by_code(state.db(), &code)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check quiz code"))?;
        if !exists {
            return Ok(code);
        }
    }

    Err(ApiError::Internal("Failed to allocate a unique quiz code".to_string()))
}
