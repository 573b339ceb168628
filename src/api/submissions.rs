use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::submission::{SubmissionResponse, SubmissionResultResponse};
use crate::services::submission_flow;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/my", get(my_submissions))
        .route("/:submission_id/result", get(submission_result))
}

async fn my_submissions(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let submissions = repositories::submissions::list_by_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    let mut response = Vec::with_capacity(submissions.len());
    for submission in &submissions {
        let quiz = repositories::quizzes::find_by_id(state.db(), &submission.quiz_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?;

        response.push(serde_json::json!({
            "submission": SubmissionResponse::from(submission),
            "quiz_title": quiz.as_ref().map(|quiz| quiz.title.clone()),
            "quiz_code": quiz.as_ref().map(|quiz| quiz.code.clone()),
        }));
    }

    Ok(Json(response))
}

async fn submission_result(
    CurrentUser(user): CurrentUser,
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResultResponse>, ApiError> {
    let result = submission_flow::result_if_unlocked(&state, &submission_id, &user).await?;
    Ok(Json(result))
}
