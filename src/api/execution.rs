use axum::{extract::State, routing::post, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::execution::{
    ExecutionView, RunCodeRequest, RunCodeResponse, RunTestsRequest, RunTestsResponse,
};
use crate::services::execution::{runner, ExecutionRequest};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/run", post(run_code)).route("/run-tests", post(run_tests))
}

/// Single ad-hoc execution for the editor's "Run" button.
async fn run_code(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<RunCodeRequest>,
) -> Result<Json<RunCodeResponse>, ApiError> {
    if payload.code.trim().is_empty() {
        return Err(ApiError::BadRequest("No code provided".to_string()));
    }

    let request = ExecutionRequest {
        source_code: payload.code,
        language: payload.language,
        stdin: payload.test_input,
        time_limit_seconds: payload.time_limit,
        memory_limit_mb: payload.memory_limit,
    };

    let outcome = state.executor().execute(&request).await;

    Ok(Json(RunCodeResponse { success: true, result: ExecutionView::from(outcome) }))
}

async fn run_tests(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<RunTestsRequest>,
) -> Result<Json<RunTestsResponse>, ApiError> {
    if payload.code.trim().is_empty() || payload.test_cases.is_empty() {
        return Err(ApiError::BadRequest("Code and test cases required".to_string()));
    }

    let report = runner::run_test_cases(
        state.executor(),
        &payload.code,
        &payload.language,
        &payload.test_cases,
        payload.time_limit,
        payload.memory_limit,
        state.settings().execution().max_concurrent_cases,
    )
    .await;

    Ok(Json(RunTestsResponse { success: true, result: report }))
}
