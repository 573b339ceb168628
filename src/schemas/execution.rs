use serde::{Deserialize, Serialize};

use crate::db::models::TestCase;
use crate::services::execution::{runner::TestRunReport, ExecutionOutcome};

fn default_time_limit() -> u64 {
    2
}

fn default_memory_limit() -> u64 {
    256
}

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunCodeRequest {
    pub(crate) code: String,
    #[serde(default = "default_language")]
    pub(crate) language: String,
    #[serde(default)]
    pub(crate) test_input: String,
    #[serde(default = "default_time_limit")]
    pub(crate) time_limit: u64,
    #[serde(default = "default_memory_limit")]
    pub(crate) memory_limit: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunTestsRequest {
    pub(crate) code: String,
    #[serde(default = "default_language")]
    pub(crate) language: String,
    pub(crate) test_cases: Vec<TestCase>,
    #[serde(default = "default_time_limit")]
    pub(crate) time_limit: u64,
    #[serde(default = "default_memory_limit")]
    pub(crate) memory_limit: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExecutionView {
    pub(crate) status: &'static str,
    pub(crate) output: String,
    pub(crate) stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl From<ExecutionOutcome> for ExecutionView {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Success { stdout, stderr } => {
                Self { status: "success", output: stdout, stderr, message: None }
            }
            ExecutionOutcome::Failure { message, stdout, stderr, .. } => {
                Self { status: "error", output: stdout, stderr, message: Some(message) }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RunCodeResponse {
    pub(crate) success: bool,
    pub(crate) result: ExecutionView,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunTestsResponse {
    pub(crate) success: bool,
    pub(crate) result: TestRunReport,
}
