use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;

use super::{ExecutionOutcome, ExecutionProvider, ExecutionRequest, FailureKind};

const STATUS_ACCEPTED: i64 = 3;
const STATUS_TIME_LIMIT: i64 = 5;
const STATUS_COMPILE_ERROR: i64 = 6;

/// Asynchronous execution provider: submit returns an opaque token which is
/// polled for the terminal result.
#[derive(Debug, Clone)]
pub(crate) struct Judge0Client {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    network_budget: Duration,
}

pub(super) fn judge0_language_id(language: &str) -> i64 {
    // Same fallthrough as the primary provider: unknown languages run as Python.
    match language.to_ascii_lowercase().as_str() {
        "python" | "python3" => 71,
        "java" => 62,
        "cpp" => 54,
        "c" => 50,
        _ => 71,
    }
}

impl Judge0Client {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.execution().connect_timeout_seconds))
            .build()
            .context("Failed to build Judge0 HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.execution().judge0_base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(settings.execution().judge0_poll_interval_ms),
            max_poll_attempts: settings.execution().judge0_max_poll_attempts,
            network_budget: Duration::from_secs(settings.execution().network_budget_seconds),
        })
    }

    async fn execute_inner(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let token = match self.submit(request).await {
            Ok(token) => token,
            Err(outcome) => return outcome,
        };

        self.poll(&token).await
    }

    async fn submit(&self, request: &ExecutionRequest) -> Result<String, ExecutionOutcome> {
        let payload = json!({
            "source_code": request.source_code,
            "language_id": judge0_language_id(&request.language),
            "stdin": request.stdin,
            "cpu_time_limit": request.time_limit_seconds,
            "memory_limit": request.memory_limit_mb * 1024,
        });

        let endpoint = format!("{}/submissions", self.base_url);
        let response = match self.client.post(&endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => {
                return Err(ExecutionOutcome::provider_error(format!(
                    "judge0 submit failed: {err}"
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionOutcome::provider_error(format!(
                "judge0 submit returned status {status}"
            )));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                return Err(ExecutionOutcome::provider_error(format!(
                    "judge0 submit returned malformed body: {err}"
                )));
            }
        };

        body.get("token")
            .and_then(Value::as_str)
            .map(|token| token.to_string())
            .ok_or_else(|| ExecutionOutcome::provider_error("judge0 submission token missing"))
    }

    async fn poll(&self, token: &str) -> ExecutionOutcome {
        let endpoint = format!("{}/submissions/{}", self.base_url, token);

        for _ in 0..self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let response = match self.client.get(&endpoint).send().await {
                Ok(response) => response,
                Err(err) => {
                    return ExecutionOutcome::provider_error(format!(
                        "judge0 poll failed: {err}"
                    ));
                }
            };

            if !response.status().is_success() {
                continue;
            }

            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(err) => {
                    return ExecutionOutcome::provider_error(format!(
                        "judge0 poll returned malformed body: {err}"
                    ));
                }
            };

            if let Some(outcome) = parse_poll_response(&body) {
                return outcome;
            }
        }

        ExecutionOutcome::timeout("judge0 polling exhausted without a terminal status")
    }
}

#[async_trait]
impl ExecutionProvider for Judge0Client {
    fn name(&self) -> &'static str {
        "judge0"
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let poll_budget = self.poll_interval * self.max_poll_attempts;
        let deadline =
            Duration::from_secs(request.time_limit_seconds) + poll_budget + self.network_budget;

        match tokio::time::timeout(deadline, self.execute_inner(request)).await {
            Ok(outcome) => outcome,
            Err(_) => ExecutionOutcome::timeout("judge0 call exceeded its deadline"),
        }
    }
}

fn field_text(body: &Value, key: &str) -> String {
    body.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string()
}

/// `None` means the submission is still queued or running.
pub(super) fn parse_poll_response(body: &Value) -> Option<ExecutionOutcome> {
    let status_id = body.get("status").and_then(|status| status.get("id")).and_then(Value::as_i64)?;

    if status_id == STATUS_ACCEPTED {
        return Some(ExecutionOutcome::Success {
            stdout: field_text(body, "stdout"),
            stderr: field_text(body, "stderr"),
        });
    }

    if (4..=12).contains(&status_id) {
        let description = body
            .get("status")
            .and_then(|status| status.get("description"))
            .and_then(Value::as_str)
            .unwrap_or("Execution Error")
            .to_string();

        let stderr = field_text(body, "stderr");
        let detail = if stderr.is_empty() { field_text(body, "compile_output") } else { stderr };

        let kind = match status_id {
            STATUS_COMPILE_ERROR => FailureKind::CompileError,
            STATUS_TIME_LIMIT => FailureKind::Timeout,
            _ => FailureKind::RuntimeError,
        };

        return Some(ExecutionOutcome::Failure {
            kind,
            message: description,
            stdout: field_text(body, "stdout"),
            stderr: detail,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn language_id_table() {
        assert_eq!(judge0_language_id("python"), 71);
        assert_eq!(judge0_language_id("java"), 62);
        assert_eq!(judge0_language_id("cpp"), 54);
        assert_eq!(judge0_language_id("c"), 50);
        assert_eq!(judge0_language_id("ruby"), 71);
    }

    #[test]
    fn accepted_status_is_success() {
        let body = json!({
            "status": {"id": 3, "description": "Accepted"},
            "stdout": "hello\n",
            "stderr": ""
        });
        assert_eq!(
            parse_poll_response(&body),
            Some(ExecutionOutcome::Success { stdout: "hello".to_string(), stderr: String::new() })
        );
    }

    #[test]
    fn pending_status_keeps_polling() {
        let body = json!({"status": {"id": 2, "description": "Processing"}});
        assert_eq!(parse_poll_response(&body), None);
    }

    #[test]
    fn compile_error_status_maps_to_compile_error() {
        let body = json!({
            "status": {"id": 6, "description": "Compilation Error"},
            "stdout": "",
            "stderr": "",
            "compile_output": "main.c:1: error"
        });
        match parse_poll_response(&body) {
            Some(ExecutionOutcome::Failure { kind, message, stderr, .. }) => {
                assert_eq!(kind, FailureKind::CompileError);
                assert_eq!(message, "Compilation Error");
                assert_eq!(stderr, "main.c:1: error");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn time_limit_status_maps_to_timeout() {
        let body = json!({
            "status": {"id": 5, "description": "Time Limit Exceeded"},
            "stdout": "",
            "stderr": ""
        });
        match parse_poll_response(&body) {
            Some(ExecutionOutcome::Failure { kind, .. }) => {
                assert_eq!(kind, FailureKind::Timeout);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn runtime_error_status_carries_description() {
        let body = json!({
            "status": {"id": 11, "description": "Runtime Error (SIGSEGV)"},
            "stdout": "",
            "stderr": "segfault"
        });
        match parse_poll_response(&body) {
            Some(ExecutionOutcome::Failure { kind, message, stderr, .. }) => {
                assert_eq!(kind, FailureKind::RuntimeError);
                assert_eq!(message, "Runtime Error (SIGSEGV)");
                assert_eq!(stderr, "segfault");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
