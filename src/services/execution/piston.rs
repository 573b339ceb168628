use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;

use super::{ExecutionOutcome, ExecutionProvider, ExecutionRequest, FailureKind};

const COMPILE_TIMEOUT_MS: u64 = 10_000;

/// Synchronous execution provider: one POST carries source, stdin and limits,
/// and the response holds the compile/run stages.
#[derive(Debug, Clone)]
pub(crate) struct PistonClient {
    client: Client,
    base_url: String,
    network_budget: Duration,
}

pub(super) fn piston_language(language: &str) -> &'static str {
    // Unknown languages intentionally fall through to the Python runtime.
    match language.to_ascii_lowercase().as_str() {
        "python" | "python3" => "python3",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        _ => "python3",
    }
}

impl PistonClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.execution().connect_timeout_seconds))
            .build()
            .context("Failed to build Piston HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.execution().piston_base_url.trim_end_matches('/').to_string(),
            network_budget: Duration::from_secs(settings.execution().network_budget_seconds),
        })
    }

    async fn execute_inner(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let payload = json!({
            "language": piston_language(&request.language),
            "version": "*",
            "files": [{"content": request.source_code}],
            "stdin": request.stdin,
            "args": [],
            "compile_timeout": COMPILE_TIMEOUT_MS,
            "run_timeout": request.time_limit_seconds * 1000,
            "compile_memory_limit": request.memory_limit_mb * 1024 * 1024,
            "run_memory_limit": request.memory_limit_mb * 1024 * 1024,
        });

        let endpoint = format!("{}/execute", self.base_url);
        let response = match self.client.post(&endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => {
                return ExecutionOutcome::provider_error(format!("piston request failed: {err}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ExecutionOutcome::provider_error(format!("piston returned status {status}"));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                return ExecutionOutcome::provider_error(format!(
                    "piston returned malformed body: {err}"
                ));
            }
        };

        classify_response(&body)
    }
}

#[async_trait]
impl ExecutionProvider for PistonClient {
    fn name(&self) -> &'static str {
        "piston"
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let deadline = Duration::from_millis(COMPILE_TIMEOUT_MS)
            + Duration::from_secs(request.time_limit_seconds)
            + self.network_budget;

        match tokio::time::timeout(deadline, self.execute_inner(request)).await {
            Ok(outcome) => outcome,
            Err(_) => ExecutionOutcome::timeout("piston call exceeded its deadline"),
        }
    }
}

fn stage_text(stage: &Value, key: &str) -> String {
    stage.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string()
}

pub(super) fn classify_response(body: &Value) -> ExecutionOutcome {
    if let Some(run) = body.get("run") {
        let stdout = if run.get("output").and_then(Value::as_str).is_some() {
            stage_text(run, "output")
        } else {
            stage_text(run, "stdout")
        };
        let stderr = stage_text(run, "stderr");

        if run.get("code").and_then(Value::as_i64) == Some(0) {
            return ExecutionOutcome::Success { stdout, stderr };
        }

        let detail = if stderr.is_empty() { stage_text(run, "stdout") } else { stderr };
        return ExecutionOutcome::Failure {
            kind: FailureKind::RuntimeError,
            message: "Runtime Error".to_string(),
            stdout,
            stderr: detail,
        };
    }

    if let Some(compile) = body.get("compile") {
        if compile.get("code").and_then(Value::as_i64).unwrap_or(0) != 0 {
            let stderr = stage_text(compile, "stderr");
            let detail = if stderr.is_empty() { stage_text(compile, "stdout") } else { stderr };
            return ExecutionOutcome::Failure {
                kind: FailureKind::CompileError,
                message: "Compilation Error".to_string(),
                stdout: String::new(),
                stderr: detail,
            };
        }
    }

    // 200 with no usable stage: let the fallback chain take over.
    ExecutionOutcome::provider_error("piston response missing run stage")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn language_map_defaults_to_python() {
        assert_eq!(piston_language("python"), "python3");
        assert_eq!(piston_language("Java"), "java");
        assert_eq!(piston_language("cpp"), "cpp");
        assert_eq!(piston_language("brainfuck"), "python3");
        assert_eq!(piston_language(""), "python3");
    }

    #[test]
    fn classify_zero_exit_run_as_success() {
        let body = json!({
            "run": {"code": 0, "output": "42\n", "stdout": "42\n", "stderr": ""}
        });
        assert_eq!(
            classify_response(&body),
            ExecutionOutcome::Success { stdout: "42".to_string(), stderr: String::new() }
        );
    }

    #[test]
    fn classify_nonzero_run_as_runtime_error_with_stderr() {
        let body = json!({
            "run": {"code": 1, "output": "", "stdout": "", "stderr": "Traceback: boom\n"}
        });
        let outcome = classify_response(&body);
        match outcome {
            ExecutionOutcome::Failure { kind, stderr, .. } => {
                assert_eq!(kind, FailureKind::RuntimeError);
                assert_eq!(stderr, "Traceback: boom");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn classify_runtime_error_falls_back_to_stdout_detail() {
        let body = json!({
            "run": {"code": 2, "output": "partial", "stdout": "partial", "stderr": ""}
        });
        match classify_response(&body) {
            ExecutionOutcome::Failure { kind, stderr, .. } => {
                assert_eq!(kind, FailureKind::RuntimeError);
                assert_eq!(stderr, "partial");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn classify_compile_failure() {
        let body = json!({
            "compile": {"code": 1, "stdout": "", "stderr": "error: expected ';'"}
        });
        match classify_response(&body) {
            ExecutionOutcome::Failure { kind, stderr, .. } => {
                assert_eq!(kind, FailureKind::CompileError);
                assert_eq!(stderr, "error: expected ';'");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn classify_empty_body_as_provider_error() {
        let body = json!({});
        assert!(classify_response(&body).is_provider_error());
    }
}
