pub(crate) mod fallback;
pub(crate) mod judge0;
pub(crate) mod piston;
pub(crate) mod runner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One code execution: source plus stdin under per-run limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionRequest {
    pub(crate) source_code: String,
    pub(crate) language: String,
    pub(crate) stdin: String,
    pub(crate) time_limit_seconds: u64,
    pub(crate) memory_limit_mb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FailureKind {
    CompileError,
    RuntimeError,
    ProviderError,
    Timeout,
}

impl FailureKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::CompileError => "compile_error",
            Self::RuntimeError => "runtime_error",
            Self::ProviderError => "provider_error",
            Self::Timeout => "timeout",
        }
    }
}

/// Outcome of one remote execution. Compile and runtime failures are grading
/// data; `ProviderError` marks a transport-level fault and is the only
/// variant the fallback chain reacts to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExecutionOutcome {
    Success { stdout: String, stderr: String },
    Failure { kind: FailureKind, message: String, stdout: String, stderr: String },
}

impl ExecutionOutcome {
    pub(crate) fn provider_error(message: impl Into<String>) -> Self {
        Self::Failure {
            kind: FailureKind::ProviderError,
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub(crate) fn timeout(message: impl Into<String>) -> Self {
        Self::Failure {
            kind: FailureKind::Timeout,
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub(crate) fn is_provider_error(&self) -> bool {
        matches!(self, Self::Failure { kind: FailureKind::ProviderError, .. })
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure { kind, .. } => kind.as_str(),
        }
    }
}

#[async_trait]
pub(crate) trait ExecutionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome;
}
