use std::sync::Arc;

use async_trait::async_trait;

use super::{ExecutionOutcome, ExecutionProvider, ExecutionRequest};

/// Two-step provider chain: the secondary runs only when the primary reports
/// a transport-level fault, and at most once per call. Compile errors,
/// runtime errors and timeouts are final wherever they occur.
pub(crate) struct FallbackExecutor {
    primary: Arc<dyn ExecutionProvider>,
    secondary: Arc<dyn ExecutionProvider>,
}

impl FallbackExecutor {
    pub(crate) fn new(
        primary: Arc<dyn ExecutionProvider>,
        secondary: Arc<dyn ExecutionProvider>,
    ) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl ExecutionProvider for FallbackExecutor {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let outcome = self.primary.execute(request).await;
        metrics::counter!(
            "execution_provider_calls_total",
            "provider" => self.primary.name(),
            "outcome" => outcome.label()
        )
        .increment(1);

        if !outcome.is_provider_error() {
            return outcome;
        }

        if let ExecutionOutcome::Failure { message, .. } = &outcome {
            tracing::warn!(
                provider = self.primary.name(),
                error = %message,
                "Primary execution provider unavailable; falling back"
            );
        }

        let fallback_outcome = self.secondary.execute(request).await;
        metrics::counter!(
            "execution_provider_calls_total",
            "provider" => self.secondary.name(),
            "outcome" => fallback_outcome.label()
        )
        .increment(1);

        if let ExecutionOutcome::Failure { message, .. } = &fallback_outcome {
            if fallback_outcome.is_provider_error() {
                tracing::error!(
                    provider = self.secondary.name(),
                    error = %message,
                    "Both execution providers unavailable"
                );
            }
        }

        fallback_outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::services::execution::FailureKind;

    struct StubProvider {
        name: &'static str,
        outcome: ExecutionOutcome,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(name: &'static str, outcome: ExecutionOutcome) -> Arc<Self> {
            Arc::new(Self { name, outcome, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExecutionProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, _request: &ExecutionRequest) -> ExecutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            source_code: "print(1)".to_string(),
            language: "python".to_string(),
            stdin: String::new(),
            time_limit_seconds: 2,
            memory_limit_mb: 256,
        }
    }

    fn success() -> ExecutionOutcome {
        ExecutionOutcome::Success { stdout: "1".to_string(), stderr: String::new() }
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let primary = StubProvider::new("primary", success());
        let secondary = StubProvider::new("secondary", success());
        let chain = FallbackExecutor::new(primary.clone(), secondary.clone());

        let outcome = chain.execute(&request()).await;

        assert_eq!(outcome, success());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn provider_error_triggers_exactly_one_fallback_call() {
        let primary =
            StubProvider::new("primary", ExecutionOutcome::provider_error("connection refused"));
        let secondary = StubProvider::new("secondary", success());
        let chain = FallbackExecutor::new(primary.clone(), secondary.clone());

        let outcome = chain.execute(&request()).await;

        assert_eq!(outcome, success());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn compile_error_is_final_on_primary() {
        let compile_error = ExecutionOutcome::Failure {
            kind: FailureKind::CompileError,
            message: "Compilation Error".to_string(),
            stdout: String::new(),
            stderr: "expected ';'".to_string(),
        };
        let primary = StubProvider::new("primary", compile_error.clone());
        let secondary = StubProvider::new("secondary", success());
        let chain = FallbackExecutor::new(primary.clone(), secondary.clone());

        let outcome = chain.execute(&request()).await;

        assert_eq!(outcome, compile_error);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn secondary_failure_is_returned_as_final() {
        let primary = StubProvider::new("primary", ExecutionOutcome::provider_error("down"));
        let secondary =
            StubProvider::new("secondary", ExecutionOutcome::provider_error("also down"));
        let chain = FallbackExecutor::new(primary.clone(), secondary.clone());

        let outcome = chain.execute(&request()).await;

        assert!(outcome.is_provider_error());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }
}
