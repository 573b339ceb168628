use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::db::models::TestCase;

use super::{ExecutionOutcome, ExecutionProvider, ExecutionRequest};

/// Placeholder shown instead of the real input/expected output of hidden
/// cases, whether the case passed or not.
pub(crate) const HIDDEN_PLACEHOLDER: &str = "Hidden";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CaseResult {
    pub(crate) input: String,
    pub(crate) expected_output: String,
    pub(crate) actual_output: String,
    pub(crate) is_correct: bool,
    pub(crate) is_hidden: bool,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TestRunReport {
    pub(crate) results: Vec<CaseResult>,
    pub(crate) passed: usize,
    pub(crate) total: usize,
    pub(crate) percentage: f64,
}

impl TestRunReport {
    fn empty() -> Self {
        Self { results: Vec::new(), passed: 0, total: 0, percentage: 0.0 }
    }
}

/// Runs every test case through the provider chain with bounded parallelism.
/// Results come back in input order; one failing case never aborts the batch.
pub(crate) async fn run_test_cases(
    executor: Arc<dyn ExecutionProvider>,
    source_code: &str,
    language: &str,
    cases: &[TestCase],
    time_limit_seconds: u64,
    memory_limit_mb: u64,
    max_in_flight: usize,
) -> TestRunReport {
    if cases.is_empty() {
        return TestRunReport::empty();
    }

    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut handles = Vec::with_capacity(cases.len());

    for case in cases {
        let semaphore = semaphore.clone();
        let executor = executor.clone();
        let case = case.clone();
        let request = ExecutionRequest {
            source_code: source_code.to_string(),
            language: language.to_string(),
            stdin: case.input.clone(),
            time_limit_seconds,
            memory_limit_mb,
        };

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let outcome = executor.execute(&request).await;
            evaluate_case(&case, outcome)
        }));
    }

    let mut results = Vec::with_capacity(cases.len());
    let mut passed = 0usize;

    for (case, handle) in cases.iter().zip(handles) {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "Test case task panicked");
                evaluate_case(case, ExecutionOutcome::provider_error("execution task failed"))
            }
        };

        if result.is_correct {
            passed += 1;
        }
        results.push(result);
    }

    let total = results.len();
    let percentage = if total > 0 { passed as f64 / total as f64 * 100.0 } else { 0.0 };

    TestRunReport { results, passed, total, percentage }
}

fn evaluate_case(case: &TestCase, outcome: ExecutionOutcome) -> CaseResult {
    let expected = case.expected_output.trim();

    let (actual_output, is_correct, error) = match outcome {
        ExecutionOutcome::Success { stdout, .. } => {
            let actual = stdout.trim().to_string();
            let is_correct = actual == expected;
            (actual, is_correct, None)
        }
        ExecutionOutcome::Failure { message, stderr, .. } => {
            let detail =
                if stderr.trim().is_empty() { message.clone() } else { stderr.trim().to_string() };
            (detail, false, Some(message))
        }
    };

    let (input, expected_output) = if case.is_hidden {
        (HIDDEN_PLACEHOLDER.to_string(), HIDDEN_PLACEHOLDER.to_string())
    } else {
        (case.input.clone(), case.expected_output.trim().to_string())
    };

    CaseResult { input, expected_output, actual_output, is_correct, is_hidden: case.is_hidden, error }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::services::execution::FailureKind;

    /// Echoes stdin back as stdout, optionally delaying early cases to force
    /// out-of-order completion.
    struct EchoProvider {
        staggered: bool,
    }

    #[async_trait]
    impl ExecutionProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
            if self.staggered {
                let index: u64 = request.stdin.trim().parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis((8 - index.min(8)) * 10)).await;
            }
            ExecutionOutcome::Success { stdout: format!("{}\n", request.stdin.trim()), stderr: String::new() }
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ExecutionProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
            if request.stdin.trim() == "boom" {
                ExecutionOutcome::Failure {
                    kind: FailureKind::RuntimeError,
                    message: "Runtime Error".to_string(),
                    stdout: String::new(),
                    stderr: "division by zero".to_string(),
                }
            } else {
                ExecutionOutcome::Success {
                    stdout: format!("{}\n", request.stdin.trim()),
                    stderr: String::new(),
                }
            }
        }
    }

    fn case(input: &str, expected: &str, hidden: bool) -> TestCase {
        TestCase {
            input: input.to_string(),
            expected_output: expected.to_string(),
            is_hidden: hidden,
        }
    }

    #[tokio::test]
    async fn empty_case_list_yields_zero_percentage() {
        let report =
            run_test_cases(Arc::new(EchoProvider { staggered: false }), "code", "python", &[], 2, 256, 4)
                .await;

        assert_eq!(report.total, 0);
        assert_eq!(report.passed, 0);
        assert_eq!(report.percentage, 0.0);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn results_keep_input_order_under_concurrency() {
        let cases: Vec<TestCase> =
            (0..8).map(|index| case(&index.to_string(), &index.to_string(), false)).collect();

        let report = run_test_cases(
            Arc::new(EchoProvider { staggered: true }),
            "code",
            "python",
            &cases,
            2,
            256,
            4,
        )
        .await;

        assert_eq!(report.passed, 8);
        assert_eq!(report.total, 8);
        let inputs: Vec<&str> = report.results.iter().map(|result| result.input.as_str()).collect();
        assert_eq!(inputs, vec!["0", "1", "2", "3", "4", "5", "6", "7"]);
    }

    #[tokio::test]
    async fn hidden_cases_are_redacted_pass_or_fail() {
        let cases = vec![case("1", "1", true), case("2", "999", true)];

        let report = run_test_cases(
            Arc::new(EchoProvider { staggered: false }),
            "code",
            "python",
            &cases,
            2,
            256,
            4,
        )
        .await;

        assert_eq!(report.passed, 1);
        for result in &report.results {
            assert_eq!(result.input, HIDDEN_PLACEHOLDER);
            assert_eq!(result.expected_output, HIDDEN_PLACEHOLDER);
            assert!(result.is_hidden);
        }
        // Diagnostics still show what the code actually printed.
        assert_eq!(report.results[0].actual_output, "1");
        assert_eq!(report.results[1].actual_output, "2");
    }

    #[tokio::test]
    async fn case_failure_is_recorded_without_aborting_the_batch() {
        let cases = vec![case("ok", "ok", false), case("boom", "anything", false)];

        let report =
            run_test_cases(Arc::new(FailingProvider), "code", "python", &cases, 2, 256, 4).await;

        assert_eq!(report.passed, 1);
        assert_eq!(report.total, 2);
        assert_eq!(report.percentage, 50.0);
        assert!(report.results[0].is_correct);
        assert!(!report.results[1].is_correct);
        assert_eq!(report.results[1].actual_output, "division by zero");
        assert_eq!(report.results[1].error.as_deref(), Some("Runtime Error"));
    }

    #[tokio::test]
    async fn comparison_trims_but_stays_case_sensitive() {
        let cases = vec![case("Hello", "  Hello  ", false), case("hello", "Hello", false)];

        let report = run_test_cases(
            Arc::new(EchoProvider { staggered: false }),
            "code",
            "python",
            &cases,
            2,
            256,
            4,
        )
        .await;

        assert!(report.results[0].is_correct);
        assert!(!report.results[1].is_correct);
    }
}
