use std::sync::Arc;

use crate::db::models::QuizQuestion;
use crate::db::types::QuestionType;
use crate::services::execution::{runner, ExecutionProvider};
use crate::services::subjective::SubjectiveScorer;

/// Ratio at or above which a free-text answer counts as correct.
pub(crate) const SUBJECTIVE_CORRECT_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Default)]
pub(crate) struct ScoredAnswer {
    pub(crate) scored_marks: f64,
    pub(crate) is_correct: Option<bool>,
    pub(crate) ai_score: Option<f64>,
    pub(crate) code_language: Option<String>,
    pub(crate) test_results: Option<serde_json::Value>,
    pub(crate) passed_test_cases: i32,
    pub(crate) total_test_cases: i32,
}

/// The selected option letter: everything before the first ". " separator.
pub(crate) fn mcq_letter(raw_answer: &str) -> &str {
    raw_answer.split_once(". ").map(|(letter, _)| letter).unwrap_or(raw_answer)
}

pub(crate) fn score_mcq(question: &QuizQuestion, raw_answer: &str) -> ScoredAnswer {
    let correct_letter = question.answer.as_deref().unwrap_or("");
    let is_correct = !raw_answer.is_empty() && mcq_letter(raw_answer) == correct_letter;

    ScoredAnswer {
        scored_marks: if is_correct { question.marks as f64 } else { 0.0 },
        is_correct: Some(is_correct),
        ..ScoredAnswer::default()
    }
}

/// Scores one answer for its question type. Every failure mode inside grading
/// (provider faults, scoring service outages) lands as a zero or default
/// score, never as an error.
pub(crate) async fn score_answer(
    question: &QuizQuestion,
    raw_answer: &str,
    code_language: Option<&str>,
    executor: Arc<dyn ExecutionProvider>,
    subjective: Arc<dyn SubjectiveScorer>,
    max_concurrent_cases: usize,
) -> ScoredAnswer {
    match question.qtype {
        QuestionType::Mcq => score_mcq(question, raw_answer),
        QuestionType::Subjective => {
            if raw_answer.trim().is_empty() {
                return ScoredAnswer {
                    scored_marks: 0.0,
                    is_correct: Some(false),
                    ai_score: Some(0.0),
                    ..ScoredAnswer::default()
                };
            }

            let model_answer = question.answer.as_deref().unwrap_or("");
            let ratio = subjective
                .score(&question.prompt, raw_answer, model_answer)
                .await
                .clamp(0.0, 1.0);

            ScoredAnswer {
                scored_marks: question.marks as f64 * ratio,
                is_correct: Some(ratio >= SUBJECTIVE_CORRECT_THRESHOLD),
                ai_score: Some(ratio),
                ..ScoredAnswer::default()
            }
        }
        QuestionType::Coding => {
            let language = code_language.unwrap_or("python");

            if raw_answer.trim().is_empty() {
                return ScoredAnswer {
                    scored_marks: 0.0,
                    is_correct: Some(false),
                    code_language: Some(language.to_string()),
                    test_results: Some(serde_json::Value::Array(Vec::new())),
                    ..ScoredAnswer::default()
                };
            }

            let report = runner::run_test_cases(
                executor,
                raw_answer,
                language,
                &question.test_cases.0,
                question.time_limit(),
                question.memory_limit(),
                max_concurrent_cases,
            )
            .await;

            let ratio = if report.total > 0 {
                report.passed as f64 / report.total as f64
            } else {
                0.0
            };
            let test_results =
                serde_json::to_value(&report.results).unwrap_or(serde_json::Value::Array(Vec::new()));

            ScoredAnswer {
                scored_marks: question.marks as f64 * ratio,
                is_correct: Some(report.total > 0 && report.passed == report.total),
                ai_score: None,
                code_language: Some(language.to_string()),
                test_results: Some(test_results),
                passed_test_cases: report.passed as i32,
                total_test_cases: report.total as i32,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sqlx::types::Json;

    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::db::models::TestCase;
    use crate::services::execution::{ExecutionOutcome, ExecutionRequest};

    struct EchoProvider;

    #[async_trait]
    impl ExecutionProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
            ExecutionOutcome::Success {
                stdout: request.stdin.trim().to_string(),
                stderr: String::new(),
            }
        }
    }

    struct FixedRatio(f64);

    #[async_trait]
    impl SubjectiveScorer for FixedRatio {
        async fn score(&self, _question: &str, _student: &str, _model: &str) -> f64 {
            self.0
        }
    }

    fn question(qtype: QuestionType, marks: i32, answer: Option<&str>) -> QuizQuestion {
        let now = primitive_now_utc();
        QuizQuestion {
            id: "q-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            prompt: "What is the capital of France?".to_string(),
            qtype,
            marks,
            options: Json(vec![
                "A. London".to_string(),
                "B. Paris".to_string(),
                "C. Berlin".to_string(),
            ]),
            answer: answer.map(|value| value.to_string()),
            test_cases: Json(Vec::new()),
            allowed_languages: Json(vec!["python".to_string()]),
            time_limit_seconds: Some(2),
            memory_limit_mb: Some(256),
            sample_input: None,
            sample_output: None,
            starter_code: Json(serde_json::json!({})),
            order_index: 0,
            created_at: now,
        }
    }

    fn coding_question(cases: Vec<TestCase>) -> QuizQuestion {
        let mut question = question(QuestionType::Coding, 8, None);
        question.test_cases = Json(cases);
        question
    }

    #[test]
    fn mcq_letter_splits_on_first_separator() {
        assert_eq!(mcq_letter("B. Paris"), "B");
        assert_eq!(mcq_letter("A. Item. With dots"), "A");
        assert_eq!(mcq_letter("B"), "B");
        assert_eq!(mcq_letter(""), "");
    }

    #[test]
    fn mcq_correct_answer_gets_full_marks() {
        let question = question(QuestionType::Mcq, 10, Some("B"));
        let scored = score_mcq(&question, "B. Paris");

        assert_eq!(scored.scored_marks, 10.0);
        assert_eq!(scored.is_correct, Some(true));
    }

    #[test]
    fn mcq_wrong_or_empty_answer_scores_zero() {
        let question = question(QuestionType::Mcq, 10, Some("B"));

        let wrong = score_mcq(&question, "A. London");
        assert_eq!(wrong.scored_marks, 0.0);
        assert_eq!(wrong.is_correct, Some(false));

        let empty = score_mcq(&question, "");
        assert_eq!(empty.scored_marks, 0.0);
        assert_eq!(empty.is_correct, Some(false));
    }

    #[test]
    fn mcq_scoring_is_deterministic() {
        let question = question(QuestionType::Mcq, 5, Some("C"));
        let first = score_mcq(&question, "C. Berlin");
        let second = score_mcq(&question, "C. Berlin");
        assert_eq!(first.scored_marks, second.scored_marks);
        assert_eq!(first.is_correct, second.is_correct);
    }

    #[tokio::test]
    async fn subjective_empty_answer_skips_the_collaborator() {
        let question = question(QuestionType::Subjective, 10, Some("model answer"));
        let scored = score_answer(
            &question,
            "   ",
            None,
            Arc::new(EchoProvider),
            Arc::new(FixedRatio(1.0)),
            4,
        )
        .await;

        assert_eq!(scored.scored_marks, 0.0);
        assert_eq!(scored.is_correct, Some(false));
        assert_eq!(scored.ai_score, Some(0.0));
    }

    #[tokio::test]
    async fn subjective_ratio_scales_marks_and_sets_threshold() {
        let question = question(QuestionType::Subjective, 10, Some("model answer"));

        let passing = score_answer(
            &question,
            "a thorough answer",
            None,
            Arc::new(EchoProvider),
            Arc::new(FixedRatio(0.8)),
            4,
        )
        .await;
        assert_eq!(passing.scored_marks, 8.0);
        assert_eq!(passing.is_correct, Some(true));

        let failing = score_answer(
            &question,
            "a thin answer",
            None,
            Arc::new(EchoProvider),
            Arc::new(FixedRatio(0.5)),
            4,
        )
        .await;
        assert_eq!(failing.scored_marks, 5.0);
        assert_eq!(failing.is_correct, Some(false));
    }

    #[tokio::test]
    async fn subjective_ratio_is_clamped() {
        let question = question(QuestionType::Subjective, 10, Some("model answer"));
        let scored = score_answer(
            &question,
            "answer",
            None,
            Arc::new(EchoProvider),
            Arc::new(FixedRatio(3.0)),
            4,
        )
        .await;

        assert_eq!(scored.scored_marks, 10.0);
        assert_eq!(scored.ai_score, Some(1.0));
    }

    #[tokio::test]
    async fn coding_partial_pass_scales_marks() {
        let cases = vec![
            TestCase { input: "1".into(), expected_output: "1".into(), is_hidden: false },
            TestCase { input: "2".into(), expected_output: "2".into(), is_hidden: true },
            TestCase { input: "3".into(), expected_output: "3".into(), is_hidden: true },
            TestCase { input: "4".into(), expected_output: "999".into(), is_hidden: false },
        ];
        let question = coding_question(cases);

        let scored = score_answer(
            &question,
            "print(input())",
            Some("python"),
            Arc::new(EchoProvider),
            Arc::new(FixedRatio(0.0)),
            4,
        )
        .await;

        assert_eq!(scored.passed_test_cases, 3);
        assert_eq!(scored.total_test_cases, 4);
        assert_eq!(scored.scored_marks, 6.0);
        assert_eq!(scored.is_correct, Some(false));
    }

    #[tokio::test]
    async fn coding_empty_source_scores_zero_with_empty_detail() {
        let question = coding_question(vec![TestCase {
            input: "1".into(),
            expected_output: "1".into(),
            is_hidden: false,
        }]);

        let scored = score_answer(
            &question,
            "",
            Some("python"),
            Arc::new(EchoProvider),
            Arc::new(FixedRatio(0.0)),
            4,
        )
        .await;

        assert_eq!(scored.scored_marks, 0.0);
        assert_eq!(scored.is_correct, Some(false));
        assert_eq!(scored.test_results, Some(serde_json::Value::Array(Vec::new())));
    }

    #[tokio::test]
    async fn coding_without_cases_never_divides_by_zero() {
        let question = coding_question(Vec::new());

        let scored = score_answer(
            &question,
            "print(1)",
            Some("python"),
            Arc::new(EchoProvider),
            Arc::new(FixedRatio(0.0)),
            4,
        )
        .await;

        assert_eq!(scored.scored_marks, 0.0);
        assert_eq!(scored.is_correct, Some(false));
        assert_eq!(scored.total_test_cases, 0);
    }
}
