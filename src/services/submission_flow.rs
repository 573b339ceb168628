use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use time::{Duration, PrimitiveDateTime};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Quiz, QuizQuestion, QuizSubmission, User};
use crate::db::types::{QuestionType, UserRole};
use crate::repositories;
use crate::schemas::submission::{
    QuestionReview, SubmissionResponse, SubmissionResultResponse, SubmittedAnswer,
};
use crate::services::scoring::{self, ScoredAnswer};

pub(crate) const REVIEW_DELAY_MINUTES: i64 = 15;
pub(crate) const PASS_THRESHOLD_PERCENT: f64 = 60.0;

const QUESTION_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub(crate) enum FlowError {
    #[error("quiz already attempted")]
    AlreadyAttempted,
    #[error("not found")]
    NotFound,
    #[error("results are not unlocked yet")]
    ReviewLocked { unlocks_at: PrimitiveDateTime },
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum SubmitMode {
    /// Explicit submit of the whole form; the client reports whether the
    /// participant left fullscreen during the attempt.
    Manual { fullscreen_exit: bool },
    /// Beacon-triggered submit of whatever answers exist. Always an
    /// integrity violation, never a full completion.
    AutoPartial,
}

impl SubmitMode {
    fn label(self) -> &'static str {
        match self {
            Self::Manual { .. } => "manual",
            Self::AutoPartial => "auto_partial",
        }
    }
}

/// Finds the open attempt for (quiz, student) or creates one. Rejects when a
/// completed attempt already exists.
pub(crate) async fn start_or_resume(
    state: &AppState,
    quiz: &Quiz,
    student: &User,
) -> Result<QuizSubmission, FlowError> {
    if repositories::submissions::find_completed(state.db(), &quiz.id, &student.id)
        .await?
        .is_some()
    {
        return Err(FlowError::AlreadyAttempted);
    }

    if let Some(open) =
        repositories::submissions::find_open(state.db(), &quiz.id, &student.id).await?
    {
        return Ok(open);
    }

    let question_count = repositories::questions::count_by_quiz(state.db(), &quiz.id).await?;
    let now = primitive_now_utc();
    let id = Uuid::new_v4().to_string();

    match repositories::submissions::create_open(
        state.db(),
        &id,
        &quiz.id,
        &student.id,
        question_count as i32,
        now,
    )
    .await
    {
        Ok(submission) => Ok(submission),
        // Another request won the single-open-attempt index; reuse its row.
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            repositories::submissions::find_open(state.db(), &quiz.id, &student.id)
                .await?
                .ok_or(FlowError::AlreadyAttempted)
        }
        Err(err) => Err(err.into()),
    }
}

/// Scores the supplied answers and completes the attempt. Answers and the
/// aggregate fields commit in one transaction; per-question grading failures
/// become zero scores, never errors.
pub(crate) async fn submit(
    state: &AppState,
    quiz: &Quiz,
    student: &User,
    answers: &[SubmittedAnswer],
    mode: SubmitMode,
) -> Result<QuizSubmission, FlowError> {
    let timer = std::time::Instant::now();

    if repositories::submissions::find_completed(state.db(), &quiz.id, &student.id)
        .await?
        .is_some()
    {
        return Err(FlowError::AlreadyAttempted);
    }

    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id).await?;
    let graded = grade_questions(state, &questions, answers).await;

    let entries: Vec<GradedEntry> = questions
        .iter()
        .zip(graded.iter())
        .map(|(question, (raw_answer, scored))| GradedEntry {
            weight: question.marks,
            scored_marks: scored.scored_marks,
            answered: !raw_answer.is_empty(),
        })
        .collect();
    let aggregates = compute_aggregates(&entries, questions.len(), mode);

    let now = primitive_now_utc();
    let mut tx = state.db().begin().await?;

    let open =
        repositories::submissions::find_open_for_update(&mut *tx, &quiz.id, &student.id).await?;
    let submission_id = match open {
        Some(submission) => submission.id,
        None => {
            // Lost the race against a concurrent submit, or the quiz was
            // never opened; re-check inside the transaction.
            if repositories::submissions::find_completed(&mut *tx, &quiz.id, &student.id)
                .await?
                .is_some()
            {
                return Err(FlowError::AlreadyAttempted);
            }

            let id = Uuid::new_v4().to_string();
            repositories::submissions::create_open(
                &mut *tx,
                &id,
                &quiz.id,
                &student.id,
                questions.len() as i32,
                now,
            )
            .await?
            .id
        }
    };

    for (question, (raw_answer, scored)) in questions.iter().zip(graded.iter()) {
        let answer_id = Uuid::new_v4().to_string();
        repositories::answers::upsert(
            &mut *tx,
            repositories::answers::UpsertAnswer {
                id: &answer_id,
                submission_id: &submission_id,
                question_id: &question.id,
                user_answer: raw_answer,
                is_correct: scored.is_correct,
                ai_score: scored.ai_score,
                scored_marks: scored.scored_marks,
                code_language: scored.code_language.as_deref(),
                test_results: scored.test_results.clone(),
                passed_test_cases: scored.passed_test_cases,
                total_test_cases: scored.total_test_cases,
                now,
            },
        )
        .await?;
    }

    let finalized = repositories::submissions::finalize(
        &mut *tx,
        &submission_id,
        repositories::submissions::FinalizeSubmission {
            score: aggregates.score,
            total: aggregates.total,
            percentage: aggregates.percentage,
            passed: aggregates.passed,
            integrity_violation: aggregates.integrity_violation,
            answered_count: aggregates.answered_count,
            question_count: questions.len() as i32,
            full_completion: aggregates.full_completion,
            submitted_at: now,
            review_unlocked_at: now + Duration::minutes(REVIEW_DELAY_MINUTES),
        },
    )
    .await?;

    tx.commit().await?;

    metrics::counter!("graded_submissions_total", "mode" => mode.label()).increment(1);
    metrics::histogram!("submission_grading_seconds").record(timer.elapsed().as_secs_f64());

    tracing::info!(
        quiz_id = %quiz.id,
        student_id = %student.id,
        submission_id = %finalized.id,
        score = finalized.score,
        total = finalized.total,
        mode = mode.label(),
        "Submission graded"
    );

    Ok(finalized)
}

/// Review payload, available to the owner once the unlock delay has passed.
pub(crate) async fn result_if_unlocked(
    state: &AppState,
    submission_id: &str,
    viewer: &User,
) -> Result<SubmissionResultResponse, FlowError> {
    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(FlowError::NotFound)?;

    if submission.student_id != viewer.id {
        return Err(FlowError::NotFound);
    }
    if !submission.completed {
        return Err(FlowError::NotFound);
    }

    if let Some(unlocks_at) = submission.review_unlocked_at {
        if primitive_now_utc() < unlocks_at {
            return Err(FlowError::ReviewLocked { unlocks_at });
        }
    }

    let quiz = repositories::quizzes::find_by_id(state.db(), &submission.quiz_id)
        .await?
        .ok_or(FlowError::NotFound)?;
    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id).await?;
    let answers = repositories::answers::list_by_submission(state.db(), &submission.id).await?;

    let answer_map: HashMap<&str, &crate::db::models::QuizAnswer> =
        answers.iter().map(|answer| (answer.question_id.as_str(), answer)).collect();

    let results =
        questions.iter().map(|question| build_review(question, answer_map.get(question.id.as_str()).copied())).collect();

    Ok(SubmissionResultResponse {
        quiz_title: quiz.title,
        submission: SubmissionResponse::from(&submission),
        results,
    })
}

/// Owner-only reset: discards every answer and reverts the submission to the
/// attemptable state.
pub(crate) async fn reset_for_retake(
    state: &AppState,
    quiz_code: &str,
    submission_id: &str,
    caller: &User,
) -> Result<(), FlowError> {
    if caller.role != UserRole::Teacher {
        return Err(FlowError::PermissionDenied);
    }

    let quiz = repositories::quizzes::find_by_code(state.db(), quiz_code)
        .await?
        .ok_or(FlowError::NotFound)?;
    if quiz.created_by != caller.id {
        return Err(FlowError::PermissionDenied);
    }

    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .filter(|submission| submission.quiz_id == quiz.id)
        .ok_or(FlowError::NotFound)?;
    if !submission.completed {
        return Err(FlowError::NotFound);
    }

    let now = primitive_now_utc();
    let mut tx = state.db().begin().await?;
    let removed = repositories::answers::delete_by_submission(&mut *tx, &submission.id).await?;
    repositories::submissions::reset_for_retake(&mut *tx, &submission.id, now).await?;
    tx.commit().await?;

    tracing::info!(
        quiz_id = %quiz.id,
        submission_id = %submission.id,
        student_id = %submission.student_id,
        answers_removed = removed,
        "Submission reset for retake"
    );

    Ok(())
}

async fn grade_questions(
    state: &AppState,
    questions: &[QuizQuestion],
    answers: &[SubmittedAnswer],
) -> Vec<(String, ScoredAnswer)> {
    let answer_map: HashMap<&str, &SubmittedAnswer> =
        answers.iter().map(|answer| (answer.question_id.as_str(), answer)).collect();

    let semaphore = Arc::new(Semaphore::new(QUESTION_CONCURRENCY));
    let max_concurrent_cases = state.settings().execution().max_concurrent_cases;
    let mut handles = Vec::with_capacity(questions.len());

    for question in questions {
        let submitted = answer_map.get(question.id.as_str());
        let raw_answer =
            submitted.map(|answer| answer.answer.trim().to_string()).unwrap_or_default();
        let language = submitted.and_then(|answer| answer.language.clone());
        let question = question.clone();
        let executor = state.executor();
        let subjective = state.subjective();
        let semaphore = semaphore.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let scored = scoring::score_answer(
                &question,
                &raw_answer,
                language.as_deref(),
                executor,
                subjective,
                max_concurrent_cases,
            )
            .await;
            (raw_answer, scored)
        }));
    }

    let mut graded = Vec::with_capacity(questions.len());
    for handle in handles {
        match handle.await {
            Ok(entry) => graded.push(entry),
            Err(err) => {
                tracing::error!(error = %err, "Question grading task failed");
                graded.push((
                    String::new(),
                    ScoredAnswer { is_correct: Some(false), ..ScoredAnswer::default() },
                ));
            }
        }
    }

    graded
}

struct GradedEntry {
    weight: i32,
    scored_marks: f64,
    answered: bool,
}

struct Aggregates {
    score: f64,
    total: f64,
    percentage: f64,
    passed: bool,
    answered_count: i32,
    integrity_violation: bool,
    full_completion: bool,
}

fn compute_aggregates(entries: &[GradedEntry], question_count: usize, mode: SubmitMode) -> Aggregates {
    let total: f64 = entries.iter().map(|entry| entry.weight as f64).sum();
    let score: f64 = entries.iter().map(|entry| entry.scored_marks).sum();
    let answered_count = entries.iter().filter(|entry| entry.answered).count();

    let percentage = if total > 0.0 { score / total * 100.0 } else { 0.0 };
    let passed = percentage >= PASS_THRESHOLD_PERCENT;

    let (integrity_violation, full_completion) = match mode {
        SubmitMode::Manual { fullscreen_exit } => {
            (fullscreen_exit, answered_count == question_count && !fullscreen_exit)
        }
        SubmitMode::AutoPartial => (true, false),
    };

    Aggregates {
        score,
        total,
        percentage,
        passed,
        answered_count: answered_count as i32,
        integrity_violation,
        full_completion,
    }
}

fn build_review(question: &QuizQuestion, answer: Option<&crate::db::models::QuizAnswer>) -> QuestionReview {
    let mut review = QuestionReview {
        question_id: question.id.clone(),
        question: question.prompt.clone(),
        qtype: question.qtype,
        marks: question.marks,
        user_answer: answer.map(|answer| answer.user_answer.clone()).unwrap_or_default(),
        scored_marks: answer.map(|answer| answer.scored_marks).unwrap_or(0.0),
        is_correct: answer.and_then(|answer| answer.is_correct),
        correct_answer: None,
        sample_answer: None,
        ai_score: None,
        code_language: None,
        passed_test_cases: None,
        total_test_cases: None,
        test_results: None,
    };

    match question.qtype {
        QuestionType::Mcq => {
            review.correct_answer = correct_option_text(question);
        }
        QuestionType::Subjective => {
            review.sample_answer =
                Some(question.answer.clone().unwrap_or_else(|| "N/A".to_string()));
            review.ai_score = answer.and_then(|answer| answer.ai_score);
        }
        QuestionType::Coding => {
            review.code_language = answer.and_then(|answer| answer.code_language.clone());
            review.passed_test_cases = answer.map(|answer| answer.passed_test_cases);
            review.total_test_cases = answer.map(|answer| answer.total_test_cases);
            review.test_results =
                answer.and_then(|answer| answer.test_results.clone()).map(|json| json.0);
        }
    }

    review
}

/// Full text of the correct option, matched by its letter prefix.
fn correct_option_text(question: &QuizQuestion) -> Option<String> {
    let letter = question.answer.as_deref()?;
    question
        .options
        .0
        .iter()
        .find(|option| option.starts_with(&format!("{letter}.")))
        .cloned()
        .or_else(|| Some(letter.to_string()))
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;

    use super::*;
    use crate::core::time::primitive_now_utc;

    fn entry(weight: i32, scored_marks: f64, answered: bool) -> GradedEntry {
        GradedEntry { weight, scored_marks, answered }
    }

    #[test]
    fn empty_quiz_yields_zero_percentage_without_division() {
        let aggregates = compute_aggregates(&[], 0, SubmitMode::Manual { fullscreen_exit: false });

        assert_eq!(aggregates.total, 0.0);
        assert_eq!(aggregates.percentage, 0.0);
        assert!(!aggregates.passed);
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let aggregates = compute_aggregates(
            &[entry(10, 6.0, true)],
            1,
            SubmitMode::Manual { fullscreen_exit: false },
        );

        assert_eq!(aggregates.percentage, 60.0);
        assert!(aggregates.passed);
        assert!(aggregates.full_completion);
        assert!(!aggregates.integrity_violation);
    }

    #[test]
    fn fullscreen_exit_blocks_full_completion() {
        let aggregates = compute_aggregates(
            &[entry(10, 10.0, true)],
            1,
            SubmitMode::Manual { fullscreen_exit: true },
        );

        assert!(aggregates.integrity_violation);
        assert!(!aggregates.full_completion);
        assert!(aggregates.passed);
    }

    #[test]
    fn unanswered_questions_block_full_completion() {
        let aggregates = compute_aggregates(
            &[entry(5, 5.0, true), entry(5, 0.0, false)],
            2,
            SubmitMode::Manual { fullscreen_exit: false },
        );

        assert_eq!(aggregates.answered_count, 1);
        assert!(!aggregates.full_completion);
    }

    #[test]
    fn auto_partial_forces_violation_and_blocks_completion_flag() {
        let aggregates =
            compute_aggregates(&[entry(10, 10.0, true)], 1, SubmitMode::AutoPartial);

        assert!(aggregates.integrity_violation);
        assert!(!aggregates.full_completion);
        assert!(aggregates.passed);
    }

    #[test]
    fn correct_option_resolves_to_full_text() {
        let now = primitive_now_utc();
        let question = QuizQuestion {
            id: "q-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            prompt: "Capital of France?".to_string(),
            qtype: QuestionType::Mcq,
            marks: 10,
            options: Json(vec![
                "A. London".to_string(),
                "B. Paris".to_string(),
            ]),
            answer: Some("B".to_string()),
            test_cases: Json(Vec::new()),
            allowed_languages: Json(Vec::new()),
            time_limit_seconds: None,
            memory_limit_mb: None,
            sample_input: None,
            sample_output: None,
            starter_code: Json(serde_json::json!({})),
            order_index: 0,
            created_at: now,
        };

        assert_eq!(correct_option_text(&question), Some("B. Paris".to_string()));
    }
}
