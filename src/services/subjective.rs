use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;

/// Ratio used whenever the scoring service is unreachable or returns
/// something unusable. Grading must never hard-fail a submission.
pub(crate) const DEFAULT_RATIO: f64 = 0.5;

const SCORING_SYSTEM_PROMPT: &str = "You grade short free-text answers. \
Rate the student's answer against the model answer for accuracy, \
completeness, demonstrated understanding, and relevance. \
Reply with a single number between 0.0 and 1.0 and nothing else.";

#[async_trait]
pub(crate) trait SubjectiveScorer: Send + Sync {
    /// Returns a ratio in [0.0, 1.0].
    async fn score(&self, question: &str, student_answer: &str, model_answer: &str) -> f64;
}

#[derive(Debug, Clone)]
pub(crate) struct AiSubjectiveScorer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl AiSubjectiveScorer {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build AI scoring HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
            temperature: settings.ai().ai_temperature,
        })
    }

    async fn request_ratio(
        &self,
        question: &str,
        student_answer: &str,
        model_answer: &str,
    ) -> Result<f64> {
        let user_prompt = format!(
            "Question: {question}\n\nStudent Answer: {student_answer}\n\nModel Answer: {model_answer}\n\nScore (0.0 to 1.0):"
        );

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SCORING_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call scoring API")?;

        let status = response.status();
        let body: Value = response.json().await.context("Failed to read scoring API body")?;

        if !status.is_success() {
            anyhow::bail!("scoring API returned status {status}: {body}");
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .context("Missing scoring API response content")?;

        Ok(extract_ratio(content).unwrap_or(DEFAULT_RATIO))
    }
}

#[async_trait]
impl SubjectiveScorer for AiSubjectiveScorer {
    async fn score(&self, question: &str, student_answer: &str, model_answer: &str) -> f64 {
        match self.request_ratio(question, student_answer, model_answer).await {
            Ok(ratio) => ratio.clamp(0.0, 1.0),
            Err(err) => {
                tracing::warn!(error = %err, "Subjective scoring unavailable; using default ratio");
                DEFAULT_RATIO
            }
        }
    }
}

/// Pulls the first decimal number out of the model's reply.
pub(crate) fn extract_ratio(content: &str) -> Option<f64> {
    let bytes = content.as_bytes();
    let mut start = None;

    for (index, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_digit() || *byte == b'.' {
            if start.is_none() {
                start = Some(index);
            }
        } else if let Some(from) = start {
            if let Some(value) = parse_number(&content[from..index]) {
                return Some(value);
            }
            start = None;
        }
    }

    start.and_then(|from| parse_number(&content[from..]))
}

fn parse_number(run: &str) -> Option<f64> {
    run.trim_matches('.').parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_number() {
        assert_eq!(extract_ratio("0.8"), Some(0.8));
        assert_eq!(extract_ratio("1"), Some(1.0));
    }

    #[test]
    fn extract_number_with_surrounding_text() {
        assert_eq!(extract_ratio("Score: 0.75 out of 1.0"), Some(0.75));
        assert_eq!(extract_ratio("I would rate this .6"), Some(0.6));
    }

    #[test]
    fn extract_from_unusable_content() {
        assert_eq!(extract_ratio("no digits here"), None);
        assert_eq!(extract_ratio(""), None);
        assert_eq!(extract_ratio("..."), None);
    }
}
