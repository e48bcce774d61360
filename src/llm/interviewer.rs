//! Core `Interviewer` trait and `ApiInterviewer` implementation.
//!
//! `ApiInterviewer` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint: Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM, etc.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::interview::{Answer, SessionConfig};
use crate::llm::parse::{parse_evaluation, parse_questions};
use crate::llm::prompt::PromptBuilder;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the interviewer model.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("LLM endpoint returned status {0}")]
    Status(u16),

    /// The reply could not be read as the expected JSON shape.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if let Some(status) = e.status() {
            LlmError::Status(status.as_u16())
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// The evaluator's verdict on one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// What the interviewer says next (feedback, follow-up, or transition).
    pub spoken_response: String,
    /// `true` moves on to the next question; `false` asks a follow-up.
    pub advance: bool,
}

impl Evaluation {
    pub fn advance(spoken_response: impl Into<String>) -> Self {
        Self {
            spoken_response: spoken_response.into(),
            advance: true,
        }
    }

    pub fn follow_up(spoken_response: impl Into<String>) -> Self {
        Self {
            spoken_response: spoken_response.into(),
            advance: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Interviewer trait
// ---------------------------------------------------------------------------

/// The question generator and answer evaluator.
///
/// Implementors must be `Send + Sync` so they can be shared with spawned
/// request tasks (`Arc<dyn Interviewer>`).
#[async_trait]
pub trait Interviewer: Send + Sync {
    /// Produce the full question list for a session.
    async fn generate_questions(&self, config: &SessionConfig) -> Result<Vec<String>, LlmError>;

    /// Judge `answer` to `current`.  `next` is `None` on the last question.
    async fn evaluate_answer(
        &self,
        current: &str,
        next: Option<&str>,
        answer: &Answer,
    ) -> Result<Evaluation, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiInterviewer
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct ApiInterviewer {
    client: reqwest::Client,
    config: LlmConfig,
    prompt_builder: PromptBuilder,
    question_count: usize,
}

impl ApiInterviewer {
    /// Build an `ApiInterviewer` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &LlmConfig, question_count: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            prompt_builder: PromptBuilder::new(),
            question_count: question_count.max(1),
        }
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// One chat round-trip; returns the assistant message text.
    async fn chat(&self, system_msg: String, user_msg: String, max_tokens: u32) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  max_tokens
        });

        let mut req = self.client.post(&url).json(&body);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?.error_for_status()?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LlmError::EmptyResponse)?
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl Interviewer for ApiInterviewer {
    async fn generate_questions(&self, config: &SessionConfig) -> Result<Vec<String>, LlmError> {
        let (system_msg, user_msg) = self
            .prompt_builder
            .questions_chat(config, self.question_count);
        let reply = self.chat(system_msg, user_msg, 1024).await?;
        let questions = parse_questions(&reply, self.question_count)?;
        log::info!("llm: generated {} questions", questions.len());
        Ok(questions)
    }

    async fn evaluate_answer(
        &self,
        current: &str,
        next: Option<&str>,
        answer: &Answer,
    ) -> Result<Evaluation, LlmError> {
        let (system_msg, user_msg) = self.prompt_builder.evaluation_chat(current, next, answer);
        let reply = self.chat(system_msg, user_msg, 384).await?;
        let evaluation = parse_evaluation(&reply)?;
        log::debug!("llm: evaluation advance={}", evaluation.advance);
        Ok(evaluation)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;

    fn make_config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::OpenAiCompatible,
            base_url: "http://localhost:11434/".into(),
            api_key: api_key.map(|s| s.to_string()),
            model: "qwen2.5:7b".into(),
            temperature: 0.7,
            timeout_secs: 10,
        }
    }

    #[test]
    fn from_config_builds_with_or_without_key() {
        let _ = ApiInterviewer::from_config(&make_config(None), 5);
        let _ = ApiInterviewer::from_config(&make_config(Some("")), 5);
        let _ = ApiInterviewer::from_config(&make_config(Some("sk-test-1234")), 5);
    }

    #[test]
    fn question_count_is_at_least_one() {
        let interviewer = ApiInterviewer::from_config(&make_config(None), 0);
        assert_eq!(interviewer.question_count(), 1);
    }

    #[test]
    fn interviewer_is_object_safe() {
        let interviewer: Box<dyn Interviewer> =
            Box::new(ApiInterviewer::from_config(&make_config(None), 5));
        drop(interviewer);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error_not_a_panic() {
        let mut config = make_config(None);
        // Nothing listens on the discard port.
        config.base_url = "http://127.0.0.1:9".into();
        config.timeout_secs = 2;
        let interviewer = ApiInterviewer::from_config(&config, 3);
        let result = interviewer
            .evaluate_answer("Q?", None, &Answer::Given("A".into()))
            .await;
        assert!(matches!(
            result,
            Err(LlmError::Request(_)) | Err(LlmError::Timeout)
        ));
    }
}
