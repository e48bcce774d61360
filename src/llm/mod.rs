//! Interviewer model module for mock interviews.
//!
//! This module provides:
//! * [`Interviewer`]: async trait implemented by all interviewer backends.
//! * [`ApiInterviewer`]: OpenAI-compatible REST API interviewer.
//! * [`OfflineInterviewer`]: built-in question bank, accepts every answer.
//! * [`PromptBuilder`]: builds question-generation and evaluation prompts.
//! * [`Evaluation`]: the evaluator's `{spoken_response, advance}` verdict.
//! * [`LlmError`]: error variants for model operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mock_interview::config::AppConfig;
//! use mock_interview::interview::{
//!     Answer, CompanyMode, ExperienceLevel, InterviewType, Role, SessionConfig,
//! };
//! use mock_interview::llm::{ApiInterviewer, Interviewer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let interviewer =
//!         ApiInterviewer::from_config(&config.llm, config.dialogue.question_count);
//!
//!     let session = SessionConfig::new(
//!         Role::BackendDev,
//!         ExperienceLevel::OneToThree,
//!         InterviewType::Technical,
//!         CompanyMode::Generic,
//!     );
//!     let questions = interviewer.generate_questions(&session).await.unwrap();
//!     let verdict = interviewer
//!         .evaluate_answer(&questions[0], questions.get(1).map(String::as_str), &Answer::TimedOut)
//!         .await
//!         .unwrap();
//!     println!("{}", verdict.spoken_response);
//! }
//! ```

pub mod interviewer;
pub mod offline;
pub mod parse;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use interviewer::{ApiInterviewer, Evaluation, Interviewer, LlmError};
pub use offline::OfflineInterviewer;
pub use prompt::PromptBuilder;
