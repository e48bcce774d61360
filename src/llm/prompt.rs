//! Prompt builder for question generation and answer evaluation.
//!
//! [`PromptBuilder`] produces `(system_msg, user_msg)` pairs for any
//! OpenAI-compatible `/v1/chat/completions` endpoint.  Both prompts ask for
//! a bare JSON reply; [`crate::llm::parse`] tolerates the usual deviations.

use crate::interview::{Answer, SessionConfig};

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const QUESTIONS_SYSTEM: &str = "\
You are an experienced technical interviewer preparing a mock interview.
Task: Write the questions you will ask the candidate, in the order you will ask them.

Rules:
1. Match the role, experience level, interview type and difficulty exactly.
2. When a company style is given, phrase questions the way that company interviews.
3. When resume details are given, ground at least one question in them.
4. Each question must be answerable aloud in under two minutes.
5. Reply with ONLY a JSON object: {\"questions\": [\"...\", \"...\"]}";

const EVALUATION_SYSTEM: &str = "\
You are a friendly but rigorous interviewer running a live mock interview.
Task: React to the candidate's spoken answer and decide whether to move on.

Rules:
1. If the answer is vague, off-topic or very short, ask ONE focused follow-up and set advance to false.
2. If the answer is reasonable, acknowledge it in one sentence and set advance to true.
3. When advancing and a next question is given, end your response by asking it verbatim.
4. When advancing and there is no next question, thank the candidate briefly.
5. If the candidate ran out of time, say so kindly and set advance to true.
6. Keep spoken_response under 60 words; it will be read aloud.
7. Reply with ONLY a JSON object: {\"spoken_response\": \"...\", \"advance\": true|false}";

/// Marker the evaluator sees when the timer ran out with nothing captured.
const TIMEOUT_NOTE: &str = "(The candidate did not answer before the time limit.)";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds interviewer prompts in chat-message format.
///
/// # Example
/// ```rust
/// use mock_interview::interview::{CompanyMode, ExperienceLevel, InterviewType, Role, SessionConfig};
/// use mock_interview::llm::PromptBuilder;
///
/// let config = SessionConfig::new(
///     Role::BackendDev,
///     ExperienceLevel::OneToThree,
///     InterviewType::Technical,
///     CompanyMode::Generic,
/// );
/// let (system, user) = PromptBuilder::new().questions_chat(&config, 5);
/// assert!(system.contains("JSON"));
/// assert!(user.contains("Number of questions: 5"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Prompt for the full question list.
    pub fn questions_chat(&self, config: &SessionConfig, count: usize) -> (String, String) {
        let mut user_msg = String::with_capacity(1024);
        user_msg.push_str(&format!("Role: {}\n", config.role.label()));
        user_msg.push_str(&format!(
            "Experience level: {}\n",
            config.experience_level.label()
        ));
        user_msg.push_str(&format!(
            "Interview type: {}\n",
            config.interview_type.label()
        ));
        user_msg.push_str(&format!("Company style: {}\n", config.company_mode.label()));
        user_msg.push_str(&format!("Difficulty: {}\n", config.difficulty.label()));
        user_msg.push_str(&format!("Number of questions: {count}\n"));

        if let Some(resume) = config.resume_text.as_deref() {
            user_msg.push_str("\nCandidate resume:\n");
            user_msg.push_str(resume);
            user_msg.push('\n');
        }

        (QUESTIONS_SYSTEM.to_string(), user_msg)
    }

    /// Prompt for judging one answer.
    pub fn evaluation_chat(
        &self,
        current: &str,
        next: Option<&str>,
        answer: &Answer,
    ) -> (String, String) {
        let mut user_msg = String::with_capacity(512);
        user_msg.push_str(&format!("Current question: {current}\n"));
        match next {
            Some(next) => user_msg.push_str(&format!("Next question: {next}\n")),
            None => user_msg.push_str("Next question: (none, this is the last question)\n"),
        }
        user_msg.push_str("\nCandidate answer:\n");
        match answer {
            Answer::Given(text) => user_msg.push_str(text),
            Answer::TimedOut => user_msg.push_str(TIMEOUT_NOTE),
        }
        user_msg.push('\n');

        (EVALUATION_SYSTEM.to_string(), user_msg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
