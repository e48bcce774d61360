//! `OfflineInterviewer`: no model, no network.
//!
//! Serves questions from a small built-in bank keyed by interview type and
//! accepts every answer.  Used when `llm.provider = "Offline"` and as a
//! predictable collaborator for local demos.

use async_trait::async_trait;

use crate::interview::{Answer, InterviewType, SessionConfig};

use super::interviewer::{Evaluation, Interviewer, LlmError};

const HR_BANK: &[&str] = &[
    "Tell me about yourself and what drew you to this role.",
    "Describe a time you disagreed with a teammate. How did you resolve it?",
    "What is the accomplishment you are most proud of, and why?",
    "Tell me about a project that failed. What did you learn?",
    "Where do you want to be in three years?",
    "How do you prioritise when everything feels urgent?",
];

const TECHNICAL_BANK: &[&str] = &[
    "Walk me through the architecture of a system you built recently.",
    "How would you find and fix a memory leak in a long-running service?",
    "Explain the trade-offs between SQL and NoSQL storage for a new product.",
    "What happens, step by step, when you type a URL into a browser?",
    "How do you decide what to test, and at which level?",
    "Describe how you would design a rate limiter.",
];

const CODING_BANK: &[&str] = &[
    "How would you detect a cycle in a linked list? Talk through the complexity.",
    "Explain how you would merge k sorted arrays efficiently.",
    "Describe an algorithm to find the longest substring without repeating characters.",
    "How would you implement an LRU cache?",
    "Walk me through reversing a binary tree, iteratively and recursively.",
    "How would you find the k most frequent words in a large file?",
];

#[derive(Debug, Default, Clone)]
pub struct OfflineInterviewer {
    question_count: usize,
}

impl OfflineInterviewer {
    pub fn new(question_count: usize) -> Self {
        Self {
            question_count: question_count.max(1),
        }
    }

    /// Questions for `interview_type`, interleaving banks for mixed rounds.
    pub fn questions_for(&self, interview_type: InterviewType) -> Vec<String> {
        let picked: Vec<&str> = match interview_type {
            InterviewType::Hr => HR_BANK.to_vec(),
            InterviewType::Technical => TECHNICAL_BANK.to_vec(),
            InterviewType::Coding => CODING_BANK.to_vec(),
            InterviewType::Mixed => HR_BANK
                .iter()
                .zip(TECHNICAL_BANK.iter())
                .flat_map(|(a, b)| [*a, *b])
                .collect(),
        };
        picked
            .into_iter()
            .cycle()
            .take(self.question_count)
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl Interviewer for OfflineInterviewer {
    async fn generate_questions(&self, config: &SessionConfig) -> Result<Vec<String>, LlmError> {
        Ok(self.questions_for(config.interview_type))
    }

    async fn evaluate_answer(
        &self,
        _current: &str,
        next: Option<&str>,
        answer: &Answer,
    ) -> Result<Evaluation, LlmError> {
        let ack = if answer.is_timeout() {
            "That's time for this one."
        } else {
            "Thank you."
        };
        let spoken = match next {
            Some(next) => format!("{ack} Next question: {next}"),
            None => ack.to_string(),
        };
        Ok(Evaluation::advance(spoken))
    }
}
