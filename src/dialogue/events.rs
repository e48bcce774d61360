//! Inbound events for the dialogue controller.
//!
//! Every asynchronous completion (collaborator replies, speech playback,
//! the settle delay, timer ticks, recogniser output) is posted as a
//! [`SessionEvent`] into one queue and applied one at a time.  Completions
//! carry the id of the request, utterance or generation that produced them
//! so stale ones can be recognised and dropped.

use tokio::sync::mpsc;

use crate::llm::{Evaluation, LlmError};
use crate::speech::SpeechError;

#[derive(Debug)]
pub enum SessionEvent {
    // ── Commands ────────────────────────────────────────────────────────
    /// Begin the interview.
    Start,
    /// Hand in an answer.  Empty text means "use the live transcript".
    Submit(String),
    /// Re-open the mic after an interruption (always a full timer reset).
    ResumeListening,
    /// Re-issue the collaborator request that last failed.
    Retry,
    /// Finish the interview.
    End,

    // ── Completions ─────────────────────────────────────────────────────
    QuestionsReady {
        request: u64,
        result: Result<Vec<String>, LlmError>,
    },
    EvaluationReady {
        request: u64,
        result: Result<Evaluation, LlmError>,
    },
    SpeechFinished {
        utterance: u64,
        result: Result<(), SpeechError>,
    },
    SettleElapsed {
        utterance: u64,
    },
    TimerTick {
        generation: u64,
    },
    Transcript {
        generation: u64,
        text: String,
        is_final: bool,
    },
}

impl SessionEvent {
    /// Collaborator replies are held back while the dialogue is interrupted
    /// and replayed once proctoring clears.
    pub fn is_collaborator_reply(&self) -> bool {
        matches!(
            self,
            SessionEvent::QuestionsReady { .. } | SessionEvent::EvaluationReady { .. }
        )
    }
}

/// Sending half of the event queue.  Unbounded so device callbacks on
/// foreign threads can post without awaiting.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
