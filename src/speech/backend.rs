//! Speech backends.
//!
//! [`SpeechSynthesizer`] plays interviewer text; [`SpeechRecognizer`] turns
//! the candidate's voice into text segments delivered through a
//! [`TranscriptSink`].  Both are object-safe and `Send + Sync` so they can be
//! held behind an `Arc<dyn …>` and driven from spawned tasks.

use async_trait::async_trait;
use thiserror::Error;

use crate::dialogue::{EventSender, SessionEvent};

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    /// Microphone or audio output denied / missing.
    #[error("speech device unavailable: {0}")]
    Device(String),

    /// The backend was asked to do something it is not in a state to do.
    #[error("speech backend in an inconsistent state: {0}")]
    InvalidState(String),

    /// Playback or recognition failed part-way.
    #[error("speech backend failed: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Play `text`, resolving once playback has finished.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Stop any playback in progress.  Must be safe to call when idle.
    fn cancel(&self);
}

pub trait SpeechRecognizer: Send + Sync {
    /// Open the microphone and stream recognised text into `sink`.
    fn start(&self, sink: TranscriptSink) -> Result<(), SpeechError>;

    /// Close the microphone.
    fn stop(&self) -> Result<(), SpeechError>;
}

// ---------------------------------------------------------------------------
// TranscriptSink
// ---------------------------------------------------------------------------

/// Where a recogniser delivers text for one listening session.
///
/// Each sink is tagged with the listening generation it was opened for, so
/// text arriving after the mic was closed is recognised as stale.
#[derive(Debug, Clone)]
pub struct TranscriptSink {
    events: EventSender,
    generation: u64,
}

impl TranscriptSink {
    pub(crate) fn new(events: EventSender, generation: u64) -> Self {
        Self { events, generation }
    }

    /// Deliver recognised text.  `is_final` segments are committed to the
    /// transcript; interim text replaces the previous interim text.
    ///
    /// Returns `false` once the session is gone.
    pub fn push(&self, text: impl Into<String>, is_final: bool) -> bool {
        self.events
            .send(SessionEvent::Transcript {
                generation: self.generation,
                text: text.into(),
                is_final,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
