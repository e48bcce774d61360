//! Session phase and the data the dialogue controller owns.
//!
//! [`SessionPhase`] is the single source of truth for what the UI and the
//! gating logic may do.  The controller is its only writer and publishes it
//! through a `tokio::sync::watch` channel; everything else reads.
//!
//! [`Session`] holds the questions, the append-only transcript and the
//! warning log.  [`SessionReport`] is what leaves the core at the end.

use serde::Serialize;
use tokio::time::Instant;

use crate::interview::{Question, SessionConfig, Turn};
use crate::persist::SessionId;
use crate::proctor::WarningKind;

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// States of the interview dialogue.
///
/// ```text
/// Idle ──start──▶ AwaitingFirstQuestion ──questions──▶ Speaking
/// Speaking ──speech done + settle──▶ Listening
/// Listening ──submit / timeout──▶ Evaluating
/// Evaluating ──reply──▶ Speaking            (outro on the last question)
/// any non-terminal ──warning──▶ Interrupted ──cleared──▶ held phase
/// any ──end──▶ Ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionPhase {
    /// Session created, nothing requested yet.
    #[default]
    Idle,
    /// Waiting for the question generator.
    AwaitingFirstQuestion,
    /// The interviewer is talking (or settling before the mic opens).
    Speaking,
    /// The answer window is open.
    Listening,
    /// The answer is with the evaluator.
    Evaluating,
    /// A proctoring warning preempted the dialogue.
    Interrupted,
    /// Terminal.
    Ended,
}

impl SessionPhase {
    /// Whether proctoring warnings may interrupt this phase.
    ///
    /// ```
    /// use mock_interview::dialogue::SessionPhase;
    ///
    /// assert!(!SessionPhase::Idle.is_proctored());
    /// assert!(SessionPhase::AwaitingFirstQuestion.is_proctored());
    /// assert!(SessionPhase::Interrupted.is_proctored());
    /// assert!(!SessionPhase::Ended.is_proctored());
    /// ```
    pub fn is_proctored(&self) -> bool {
        !matches!(self, SessionPhase::Idle | SessionPhase::Ended)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Ended)
    }

    /// Whether the answer box accepts a submission.
    pub fn accepts_answer(&self) -> bool {
        matches!(self, SessionPhase::Listening)
    }

    /// A short human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Ready",
            SessionPhase::AwaitingFirstQuestion => "Preparing questions",
            SessionPhase::Speaking => "Interviewer speaking",
            SessionPhase::Listening => "Your turn",
            SessionPhase::Evaluating => "Thinking",
            SessionPhase::Interrupted => "Paused",
            SessionPhase::Ended => "Finished",
        }
    }
}

// ---------------------------------------------------------------------------
// Warning / Notice
// ---------------------------------------------------------------------------

/// A proctoring violation recorded in the session's integrity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Milliseconds since the session was created.
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeKind {
    /// Question generator or evaluator failed; progress is halted.
    Collaborator,
    /// Camera or microphone unavailable; a feature degraded.
    Device,
    /// Recording could not be persisted.
    Upload,
}

/// A recoverable problem reported to the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One interview: questions, progress, transcript, integrity log.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    questions: Vec<Question>,
    index: usize,
    answered: usize,
    turns: Vec<Turn>,
    warnings: Vec<Warning>,
    created: Instant,
}

impl Session {
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        Self {
            id,
            config,
            questions: Vec::new(),
            index: 0,
            answered: 0,
            turns: Vec::new(),
            warnings: Vec::new(),
            created: Instant::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Install the generated questions.  Questions are set once; later calls
    /// are ignored and return `false`.
    pub fn set_questions(&mut self, questions: Vec<String>) -> bool {
        if !self.questions.is_empty() {
            return false;
        }
        self.questions = questions.into_iter().map(Question::new).collect();
        true
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    pub fn next_question(&self) -> Option<&Question> {
        self.questions.get(self.index + 1)
    }

    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty() && self.index + 1 >= self.questions.len()
    }

    /// Record the current question as accepted and move to the next one.
    ///
    /// The index never moves past the last question; accepting the last one
    /// only bumps the answered count.
    pub fn accept_current(&mut self) {
        if self.answered <= self.index {
            self.answered = self.index + 1;
        }
        if !self.is_last_question() {
            self.index += 1;
        }
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    pub fn is_complete(&self) -> bool {
        !self.questions.is_empty() && self.answered == self.questions.len()
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Append a warning raised at `at` (monitor clock).
    pub fn push_warning(&mut self, kind: WarningKind, at: Instant) -> Warning {
        let warning = Warning {
            kind,
            at_ms: at.saturating_duration_since(self.created).as_millis() as u64,
        };
        self.warnings.push(warning);
        warning
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_report(self, notices: Vec<Notice>) -> SessionReport {
        SessionReport {
            session_id: self.id,
            config: self.config,
            questions: self.questions.iter().map(|q| q.text().to_string()).collect(),
            questions_answered: self.answered,
            turns: self.turns,
            warnings: self.warnings,
            notices,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionReport
// ---------------------------------------------------------------------------

/// Everything the downstream feedback screen needs.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub config: SessionConfig,
    pub questions: Vec<String>,
    pub questions_answered: usize,
    pub turns: Vec<Turn>,
    pub warnings: Vec<Warning>,
    pub notices: Vec<Notice>,
}

impl SessionReport {
    /// Warning kinds in the order they were raised.
    pub fn warning_kinds(&self) -> Vec<WarningKind> {
        self.warnings.iter().map(|w| w.kind).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
