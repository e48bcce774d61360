//! Interview turn-taking.
//!
//! # Pipeline
//!
//! ```text
//! commands / completions ─▶ SessionEvent queue ─┐
//!                                               ├─▶ DialogueController ─▶ SessionPhase (watch)
//! ProctorMonitor ─▶ ProctorEvent queue (first) ─┘           │
//!                                                           └─▶ SessionReport
//! ```

pub mod controller;
pub mod events;
pub mod state;
pub mod timer;

pub use controller::{Collaborators, DialogueController, SessionUpdate};
pub use events::{event_channel, EventReceiver, EventSender, SessionEvent};
pub use state::{Notice, NoticeKind, Session, SessionPhase, SessionReport, Warning};
pub use timer::{AnswerTimer, TickOutcome, TimerState};
