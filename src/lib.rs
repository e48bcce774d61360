//! Mock interview orchestrator.
//!
//! Drives a spoken interview turn by turn: questions come from an
//! [`llm::Interviewer`], are spoken through the [`speech`] coordinator, and
//! answers are captured, timed and evaluated by the
//! [`dialogue::DialogueController`].  A [`proctor::ProctorMonitor`] watches
//! the camera and preempts the dialogue on integrity warnings, while the
//! [`recorder`] keeps capturing for upload through [`persist`].

pub mod config;
pub mod dialogue;
pub mod interview;
pub mod llm;
pub mod persist;
pub mod proctor;
pub mod recorder;
pub mod resume;
pub mod speech;
