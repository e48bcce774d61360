//! Webcam integrity proctoring.
//!
//! # Pipeline
//!
//! ```text
//! FrameSource → FaceDetector → FrameClassifier → WarningDebouncer → ProctorEvent (mpsc)
//! ```
//!
//! The monitor is armed only while a dialogue is in progress; the dialogue
//! controller drains [`ProctorEvent`]s ahead of every other event so an
//! integrity warning always wins a race with ordinary turn-taking.

pub mod classify;
pub mod debounce;
pub mod frame;
pub mod monitor;

pub use classify::{average_luminance, Classification, FrameClassifier, WarningKind};
pub use debounce::WarningDebouncer;
pub use frame::{FaceBox, FaceDetector, Frame, FrameSource, ProctorError};
pub use monitor::{ProctorEvent, ProctorMonitor};
