//! Session recording: capture source → segment buffer → one artifact.
//!
//! # Pipeline
//!
//! ```text
//! MediaSource::next_chunk → SegmentBuffer (fixed-size segments)
//!           → finish() → Recording { mime_type, bytes } → SessionStore
//! ```

pub mod buffer;
#[cfg(feature = "microphone")]
pub mod mic;
#[allow(clippy::module_inception)]
pub mod recorder;

pub use buffer::SegmentBuffer;
#[cfg(feature = "microphone")]
pub use mic::MicrophoneSource;
pub use recorder::{ChannelSource, MediaSource, Recording, RecorderError, SessionRecorder};
