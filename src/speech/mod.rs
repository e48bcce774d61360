pub mod backend;
pub mod console;
pub mod coordinator;

pub use backend::{SpeechError, SpeechRecognizer, SpeechSynthesizer, TranscriptSink};
pub use console::ConsoleSynthesizer;
pub use coordinator::{FinishOutcome, SpeechCoordinator};
