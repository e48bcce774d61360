//! Text-mode synthesizer: prints the interviewer's line and holds for roughly
//! as long as reading it aloud would take.

use std::time::Duration;

use async_trait::async_trait;

use super::backend::{SpeechError, SpeechSynthesizer};

pub struct ConsoleSynthesizer {
    words_per_minute: u32,
}

impl ConsoleSynthesizer {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
        }
    }

    /// Simulated playback time for `text`.
    pub fn reading_time(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        Duration::from_millis(words * 60_000 / self.words_per_minute as u64)
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        println!("\nInterviewer: {text}");
        tokio::time::sleep(self.reading_time(text)).await;
        Ok(())
    }

    fn cancel(&self) {
        log::debug!("console-tts: playback cancelled");
    }
}
