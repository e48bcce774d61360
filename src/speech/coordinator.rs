//! Speech I/O coordination: one owner for the speaker and the microphone.
//!
//! [`SpeechCoordinator`] guarantees that the interviewer is never heard while
//! the mic is open:
//!
//! ```text
//! speak(text, auto_listen)
//!   └─▶ cancel playback, close mic, spawn synth.speak ──▶ SpeechFinished{utterance}
//!
//! on_finished(utterance)
//!   └─▶ auto_listen && !interrupted → sleep(settle) ──▶ SettleElapsed{utterance}
//!
//! on_settled(utterance)  → true: caller opens the answer window
//! ```
//!
//! Every playback and settle is tagged with an utterance id; anything that
//! completes for an utterance that has since been cancelled is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::dialogue::{EventSender, SessionEvent};

use super::backend::{SpeechError, SpeechRecognizer, SpeechSynthesizer, TranscriptSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Idle,
    Speaking { utterance: u64, auto_listen: bool },
    Settling { utterance: u64 },
    Listening { generation: u64 },
}

/// How a playback completion was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The utterance was cancelled or superseded.
    Stale,
    /// Playback done; nothing further scheduled.
    Done,
    /// Playback done; the settle delay is running.
    Settling,
}

#[derive(Debug, Default)]
struct LiveTranscript {
    committed: String,
    interim: String,
}

impl LiveTranscript {
    fn commit(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            if !self.committed.is_empty() {
                self.committed.push(' ');
            }
            self.committed.push_str(text);
        }
        self.interim.clear();
    }

    fn text(&self) -> String {
        match (self.committed.is_empty(), self.interim.trim().is_empty()) {
            (_, true) => self.committed.clone(),
            (true, false) => self.interim.trim().to_string(),
            (false, false) => format!("{} {}", self.committed, self.interim.trim()),
        }
    }
}

pub struct SpeechCoordinator {
    synth: Arc<dyn SpeechSynthesizer>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    events: EventSender,
    settle: Duration,

    activity: Activity,
    interrupted: bool,
    next_utterance: u64,
    listen_generation: u64,
    playback: Option<JoinHandle<()>>,
    settle_task: Option<JoinHandle<()>>,
    transcript: LiveTranscript,
}

impl SpeechCoordinator {
    /// `recognizer = None` means typed answers only.
    pub fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        events: EventSender,
        settle: Duration,
    ) -> Self {
        Self {
            synth,
            recognizer,
            events,
            settle,
            activity: Activity::Idle,
            interrupted: false,
            next_utterance: 0,
            listen_generation: 0,
            playback: None,
            settle_task: None,
            transcript: LiveTranscript::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Play `text`, replacing anything already playing.
    ///
    /// Returns the utterance id, or `None` when an interruption is active.
    pub fn speak(&mut self, text: impl Into<String>, auto_listen: bool) -> Option<u64> {
        if self.interrupted {
            log::debug!("speech: speak ignored while interrupted");
            return None;
        }

        self.cancel_playback();
        self.close_mic();

        self.next_utterance += 1;
        let utterance = self.next_utterance;
        let text = text.into();
        let synth = Arc::clone(&self.synth);
        let events = self.events.clone();

        self.playback = Some(tokio::spawn(async move {
            let result = synth.speak(&text).await;
            let _ = events.send(SessionEvent::SpeechFinished { utterance, result });
        }));
        self.activity = Activity::Speaking {
            utterance,
            auto_listen,
        };
        Some(utterance)
    }

    /// Absorb a playback completion.
    pub fn on_finished(&mut self, utterance: u64, result: Result<(), SpeechError>) -> FinishOutcome {
        let auto_listen = match self.activity {
            Activity::Speaking {
                utterance: current,
                auto_listen,
            } if current == utterance => auto_listen,
            _ => return FinishOutcome::Stale,
        };
        self.playback = None;

        if let Err(e) = result {
            log::warn!("speech: playback of utterance {utterance} failed: {e}");
        }

        if !auto_listen || self.interrupted {
            self.activity = Activity::Idle;
            return FinishOutcome::Done;
        }

        let events = self.events.clone();
        let settle = self.settle;
        self.settle_task = Some(tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let _ = events.send(SessionEvent::SettleElapsed { utterance });
        }));
        self.activity = Activity::Settling { utterance };
        FinishOutcome::Settling
    }

    /// Absorb the end of a settle delay.  `true` means the caller should open
    /// the answer window now.
    pub fn on_settled(&mut self, utterance: u64) -> bool {
        match self.activity {
            Activity::Settling { utterance: current } if current == utterance => {
                self.settle_task = None;
                self.activity = Activity::Idle;
                !self.interrupted
            }
            _ => false,
        }
    }

    /// Playing, or settling after playback.
    pub fn is_speaking(&self) -> bool {
        matches!(
            self.activity,
            Activity::Speaking { .. } | Activity::Settling { .. }
        )
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Open the microphone.  A no-op when already listening or interrupted.
    ///
    /// Any playback is cancelled first.  With no recogniser configured this
    /// still enters the listening state so typed answers work.
    pub fn listen(&mut self) -> Result<(), SpeechError> {
        if self.interrupted {
            log::debug!("speech: listen ignored while interrupted");
            return Ok(());
        }
        if self.is_listening() {
            return Ok(());
        }
        if self.is_speaking() {
            self.cancel_playback();
        }

        self.listen_generation += 1;
        let generation = self.listen_generation;
        self.activity = Activity::Listening { generation };

        if let Some(recognizer) = &self.recognizer {
            let sink = TranscriptSink::new(self.events.clone(), generation);
            if let Err(e) = recognizer.start(sink) {
                log::warn!("speech: recogniser failed to start: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Close the microphone.  Idempotent: stopping while not listening is a
    /// successful no-op.
    pub fn stop_listening(&mut self) -> Result<(), SpeechError> {
        if !self.is_listening() {
            return Ok(());
        }
        self.activity = Activity::Idle;
        self.listen_generation += 1;

        match &self.recognizer {
            Some(recognizer) => recognizer.stop().or_else(|e| {
                if self.interrupted {
                    log::warn!("speech: ignoring recogniser stop failure during interruption: {e}");
                    Ok(())
                } else {
                    Err(e)
                }
            }),
            None => Ok(()),
        }
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.activity, Activity::Listening { .. })
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Absorb recogniser output for listening `generation`.
    pub fn on_transcript(&mut self, generation: u64, text: &str, is_final: bool) -> bool {
        match self.activity {
            Activity::Listening { generation: current } if current == generation => {
                if is_final {
                    self.transcript.commit(text);
                } else {
                    self.transcript.interim = text.to_string();
                }
                true
            }
            _ => false,
        }
    }

    /// Everything heard since the last reset, interim text included.
    pub fn transcript(&self) -> String {
        self.transcript.text()
    }

    /// Start a fresh answer.
    pub fn reset_transcript(&mut self) {
        self.transcript = LiveTranscript::default();
    }

    // -----------------------------------------------------------------------
    // Interruption
    // -----------------------------------------------------------------------

    /// Silence everything and refuse new speech until [`resume`](Self::resume).
    /// Buffered transcript text is kept.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
        self.cancel_playback();
        self.close_mic();
    }

    /// Lift the interruption.  Nothing is restarted automatically.
    pub fn resume(&mut self) {
        self.interrupted = false;
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Release everything at session end.
    pub fn shutdown(&mut self) {
        self.cancel_playback();
        self.close_mic();
    }

    fn cancel_playback(&mut self) {
        if let Some(handle) = self.playback.take() {
            handle.abort();
            self.synth.cancel();
        }
        if let Some(handle) = self.settle_task.take() {
            handle.abort();
        }
        if self.is_speaking() {
            self.activity = Activity::Idle;
        }
    }

    fn close_mic(&mut self) {
        if let Err(e) = self.stop_listening() {
            log::warn!("speech: {e}");
        }
    }
}

impl Drop for SpeechCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.playback.take() {
            handle.abort();
        }
        if let Some(handle) = self.settle_task.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{event_channel, EventReceiver};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct InstantSynth {
        spoken: Mutex<Vec<String>>,
        cancels: AtomicUsize,
    }

    impl InstantSynth {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
                cancels: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for InstantSynth {
        async fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Synth whose playback never ends on its own.
    struct EndlessSynth;

    #[async_trait]
    impl SpeechSynthesizer for EndlessSynth {
        async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn cancel(&self) {}
    }

    #[derive(Default)]
    struct CountingMic {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_stop: bool,
    }

    impl SpeechRecognizer for CountingMic {
        fn start(&self, _sink: TranscriptSink) -> Result<(), SpeechError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), SpeechError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                Err(SpeechError::InvalidState("already aborted".into()))
            } else {
                Ok(())
            }
        }
    }

    fn coordinator(
        synth: Arc<dyn SpeechSynthesizer>,
        mic: Option<Arc<CountingMic>>,
    ) -> (SpeechCoordinator, EventReceiver) {
        let (tx, rx) = event_channel();
        let mic = mic.map(|m| m as Arc<dyn SpeechRecognizer>);
        (
            SpeechCoordinator::new(synth, mic, tx, Duration::from_millis(800)),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn speak_then_settle_then_listen() {
        let synth = InstantSynth::new();
        let (mut c, mut rx) = coordinator(synth.clone(), None);

        let id = c.speak("Tell me about yourself.", true).unwrap();
        assert!(c.is_speaking());

        let (utterance, result) = match rx.recv().await {
            Some(SessionEvent::SpeechFinished { utterance, result }) => (utterance, result),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(utterance, id);
        assert_eq!(c.on_finished(utterance, result), FinishOutcome::Settling);

        let start = tokio::time::Instant::now();
        match rx.recv().await {
            Some(SessionEvent::SettleElapsed { utterance }) => {
                assert_eq!(utterance, id);
                assert!(start.elapsed() >= Duration::from_millis(800));
                assert!(c.on_settled(utterance));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!c.is_speaking());
        assert_eq!(synth.spoken.lock().unwrap().as_slice(), ["Tell me about yourself."]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_auto_listen_finishes_without_settle() {
        let (mut c, mut rx) = coordinator(InstantSynth::new(), None);
        let id = c.speak("Goodbye.", false).unwrap();
        match rx.recv().await {
            Some(SessionEvent::SpeechFinished { utterance, result }) => {
                assert_eq!(c.on_finished(utterance, result), FinishOutcome::Done);
                assert_eq!(utterance, id);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!c.is_speaking());
    }

    #[tokio::test]
    async fn new_utterance_supersedes_old() {
        let (mut c, _rx) = coordinator(Arc::new(EndlessSynth), None);
        let first = c.speak("one", true).unwrap();
        let second = c.speak("two", true).unwrap();
        assert_ne!(first, second);
        assert_eq!(c.on_finished(first, Ok(())), FinishOutcome::Stale);
        assert_eq!(c.on_finished(second, Ok(())), FinishOutcome::Settling);
    }

    #[tokio::test]
    async fn speak_is_noop_while_interrupted() {
        let synth = InstantSynth::new();
        let (mut c, _rx) = coordinator(synth, None);
        c.interrupt();
        assert!(c.speak("hello", true).is_none());
        assert!(!c.is_speaking());
        c.resume();
        assert!(c.speak("hello", true).is_some());
    }

    #[tokio::test]
    async fn listen_is_idempotent() {
        let mic = Arc::new(CountingMic::default());
        let (mut c, _rx) = coordinator(InstantSynth::new(), Some(mic.clone()));

        c.listen().unwrap();
        c.listen().unwrap();
        assert!(c.is_listening());
        assert_eq!(mic.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_listening_twice_or_idle_is_ok_and_unchanged() {
        let mic = Arc::new(CountingMic::default());
        let (mut c, _rx) = coordinator(InstantSynth::new(), Some(mic.clone()));

        assert!(c.stop_listening().is_ok());
        assert_eq!(mic.stops.load(Ordering::SeqCst), 0);

        c.listen().unwrap();
        assert!(c.stop_listening().is_ok());
        assert!(c.stop_listening().is_ok());
        assert!(!c.is_listening());
        assert_eq!(mic.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn speaking_closes_the_mic() {
        let mic = Arc::new(CountingMic::default());
        let (mut c, _rx) = coordinator(Arc::new(EndlessSynth), Some(mic.clone()));

        c.listen().unwrap();
        c.speak("follow-up", true);
        assert!(!c.is_listening());
        assert!(c.is_speaking());
        assert_eq!(mic.stops.load(Ordering::SeqCst), 1);

        c.listen().unwrap();
        assert!(c.is_listening());
        assert!(!c.is_speaking());
    }

    #[tokio::test]
    async fn interrupt_stop_succeeds_even_if_backend_errors() {
        let mic = Arc::new(CountingMic {
            fail_stop: true,
            ..Default::default()
        });
        let (mut c, _rx) = coordinator(InstantSynth::new(), Some(mic.clone()));

        c.listen().unwrap();
        c.interrupt();
        assert!(!c.is_listening());
        assert!(c.stop_listening().is_ok());
        assert_eq!(mic.stops.load(Ordering::SeqCst), 1);

        // No mic while interrupted.
        c.listen().unwrap();
        assert!(!c.is_listening());
    }

    #[tokio::test]
    async fn interrupt_cancels_playback() {
        let synth = InstantSynth::new();
        let (mut c, _rx) = coordinator(synth.clone(), None);
        let id = c.speak("long question", true).unwrap();
        c.interrupt();
        assert!(!c.is_speaking());
        assert_eq!(synth.cancels.load(Ordering::SeqCst), 1);
        assert_eq!(c.on_finished(id, Ok(())), FinishOutcome::Stale);
    }

    #[tokio::test]
    async fn transcript_accumulates_and_survives_interrupt() {
        let (mut c, _rx) = coordinator(InstantSynth::new(), Some(Arc::new(CountingMic::default())));
        c.listen().unwrap();
        let g = c.listen_generation;

        assert!(c.on_transcript(g, "I built", true));
        assert!(c.on_transcript(g, "a compil", false));
        assert_eq!(c.transcript(), "I built a compil");
        assert!(c.on_transcript(g, "a compiler", true));
        assert_eq!(c.transcript(), "I built a compiler");

        c.interrupt();
        assert!(!c.on_transcript(g, "late words", true));
        assert_eq!(c.transcript(), "I built a compiler");

        c.reset_transcript();
        assert_eq!(c.transcript(), "");
    }
}
