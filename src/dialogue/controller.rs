//! Dialogue controller: owns the session and drives turn-taking.
//!
//! [`DialogueController`] is the only writer of [`SessionPhase`] and of the
//! session transcript.  It consumes two queues:
//!
//! * [`SessionEvent`]s: user commands plus every asynchronous completion
//!   (collaborator replies, speech playback, settle delay, timer ticks).
//! * [`ProctorEvent`]s from the proctoring monitor, drained first.
//!
//! # Turn flow
//!
//! ```text
//! Start
//!   └─▶ AwaitingFirstQuestion ── generate_questions ─▶ QuestionsReady
//!         └─▶ Speaking (intro + Q0) ─▶ SpeechFinished ─▶ SettleElapsed
//!               └─▶ Listening (timer 120 s, mic on)
//!                     └─ Submit / timeout ─▶ Evaluating ── evaluate_answer ─▶ EvaluationReady
//!                           ├─ advance, not last → index+1, Speaking → Listening
//!                           ├─ follow-up         → Speaking → Listening
//!                           └─ advance, last     → Speaking (outro) → Ended
//! ```
//!
//! A raised proctoring warning moves any non-terminal phase to
//! `Interrupted`, silencing speech, closing the mic and pausing the timer.
//! Clearing restores the held phase without reopening the mic.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::DialogueConfig;
use crate::interview::{Answer, Turn};
use crate::llm::{Evaluation, Interviewer, LlmError};
use crate::persist::SessionStore;
use crate::proctor::ProctorEvent;
use crate::recorder::SessionRecorder;
use crate::speech::{FinishOutcome, SpeechCoordinator, SpeechError, SpeechRecognizer, SpeechSynthesizer};

use super::events::{EventReceiver, EventSender, SessionEvent};
use super::state::{Notice, NoticeKind, Session, SessionPhase, SessionReport, Warning};
use super::timer::{AnswerTimer, TickOutcome};

// ---------------------------------------------------------------------------
// SessionUpdate
// ---------------------------------------------------------------------------

/// Progress published for a UI.  Purely informational.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Phase(SessionPhase),
    /// Seconds left in the answer window.
    Countdown(u32),
    Warning(Warning),
    WarningCleared,
    Notice(Notice),
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External services the controller talks to.
pub struct Collaborators {
    pub interviewer: Arc<dyn Interviewer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// `None` means typed answers only.
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub store: Arc<dyn SessionStore>,
}

// ---------------------------------------------------------------------------
// Pending collaborator request
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum RequestKind {
    Questions,
    Evaluation(Answer),
}

#[derive(Debug)]
struct Pending {
    id: u64,
    kind: RequestKind,
    /// `false` once the request failed and awaits a retry.
    in_flight: bool,
}

// ---------------------------------------------------------------------------
// DialogueController
// ---------------------------------------------------------------------------

pub struct DialogueController {
    session: Session,
    phase: SessionPhase,
    /// Phase to restore when an interruption clears.
    held: Option<SessionPhase>,
    /// Collaborator replies that arrived while interrupted.
    deferred: VecDeque<SessionEvent>,
    pending: Option<Pending>,
    request_seq: u64,
    /// The outro is playing; its completion ends the session.
    closing: bool,
    mic_degraded: bool,

    interviewer: Arc<dyn Interviewer>,
    store: Arc<dyn SessionStore>,
    speech: SpeechCoordinator,
    timer: AnswerTimer,
    recorder: Option<SessionRecorder>,

    events: EventSender,
    phase_tx: watch::Sender<SessionPhase>,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
    notices: Vec<Notice>,
    config: DialogueConfig,
}

impl DialogueController {
    /// `events` must be the sending half of the queue later passed to
    /// [`run`](Self::run).
    pub fn new(
        session: Session,
        collaborators: Collaborators,
        config: &DialogueConfig,
        events: EventSender,
    ) -> Self {
        let speech = SpeechCoordinator::new(
            collaborators.synthesizer,
            collaborators.recognizer,
            events.clone(),
            config.settle_delay(),
        );
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);

        Self {
            session,
            phase: SessionPhase::Idle,
            held: None,
            deferred: VecDeque::new(),
            pending: None,
            request_seq: 0,
            closing: false,
            mic_degraded: false,
            interviewer: collaborators.interviewer,
            store: collaborators.store,
            speech,
            timer: AnswerTimer::new(config.answer_secs),
            recorder: None,
            events,
            phase_tx,
            updates: None,
            notices: Vec::new(),
            config: config.clone(),
        }
    }

    /// Attach the running session recorder; it is finished and uploaded on
    /// end.
    pub fn with_recorder(mut self, recorder: SessionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<SessionUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Watch the published phase (the proctoring monitor arms from this).
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn timer(&self) -> &AnswerTimer {
        &self.timer
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn is_listening(&self) -> bool {
        self.speech.is_listening()
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until the session ends and return its report.
    ///
    /// Proctoring events are always taken before queued session events.
    pub async fn run(
        mut self,
        mut events: EventReceiver,
        mut proctor: mpsc::Receiver<ProctorEvent>,
    ) -> SessionReport {
        let mut proctor_open = true;

        while !self.phase.is_terminal() {
            tokio::select! {
                biased;
                event = proctor.recv(), if proctor_open => match event {
                    Some(event) => self.handle_proctor(event).await,
                    None => {
                        log::debug!("controller: proctor channel closed");
                        proctor_open = false;
                    }
                },
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => self.end().await,
                },
            }
        }

        log::info!("controller: session {} finished", self.session.id());
        self.into_report()
    }

    pub fn into_report(self) -> SessionReport {
        self.session.into_report(self.notices)
    }

    // -----------------------------------------------------------------------
    // Event dispatch
    // -----------------------------------------------------------------------

    /// Apply one session event.
    pub async fn handle(&mut self, event: SessionEvent) {
        if self.phase.is_terminal() {
            log::debug!("controller: ignoring {event:?} after end");
            return;
        }
        if self.phase == SessionPhase::Interrupted && event.is_collaborator_reply() {
            log::debug!("controller: deferring collaborator reply while interrupted");
            self.deferred.push_back(event);
            return;
        }

        match event {
            SessionEvent::Start => self.start(),
            SessionEvent::Submit(text) => self.submit(text),
            SessionEvent::ResumeListening => self.resume_listening(),
            SessionEvent::Retry => self.retry(),
            SessionEvent::End => self.end().await,
            SessionEvent::QuestionsReady { request, result } => self.on_questions(request, result),
            SessionEvent::EvaluationReady { request, result } => {
                self.on_evaluation(request, result)
            }
            SessionEvent::SpeechFinished { utterance, result } => {
                self.on_speech_finished(utterance, result).await
            }
            SessionEvent::SettleElapsed { utterance } => self.on_settled(utterance),
            SessionEvent::TimerTick { generation } => self.on_tick(generation),
            SessionEvent::Transcript {
                generation,
                text,
                is_final,
            } => {
                self.speech.on_transcript(generation, &text, is_final);
            }
        }
    }

    /// Apply one proctoring event.
    pub async fn handle_proctor(&mut self, event: ProctorEvent) {
        match event {
            ProctorEvent::Raised { kind, at } => {
                if !self.phase.is_proctored() {
                    log::debug!("controller: {kind:?} outside an active dialogue; ignored");
                    return;
                }
                let warning = self.session.push_warning(kind, at);
                log::warn!("controller: proctoring warning: {}", kind.message());
                self.publish(SessionUpdate::Warning(warning));

                if self.phase != SessionPhase::Interrupted {
                    self.held = Some(self.phase);
                    self.timer.pause();
                    self.speech.interrupt();
                    self.set_phase(SessionPhase::Interrupted);
                }
            }
            ProctorEvent::Cleared => {
                self.publish(SessionUpdate::WarningCleared);
                if self.phase != SessionPhase::Interrupted {
                    return;
                }
                self.speech.resume();
                let restored = self.held.take().unwrap_or(SessionPhase::Idle);
                log::info!("controller: proctoring cleared, back to {restored:?}");
                self.set_phase(restored);

                while let Some(event) = self.deferred.pop_front() {
                    self.handle(event).await;
                }

                // The outro was cut off; its completion is stale, so finish here.
                if self.closing
                    && self.phase == SessionPhase::Speaking
                    && !self.speech.is_speaking()
                {
                    log::info!("controller: closing remarks interrupted, ending session");
                    self.end().await;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn start(&mut self) {
        if self.phase != SessionPhase::Idle {
            log::debug!("controller: start ignored in {:?}", self.phase);
            return;
        }
        self.set_phase(SessionPhase::AwaitingFirstQuestion);
        self.request_questions();
    }

    fn submit(&mut self, text: String) {
        if !self.phase.accepts_answer() {
            log::debug!("controller: submit ignored in {:?}", self.phase);
            return;
        }
        let typed = text.trim();
        let answer = if typed.is_empty() {
            Answer::Given(self.speech.transcript().trim().to_string())
        } else {
            Answer::Given(typed.to_string())
        };
        self.send_answer(answer);
    }

    fn resume_listening(&mut self) {
        match self.phase {
            SessionPhase::Listening => {
                if self.timer.is_running() && self.speech.is_listening() {
                    log::debug!("controller: already listening");
                    return;
                }
                self.enter_listening(false);
            }
            SessionPhase::Speaking if !self.speech.is_speaking() && !self.closing => {
                self.enter_listening(true);
            }
            other => log::debug!("controller: resume listening ignored in {other:?}"),
        }
    }

    fn retry(&mut self) {
        let Some(pending) = self.pending.take() else {
            log::debug!("controller: nothing to retry");
            return;
        };
        if pending.in_flight {
            log::debug!("controller: request {} still in flight", pending.id);
            self.pending = Some(pending);
            return;
        }

        match (pending.kind, self.phase) {
            (RequestKind::Questions, SessionPhase::AwaitingFirstQuestion) => {
                log::info!("controller: retrying question generation");
                self.request_questions();
            }
            (RequestKind::Evaluation(answer), SessionPhase::Evaluating) => {
                log::info!("controller: retrying evaluation");
                self.request_evaluation(answer);
            }
            (kind, phase) => {
                log::debug!("controller: retry ignored in {phase:?}");
                self.pending = Some(Pending {
                    id: pending.id,
                    kind,
                    in_flight: false,
                });
            }
        }
    }

    /// Finish the session: silence everything, stop the recorder and hand
    /// the recording to the store.
    ///
    /// `Ended` is published only once the upload completed or failed, so
    /// watchers of the phase can treat it as "safe to leave".
    async fn end(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        self.timer.pause();
        self.speech.shutdown();
        self.pending = None;
        self.deferred.clear();
        self.held = None;

        if let Some(recorder) = self.recorder.take() {
            self.store_recording(recorder).await;
        }
        self.set_phase(SessionPhase::Ended);
    }

    async fn store_recording(&mut self, recorder: SessionRecorder) {
        let recording = match recorder.finish().await {
            Ok(recording) => recording,
            Err(e) => {
                self.notify(NoticeKind::Upload, format!("Recording failed: {e}"));
                return;
            }
        };
        if let Some(e) = &recording.stream_error {
            self.notify(
                NoticeKind::Device,
                format!("Recording stopped early, keeping what was captured: {e}"),
            );
        }
        if recording.is_empty() {
            log::debug!("controller: empty recording, nothing to upload");
            return;
        }
        if let Err(e) = self
            .store
            .upload_recording(self.session.id(), recording)
            .await
        {
            self.notify(NoticeKind::Upload, format!("Recording upload failed: {e}"));
        }
    }

    // -----------------------------------------------------------------------
    // Completions
    // -----------------------------------------------------------------------

    fn on_questions(&mut self, request: u64, result: Result<Vec<String>, LlmError>) {
        if !self.is_current(request) || self.phase != SessionPhase::AwaitingFirstQuestion {
            log::debug!("controller: stale question reply {request}");
            return;
        }

        let questions = match result {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => return self.request_failed(&LlmError::EmptyResponse),
            Err(e) => return self.request_failed(&e),
        };

        self.pending = None;
        self.session.set_questions(questions);
        let first = match self.session.current_question() {
            Some(q) => q.text().to_string(),
            None => return,
        };
        log::info!(
            "controller: {} questions ready",
            self.session.questions().len()
        );
        let intro = join_lines(&self.config.intro, &first);
        self.say(intro, true);
    }

    fn on_evaluation(&mut self, request: u64, result: Result<Evaluation, LlmError>) {
        if !self.is_current(request) || self.phase != SessionPhase::Evaluating {
            log::debug!("controller: stale evaluation reply {request}");
            return;
        }

        let evaluation = match result {
            Ok(evaluation) => evaluation,
            Err(e) => return self.request_failed(&e),
        };
        self.pending = None;

        if !evaluation.advance {
            log::debug!(
                "controller: follow-up on question {}",
                self.session.index()
            );
            self.say(evaluation.spoken_response, true);
            return;
        }

        let last = self.session.is_last_question();
        self.session.accept_current();
        if last {
            log::info!("controller: final answer accepted, closing");
            self.closing = true;
            let closing = join_lines(&evaluation.spoken_response, &self.config.outro);
            self.say(closing, false);
        } else {
            log::debug!("controller: advancing to question {}", self.session.index());
            self.say(evaluation.spoken_response, true);
        }
    }

    async fn on_speech_finished(&mut self, utterance: u64, result: Result<(), SpeechError>) {
        match self.speech.on_finished(utterance, result) {
            FinishOutcome::Stale => log::debug!("controller: stale speech completion {utterance}"),
            FinishOutcome::Settling => {}
            FinishOutcome::Done => {
                if self.closing && self.phase == SessionPhase::Speaking {
                    self.end().await;
                }
            }
        }
    }

    fn on_settled(&mut self, utterance: u64) {
        if self.speech.on_settled(utterance) && self.phase == SessionPhase::Speaking {
            self.enter_listening(true);
        }
    }

    fn on_tick(&mut self, generation: u64) {
        match self.timer.on_tick(generation) {
            TickOutcome::Stale => {}
            TickOutcome::Ticked { remaining } => self.publish(SessionUpdate::Countdown(remaining)),
            TickOutcome::Expired => {
                self.publish(SessionUpdate::Countdown(0));
                if self.phase == SessionPhase::Listening {
                    log::info!("controller: answer window expired");
                    let answer = Answer::on_timeout(&self.speech.transcript());
                    self.send_answer(answer);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Open the answer window: full timer, mic on.  `fresh` starts a new
    /// transcript; otherwise what was heard so far is kept.
    fn enter_listening(&mut self, fresh: bool) {
        if fresh {
            self.speech.reset_transcript();
        }
        self.timer.arm(&self.events);
        self.set_phase(SessionPhase::Listening);
        self.publish(SessionUpdate::Countdown(self.timer.remaining()));

        if let Err(e) = self.speech.listen() {
            if !self.mic_degraded {
                self.mic_degraded = true;
                self.notify(
                    NoticeKind::Device,
                    format!("Microphone unavailable, type your answers instead: {e}"),
                );
            }
        }
    }

    fn send_answer(&mut self, answer: Answer) {
        self.timer.pause();
        if let Err(e) = self.speech.stop_listening() {
            log::warn!("controller: {e}");
        }
        self.session.push_turn(Turn::answer(&answer));
        self.set_phase(SessionPhase::Evaluating);
        self.request_evaluation(answer);
    }

    fn say(&mut self, text: String, auto_listen: bool) {
        self.session.push_turn(Turn::interviewer(text.clone()));
        self.set_phase(SessionPhase::Speaking);
        self.speech.speak(text, auto_listen);
    }

    fn request_questions(&mut self) {
        let request = self.next_request(RequestKind::Questions);
        let interviewer = Arc::clone(&self.interviewer);
        let config = self.session.config().clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = interviewer.generate_questions(&config).await;
            let _ = events.send(SessionEvent::QuestionsReady { request, result });
        });
    }

    fn request_evaluation(&mut self, answer: Answer) {
        let current = self
            .session
            .current_question()
            .map(|q| q.text().to_string())
            .unwrap_or_default();
        let next = self.session.next_question().map(|q| q.text().to_string());
        let request = self.next_request(RequestKind::Evaluation(answer.clone()));
        let interviewer = Arc::clone(&self.interviewer);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = interviewer
                .evaluate_answer(&current, next.as_deref(), &answer)
                .await;
            let _ = events.send(SessionEvent::EvaluationReady { request, result });
        });
    }

    fn next_request(&mut self, kind: RequestKind) -> u64 {
        self.request_seq += 1;
        self.pending = Some(Pending {
            id: self.request_seq,
            kind,
            in_flight: true,
        });
        self.request_seq
    }

    fn is_current(&self, request: u64) -> bool {
        matches!(&self.pending, Some(p) if p.id == request && p.in_flight)
    }

    fn request_failed(&mut self, error: &LlmError) {
        if let Some(pending) = self.pending.as_mut() {
            pending.in_flight = false;
        }
        let what = match self.phase {
            SessionPhase::AwaitingFirstQuestion => "prepare questions",
            _ => "evaluate the answer",
        };
        self.notify(
            NoticeKind::Collaborator,
            format!("Could not {what}: {error}. Retry or end the interview."),
        );
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            log::debug!("controller: {:?} → {:?}", self.phase, phase);
        }
        self.phase = phase;
        self.phase_tx.send_replace(phase);
        self.publish(SessionUpdate::Phase(phase));
    }

    fn notify(&mut self, kind: NoticeKind, message: String) {
        log::error!("controller: {message}");
        let notice = Notice::new(kind, message);
        self.publish(SessionUpdate::Notice(notice.clone()));
        self.notices.push(notice);
    }

    fn publish(&self, update: SessionUpdate) {
        if let Some(updates) = &self.updates {
            let _ = updates.send(update);
        }
    }
}

fn join_lines(first: &str, second: &str) -> String {
    match (first.trim(), second.trim()) {
        ("", b) => b.to_string(),
        (a, "") => a.to_string(),
        (a, b) => format!("{a} {b}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::event_channel;
    use crate::interview::{
        CompanyMode, ExperienceLevel, InterviewType, Role, SessionConfig, Speaker,
        TIMEOUT_SENTINEL,
    };
    use crate::persist::{PersistError, SessionId};
    use crate::proctor::WarningKind;
    use crate::recorder::{ChannelSource, MediaSource, Recording, RecorderError};
    use crate::speech::TranscriptSink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    // ---- Test doubles -------------------------------------------------------

    struct ScriptedInterviewer {
        questions: Mutex<VecDeque<Result<Vec<String>, LlmError>>>,
        evaluations: Mutex<VecDeque<Result<Evaluation, LlmError>>>,
        answers: Mutex<Vec<Answer>>,
    }

    impl ScriptedInterviewer {
        fn new(
            questions: Vec<Result<Vec<String>, LlmError>>,
            evaluations: Vec<Result<Evaluation, LlmError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                questions: Mutex::new(questions.into()),
                evaluations: Mutex::new(evaluations.into()),
                answers: Mutex::new(Vec::new()),
            })
        }

        fn answers(&self) -> Vec<Answer> {
            self.answers.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Interviewer for ScriptedInterviewer {
        async fn generate_questions(&self, _: &SessionConfig) -> Result<Vec<String>, LlmError> {
            self.questions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }

        async fn evaluate_answer(
            &self,
            _current: &str,
            _next: Option<&str>,
            answer: &Answer,
        ) -> Result<Evaluation, LlmError> {
            self.answers.lock().unwrap().push(answer.clone());
            self.evaluations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    struct InstantSynth;

    #[async_trait]
    impl SpeechSynthesizer for InstantSynth {
        async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
            Ok(())
        }

        fn cancel(&self) {}
    }

    #[derive(Default)]
    struct RecordingMic {
        starts: AtomicUsize,
        stops: AtomicUsize,
        sink: Mutex<Option<TranscriptSink>>,
    }

    impl SpeechRecognizer for RecordingMic {
        fn start(&self, sink: TranscriptSink) -> Result<(), SpeechError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn stop(&self) -> Result<(), SpeechError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenMic;

    impl SpeechRecognizer for BrokenMic {
        fn start(&self, _sink: TranscriptSink) -> Result<(), SpeechError> {
            Err(SpeechError::Device("permission denied".into()))
        }

        fn stop(&self) -> Result<(), SpeechError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        uploads: Mutex<Vec<Recording>>,
        fail_uploads: bool,
        /// Phase as published while an upload is in progress.
        watched: Mutex<Option<watch::Receiver<SessionPhase>>>,
        phase_during_upload: Mutex<Option<SessionPhase>>,
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn create_session(&self, _: &SessionConfig) -> Result<SessionId, PersistError> {
            Ok(SessionId::Remote(1))
        }

        async fn upload_recording(
            &self,
            _: &SessionId,
            recording: Recording,
        ) -> Result<(), PersistError> {
            if let Some(watched) = self.watched.lock().unwrap().as_ref() {
                *self.phase_during_upload.lock().unwrap() = Some(*watched.borrow());
            }
            if self.fail_uploads {
                return Err(PersistError::Status(503));
            }
            self.uploads.lock().unwrap().push(recording);
            Ok(())
        }
    }

    // ---- Harness -------------------------------------------------------------

    struct Harness {
        ctl: DialogueController,
        rx: EventReceiver,
        mic: Arc<RecordingMic>,
    }

    fn three_questions() -> Vec<String> {
        vec!["Q0?".into(), "Q1?".into(), "Q2?".into()]
    }

    fn harness(interviewer: Arc<ScriptedInterviewer>, store: Arc<MemoryStore>) -> Harness {
        let (tx, rx) = event_channel();
        let mic = Arc::new(RecordingMic::default());
        let session = Session::new(
            SessionId::Remote(1),
            SessionConfig::new(
                Role::BackendDev,
                ExperienceLevel::OneToThree,
                InterviewType::Technical,
                CompanyMode::Generic,
            ),
        );
        let ctl = DialogueController::new(
            session,
            Collaborators {
                interviewer,
                synthesizer: Arc::new(InstantSynth),
                recognizer: Some(mic.clone()),
                store,
            },
            &DialogueConfig::default(),
            tx,
        );
        Harness { ctl, rx, mic }
    }

    impl Harness {
        /// Handle queued events until `done` holds.
        async fn pump_until(&mut self, done: impl Fn(&DialogueController) -> bool) {
            for _ in 0..1_000 {
                if done(&self.ctl) {
                    return;
                }
                let event = self.rx.recv().await.expect("event queue closed");
                self.ctl.handle(event).await;
            }
            panic!("condition not reached; phase {:?}", self.ctl.phase());
        }

        async fn until_phase(&mut self, phase: SessionPhase) {
            self.pump_until(|c| c.phase() == phase).await;
        }

        /// Handle everything already queued without waiting.
        async fn drain(&mut self) {
            while let Ok(event) = self.rx.try_recv() {
                self.ctl.handle(event).await;
            }
        }

        async fn start_listening(&mut self) {
            self.ctl.handle(SessionEvent::Start).await;
            self.until_phase(SessionPhase::Listening).await;
        }

        fn starts(&self) -> usize {
            self.mic.starts.load(Ordering::SeqCst)
        }

        fn stops(&self) -> usize {
            self.mic.stops.load(Ordering::SeqCst)
        }
    }

    fn raised(kind: WarningKind) -> ProctorEvent {
        ProctorEvent::Raised {
            kind,
            at: Instant::now(),
        }
    }

    // ---- Scenarios -----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn three_question_interview() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![
                Ok(Evaluation::advance("Good. Q1?")),
                Ok(Evaluation::follow_up("Can you be more specific?")),
                Ok(Evaluation::advance("Thanks. Q2?")),
                Ok(Evaluation::advance("Great answer.")),
            ],
        );
        let mut h = harness(interviewer.clone(), Arc::new(MemoryStore::default()));

        h.start_listening().await;
        assert_eq!(h.ctl.session().index(), 0);
        assert_eq!(h.ctl.timer().remaining(), 120);
        assert!(h.ctl.is_listening());

        // Q0: advance → index 1, speaking then listening.
        h.ctl.handle(SessionEvent::Submit("I design APIs.".into())).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Evaluating);
        h.until_phase(SessionPhase::Speaking).await;
        assert_eq!(h.ctl.session().index(), 1);
        h.until_phase(SessionPhase::Listening).await;
        assert_eq!(h.ctl.timer().remaining(), 120);

        // Q1 vague: follow-up, index unchanged, listening re-armed at 120.
        h.ctl.handle(SessionEvent::Submit("Stuff.".into())).await;
        h.until_phase(SessionPhase::Speaking).await;
        assert_eq!(h.ctl.session().index(), 1);
        h.until_phase(SessionPhase::Listening).await;
        assert_eq!(h.ctl.timer().remaining(), 120);

        // Q1 again: silence until the timer runs out.
        h.until_phase(SessionPhase::Evaluating).await;
        let last_turn = h.ctl.session().turns().last().unwrap().clone();
        assert_eq!(last_turn.speaker, Speaker::Candidate);
        assert_eq!(last_turn.text, TIMEOUT_SENTINEL);
        assert!(last_turn.timed_out);
        h.until_phase(SessionPhase::Speaking).await;
        assert_eq!(interviewer.answers().last(), Some(&Answer::TimedOut));
        assert_eq!(h.ctl.session().index(), 2);
        assert!(h.ctl.session().is_last_question());
        h.until_phase(SessionPhase::Listening).await;

        // Q2 (last): advance → outro, then Ended without listening again.
        let starts_before = h.starts();
        h.ctl.handle(SessionEvent::Submit("Done.".into())).await;
        h.until_phase(SessionPhase::Ended).await;
        assert_eq!(h.starts(), starts_before);
        assert_eq!(h.ctl.session().index(), 2);
        assert_eq!(h.ctl.session().answered(), 3);

        let report = h.ctl.into_report();
        let outro = report.turns.last().unwrap();
        assert_eq!(outro.speaker, Speaker::Interviewer);
        assert!(outro.text.starts_with("Great answer."));
        assert!(outro.text.ends_with(&DialogueConfig::default().outro));
        assert!(report.notices.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_outro_still_ends_after_clear() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(vec!["Only question?".into()])],
            vec![Ok(Evaluation::advance("Thanks."))],
        );
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));
        h.start_listening().await;

        h.ctl.handle(SessionEvent::Submit("My answer.".into())).await;
        h.until_phase(SessionPhase::Speaking).await;
        assert!(h.ctl.session().is_complete());

        // Warning lands while the outro is playing.
        h.ctl.handle_proctor(raised(WarningKind::NoFace)).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Interrupted);
        tokio::time::sleep(Duration::from_secs(600)).await;
        h.drain().await;
        assert_eq!(h.ctl.phase(), SessionPhase::Interrupted);

        h.ctl.handle_proctor(ProctorEvent::Cleared).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Ended);
        assert_eq!(h.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn listening_waits_for_settle_delay() {
        let interviewer = ScriptedInterviewer::new(vec![Ok(three_questions())], vec![]);
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));

        h.ctl.handle(SessionEvent::Start).await;
        assert_eq!(h.ctl.phase(), SessionPhase::AwaitingFirstQuestion);

        // Questions arrive and the intro starts playing.
        h.pump_until(|c| c.phase() == SessionPhase::Speaking).await;
        let started = Instant::now();
        h.until_phase(SessionPhase::Listening).await;
        assert!(started.elapsed() >= Duration::from_millis(800));

        let intro = &h.ctl.session().turns()[0];
        assert!(intro.text.ends_with("Q0?"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_face_while_listening_interrupts_without_timeout() {
        let interviewer = ScriptedInterviewer::new(vec![Ok(three_questions())], vec![]);
        let mut h = harness(interviewer.clone(), Arc::new(MemoryStore::default()));
        h.start_listening().await;

        // Some time passes before the warning.
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        h.drain().await;
        let remaining = h.ctl.timer().remaining();
        assert!(remaining < 120);

        h.ctl.handle_proctor(raised(WarningKind::NoFace)).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Interrupted);
        assert!(!h.ctl.timer().is_running());
        assert!(!h.ctl.is_listening());
        assert_eq!(h.stops(), 1);
        assert_eq!(
            h.ctl.session().warnings().iter().map(|w| w.kind).collect::<Vec<_>>(),
            vec![WarningKind::NoFace]
        );

        // Far past the answer window: no timeout fires.
        tokio::time::sleep(Duration::from_secs(300)).await;
        h.drain().await;
        assert_eq!(h.ctl.phase(), SessionPhase::Interrupted);
        assert_eq!(h.ctl.timer().remaining(), remaining);
        assert!(interviewer.answers().is_empty());

        // Clearing restores Listening with the mic still off.
        h.ctl.handle_proctor(ProctorEvent::Cleared).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Listening);
        assert!(!h.ctl.is_listening());
        assert!(!h.ctl.timer().is_running());
        assert_eq!(h.starts(), 1);

        // Explicit resume: full timer, mic on.
        h.ctl.handle(SessionEvent::ResumeListening).await;
        assert!(h.ctl.is_listening());
        assert!(h.ctl.timer().is_running());
        assert_eq!(h.ctl.timer().remaining(), 120);
        assert_eq!(h.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn typed_answer_accepted_after_clear() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![Ok(Evaluation::advance("Next. Q1?"))],
        );
        let mut h = harness(interviewer.clone(), Arc::new(MemoryStore::default()));
        h.start_listening().await;

        h.ctl.handle_proctor(raised(WarningKind::LowLight)).await;
        h.ctl.handle(SessionEvent::Submit("blocked".into())).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Interrupted);

        h.ctl.handle_proctor(ProctorEvent::Cleared).await;
        h.ctl.handle(SessionEvent::Submit("typed".into())).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Evaluating);
        h.until_phase(SessionPhase::Speaking).await;
        assert_eq!(interviewer.answers(), vec![Answer::Given("typed".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_warning_while_interrupted_only_logs() {
        let interviewer = ScriptedInterviewer::new(vec![Ok(three_questions())], vec![]);
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));
        h.start_listening().await;

        h.ctl.handle_proctor(raised(WarningKind::NoFace)).await;
        h.ctl.handle_proctor(raised(WarningKind::MultiFace)).await;
        assert_eq!(h.ctl.session().warnings().len(), 2);

        h.ctl.handle_proctor(ProctorEvent::Cleared).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn warnings_before_start_are_ignored() {
        let interviewer = ScriptedInterviewer::new(vec![Ok(three_questions())], vec![]);
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));

        h.ctl.handle_proctor(raised(WarningKind::NoFace)).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Idle);
        assert!(h.ctl.session().warnings().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn evaluator_reply_during_interruption_is_deferred() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![Ok(Evaluation::advance("Good. Q1?"))],
        );
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));
        h.start_listening().await;

        h.ctl.handle(SessionEvent::Submit("answer".into())).await;
        h.ctl.handle_proctor(raised(WarningKind::MultiFace)).await;

        // The reply lands while interrupted and is held back.
        h.pump_until(|c| !c.deferred.is_empty()).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Interrupted);
        assert_eq!(h.ctl.session().index(), 0);

        h.ctl.handle_proctor(ProctorEvent::Cleared).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Speaking);
        assert_eq!(h.ctl.session().index(), 1);
        h.until_phase(SessionPhase::Listening).await;
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_speech_needs_resume_to_listen() {
        let interviewer = ScriptedInterviewer::new(vec![Ok(three_questions())], vec![]);
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));

        h.ctl.handle(SessionEvent::Start).await;
        h.until_phase(SessionPhase::Speaking).await;
        h.ctl.handle_proctor(raised(WarningKind::NoFace)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        h.drain().await;

        h.ctl.handle_proctor(ProctorEvent::Cleared).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Speaking);
        tokio::time::sleep(Duration::from_secs(2)).await;
        h.drain().await;
        assert_eq!(h.ctl.phase(), SessionPhase::Speaking);
        assert_eq!(h.starts(), 0);

        h.ctl.handle(SessionEvent::ResumeListening).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Listening);
        assert_eq!(h.ctl.timer().remaining(), 120);
        assert_eq!(h.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_while_evaluating_is_rejected() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![Ok(Evaluation::follow_up("Say more?"))],
        );
        let mut h = harness(interviewer.clone(), Arc::new(MemoryStore::default()));
        h.start_listening().await;

        h.ctl.handle(SessionEvent::Submit("first".into())).await;
        h.ctl.handle(SessionEvent::Submit("second".into())).await;
        h.until_phase(SessionPhase::Speaking).await;

        assert_eq!(interviewer.answers(), vec![Answer::Given("first".into())]);
        let candidate_turns = h
            .ctl
            .session()
            .turns()
            .iter()
            .filter(|t| t.speaker == Speaker::Candidate)
            .count();
        assert_eq!(candidate_turns, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spoken_transcript_is_submitted_when_nothing_typed() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![Ok(Evaluation::follow_up("Why?"))],
        );
        let mut h = harness(interviewer.clone(), Arc::new(MemoryStore::default()));
        h.start_listening().await;

        let sink = h.mic.sink.lock().unwrap().clone().unwrap();
        sink.push("I would shard", true);
        sink.push("by tenant", false);
        h.drain().await;

        h.ctl.handle(SessionEvent::Submit(String::new())).await;
        h.until_phase(SessionPhase::Speaking).await;
        assert_eq!(
            interviewer.answers(),
            vec![Answer::Given("I would shard by tenant".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn collaborator_failure_halts_until_retry() {
        let interviewer = ScriptedInterviewer::new(
            vec![Err(LlmError::Timeout), Ok(three_questions())],
            vec![],
        );
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));

        h.ctl.handle(SessionEvent::Start).await;
        h.pump_until(|c| !c.notices().is_empty()).await;
        assert_eq!(h.ctl.phase(), SessionPhase::AwaitingFirstQuestion);
        assert_eq!(h.ctl.notices()[0].kind, NoticeKind::Collaborator);

        h.ctl.handle(SessionEvent::Retry).await;
        h.until_phase(SessionPhase::Listening).await;
        assert_eq!(h.ctl.session().questions().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluation_failure_retries_same_answer() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![
                Err(LlmError::Parse("not json".into())),
                Ok(Evaluation::advance("Q1?")),
            ],
        );
        let mut h = harness(interviewer.clone(), Arc::new(MemoryStore::default()));
        h.start_listening().await;

        h.ctl.handle(SessionEvent::Submit("answer".into())).await;
        h.pump_until(|c| !c.notices().is_empty()).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Evaluating);
        assert_eq!(h.ctl.session().index(), 0);

        h.ctl.handle(SessionEvent::Retry).await;
        h.until_phase(SessionPhase::Speaking).await;
        assert_eq!(h.ctl.session().index(), 1);
        assert_eq!(
            interviewer.answers(),
            vec![Answer::Given("answer".into()), Answer::Given("answer".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn broken_mic_degrades_to_typed_input() {
        let (tx, mut rx) = event_channel();
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![Ok(Evaluation::follow_up("More?"))],
        );
        let mut ctl = DialogueController::new(
            Session::new(
                SessionId::Remote(2),
                SessionConfig::new(
                    Role::Devops,
                    ExperienceLevel::Fresher,
                    InterviewType::Hr,
                    CompanyMode::Amazon,
                ),
            ),
            Collaborators {
                interviewer: interviewer.clone(),
                synthesizer: Arc::new(InstantSynth),
                recognizer: Some(Arc::new(BrokenMic)),
                store: Arc::new(MemoryStore::default()),
            },
            &DialogueConfig::default(),
            tx,
        );

        ctl.handle(SessionEvent::Start).await;
        while ctl.phase() != SessionPhase::Listening {
            let event = rx.recv().await.unwrap();
            ctl.handle(event).await;
        }
        assert_eq!(ctl.notices().len(), 1);
        assert_eq!(ctl.notices()[0].kind, NoticeKind::Device);

        ctl.handle(SessionEvent::Submit("typed".into())).await;
        assert_eq!(ctl.phase(), SessionPhase::Evaluating);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_failure_still_ends_with_notice() {
        let (tx, rx) = event_channel();
        let (proctor_tx, proctor_rx) = mpsc::channel(8);
        let interviewer = ScriptedInterviewer::new(vec![Ok(three_questions())], vec![]);
        let store = Arc::new(MemoryStore {
            fail_uploads: true,
            ..Default::default()
        });

        let (media_tx, source) = ChannelSource::new("video/webm", 8);
        let recorder = SessionRecorder::start(Box::new(source), 1024);
        media_tx.send(vec![1, 2, 3, 4]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ctl = DialogueController::new(
            Session::new(
                SessionId::Remote(3),
                SessionConfig::new(
                    Role::QaEngineer,
                    ExperienceLevel::ThreeToFive,
                    InterviewType::Coding,
                    CompanyMode::Generic,
                ),
            ),
            Collaborators {
                interviewer,
                synthesizer: Arc::new(InstantSynth),
                recognizer: None,
                store,
            },
            &DialogueConfig::default(),
            tx.clone(),
        )
        .with_recorder(recorder);
        let phase = ctl.subscribe();

        tx.send(SessionEvent::Start).unwrap();
        let run = tokio::spawn(ctl.run(rx, proctor_rx));

        tokio::time::sleep(Duration::from_secs(3)).await;
        proctor_tx
            .send(raised(WarningKind::LowLight))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(SessionEvent::End).unwrap();

        let report = run.await.unwrap();
        assert_eq!(*phase.borrow(), SessionPhase::Ended);
        assert_eq!(report.warning_kinds(), vec![WarningKind::LowLight]);
        assert!(!report.turns.is_empty());
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].kind, NoticeKind::Upload);
    }

    #[tokio::test(start_paused = true)]
    async fn recording_is_uploaded_on_end() {
        let (tx, rx) = event_channel();
        let (_proctor_tx, proctor_rx) = mpsc::channel(8);
        let store = Arc::new(MemoryStore::default());

        let (media_tx, source) = ChannelSource::new("video/webm", 8);
        let recorder = SessionRecorder::start(Box::new(source), 2);
        media_tx.send(vec![9, 8, 7]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ctl = DialogueController::new(
            Session::new(
                SessionId::Remote(4),
                SessionConfig::new(
                    Role::MobileDev,
                    ExperienceLevel::FivePlus,
                    InterviewType::Mixed,
                    CompanyMode::Tcs,
                ),
            ),
            Collaborators {
                interviewer: ScriptedInterviewer::new(vec![], vec![]),
                synthesizer: Arc::new(InstantSynth),
                recognizer: None,
                store: store.clone(),
            },
            &DialogueConfig::default(),
            tx.clone(),
        )
        .with_recorder(recorder);
        let phase = ctl.subscribe();
        *store.watched.lock().unwrap() = Some(ctl.subscribe());

        tx.send(SessionEvent::End).unwrap();
        let report = ctl.run(rx, proctor_rx).await;

        assert!(report.notices.is_empty());
        assert_eq!(*phase.borrow(), SessionPhase::Ended);
        let during = *store.phase_during_upload.lock().unwrap();
        assert_eq!(during, Some(SessionPhase::Idle));
        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bytes, vec![9, 8, 7]);
        assert_eq!(uploads[0].segments, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_capture_uploads_what_was_recorded() {
        struct Unplugged {
            sent: bool,
        }

        #[async_trait]
        impl MediaSource for Unplugged {
            fn mime_type(&self) -> &str {
                "video/webm"
            }

            async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, RecorderError> {
                if self.sent {
                    return Err(RecorderError::Stream("unplugged".into()));
                }
                self.sent = true;
                Ok(Some(vec![1, 2, 3]))
            }
        }

        let store = Arc::new(MemoryStore::default());
        let recorder = SessionRecorder::start(Box::new(Unplugged { sent: false }), 1024);
        let mut h = harness(ScriptedInterviewer::new(vec![], vec![]), store.clone());
        h.ctl = h.ctl.with_recorder(recorder);
        tokio::time::sleep(Duration::from_millis(10)).await;

        h.ctl.handle(SessionEvent::End).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Ended);
        assert_eq!(store.uploads.lock().unwrap()[0].bytes, vec![1, 2, 3]);
        assert_eq!(h.ctl.notices().len(), 1);
        assert_eq!(h.ctl.notices()[0].kind, NoticeKind::Device);
    }

    #[tokio::test(start_paused = true)]
    async fn late_replies_after_end_are_ignored() {
        let interviewer = ScriptedInterviewer::new(
            vec![Ok(three_questions())],
            vec![Ok(Evaluation::advance("Q1?"))],
        );
        let mut h = harness(interviewer, Arc::new(MemoryStore::default()));
        h.start_listening().await;

        h.ctl.handle(SessionEvent::Submit("answer".into())).await;
        h.ctl.handle(SessionEvent::End).await;
        assert_eq!(h.ctl.phase(), SessionPhase::Ended);

        tokio::time::sleep(Duration::from_secs(5)).await;
        h.drain().await;
        assert_eq!(h.ctl.phase(), SessionPhase::Ended);
        assert_eq!(h.ctl.session().index(), 0);
        assert!(!h.ctl.is_listening());
    }
}
