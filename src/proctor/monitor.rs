//! Continuous visual proctoring.
//!
//! [`ProctorMonitor`] pulls frames from a [`FrameSource`] at a fixed rate,
//! classifies each one and reports to the dialogue controller over its own
//! channel:
//!
//! ```text
//! interval tick ─▶ FrameSource::next_frame ─▶ FaceDetector::detect
//!                                                  │
//!                                      FrameClassifier::classify
//!                                                  │
//!                     clear ───────────────────────┼──── violation
//!                       │                          │
//!      displayed? → ProctorEvent::Cleared   armed? + WarningDebouncer
//!                                                  │
//!                                       ProctorEvent::Raised
//! ```
//!
//! The monitor never touches session state.  It reads the controller's
//! published [`SessionPhase`] to know whether it is armed, and writes only to
//! the proctor channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ProctorConfig;
use crate::dialogue::SessionPhase;

use super::classify::{Classification, FrameClassifier, WarningKind};
use super::debounce::WarningDebouncer;
use super::frame::{FaceDetector, Frame, FrameSource};

// ---------------------------------------------------------------------------
// ProctorEvent
// ---------------------------------------------------------------------------

/// Messages from the monitor to the dialogue controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProctorEvent {
    /// A debounced violation; forces the dialogue into `Interrupted`.
    Raised { kind: WarningKind, at: Instant },
    /// The displayed warning no longer applies.
    Cleared,
}

// ---------------------------------------------------------------------------
// ProctorMonitor
// ---------------------------------------------------------------------------

pub struct ProctorMonitor {
    detector: Arc<dyn FaceDetector>,
    classifier: FrameClassifier,
    debouncer: WarningDebouncer,
    interval: Duration,
    /// Warning currently shown to the candidate, if any.
    displayed: Option<WarningKind>,
}

impl ProctorMonitor {
    pub fn new(detector: Arc<dyn FaceDetector>, config: &ProctorConfig) -> Self {
        Self {
            detector,
            classifier: FrameClassifier::new(config.luminance_threshold, config.sample_region),
            debouncer: WarningDebouncer::new(Duration::from_millis(config.cooldown_ms)),
            interval: Duration::from_millis(config.analysis_interval_ms.max(1)),
            displayed: None,
        }
    }

    pub fn displayed(&self) -> Option<WarningKind> {
        self.displayed
    }

    /// Analyse one frame.
    ///
    /// `armed` is false before the dialogue starts: frames are still
    /// classified, but violations are not raised and do not consume the
    /// debounce window.
    pub fn observe(&mut self, frame: &Frame, armed: bool, now: Instant) -> Option<ProctorEvent> {
        let faces = match self.detector.detect(frame) {
            Ok(faces) => faces.len(),
            Err(e) => {
                log::debug!("proctor: skipping frame, {e}");
                return None;
            }
        };

        match self.classifier.classify(faces, frame) {
            Classification::Clear => self.displayed.take().map(|kind| {
                log::debug!("proctor: {kind:?} cleared");
                ProctorEvent::Cleared
            }),
            Classification::Violation(kind) => {
                if !armed {
                    log::trace!("proctor: {kind:?} before start, not raised");
                    return None;
                }
                if !self.debouncer.try_raise(now) {
                    return None;
                }
                log::info!("proctor: raising {kind:?}");
                self.displayed = Some(kind);
                Some(ProctorEvent::Raised { kind, at: now })
            }
        }
    }

    /// Run until the camera stream ends, the controller goes away, or the
    /// session reaches `Ended`.
    pub async fn run<S: FrameSource>(
        mut self,
        mut source: S,
        mut phase: watch::Receiver<SessionPhase>,
        events: mpsc::Sender<ProctorEvent>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let current = *phase.borrow_and_update();
            if current == SessionPhase::Ended {
                break;
            }

            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("proctor: camera stream ended, proctoring disabled");
                    break;
                }
                Err(e) => {
                    log::warn!("proctor: {e}; proctoring disabled");
                    break;
                }
            };

            if let Some(event) = self.observe(&frame, current.is_proctored(), Instant::now()) {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }

        log::debug!("proctor: monitor stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
