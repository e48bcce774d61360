//! Per-question answer countdown.
//!
//! [`AnswerTimer`] does not sleep inside the controller.  Arming it spawns a
//! ticker task that posts [`SessionEvent::TimerTick`] once a second, tagged
//! with the timer's generation.  Pausing or re-arming bumps the generation,
//! so ticks already in the queue from an older ticker are ignored.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::events::{EventSender, SessionEvent};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Never armed, or the phase it belonged to is over.
    Idle,
    Running,
    /// Stopped by an interruption or a submission; `remaining` is kept.
    Paused,
    /// Reached zero; the timeout has been delivered.
    Expired,
}

/// What a tick meant for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// From a cancelled ticker, or the timer is not running.
    Stale,
    Ticked { remaining: u32 },
    /// Delivered exactly once per arming.
    Expired,
}

pub struct AnswerTimer {
    duration_secs: u32,
    remaining: u32,
    generation: u64,
    state: TimerState,
    ticker: Option<JoinHandle<()>>,
}

impl AnswerTimer {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            duration_secs,
            remaining: duration_secs,
            generation: 0,
            state: TimerState::Idle,
            ticker: None,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Reset to the full duration and start ticking.
    pub fn arm(&mut self, events: &EventSender) {
        self.stop_ticker();
        self.remaining = self.duration_secs;
        self.state = TimerState::Running;

        let generation = self.generation;
        let events = events.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events.send(SessionEvent::TimerTick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    /// Stop ticking and keep the remaining value.  Idempotent.
    pub fn pause(&mut self) {
        self.stop_ticker();
        if self.state == TimerState::Running {
            self.state = TimerState::Paused;
        }
    }

    /// Apply one tick from the ticker of `generation`.
    pub fn on_tick(&mut self, generation: u64) -> TickOutcome {
        if generation != self.generation || self.state != TimerState::Running {
            return TickOutcome::Stale;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.stop_ticker();
            self.state = TimerState::Expired;
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked {
                remaining: self.remaining,
            }
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        self.generation += 1;
    }
}

impl Drop for AnswerTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
