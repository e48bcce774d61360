//! Cool-down gate for proctoring warnings.

use std::time::Duration;

use tokio::time::Instant;

/// Lets a warning through only when at least `cooldown` has passed since the
/// last one it let through, whatever the kind.
///
/// ```rust
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use mock_interview::proctor::WarningDebouncer;
///
/// let mut gate = WarningDebouncer::new(Duration::from_millis(5_000));
/// let t0 = Instant::now();
/// assert!(gate.try_raise(t0));
/// assert!(!gate.try_raise(t0 + Duration::from_millis(4_999)));
/// assert!(gate.try_raise(t0 + Duration::from_millis(5_000)));
/// ```
#[derive(Debug, Clone)]
pub struct WarningDebouncer {
    cooldown: Duration,
    last_raised: Option<Instant>,
}

impl WarningDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_raised: None,
        }
    }

    /// Record a raise at `now` if the window allows it.  Suppressed attempts
    /// do not extend the window.
    pub fn try_raise(&mut self, now: Instant) -> bool {
        let allowed = match self.last_raised {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        };
        if allowed {
            self.last_raised = Some(now);
        }
        allowed
    }

    pub fn last_raised(&self) -> Option<Instant> {
        self.last_raised
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
