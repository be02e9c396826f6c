//! Tracks whether the map view has settled after pan or zoom gestures.
//!
//! Times are supplied by the caller as a [`Duration`] since any fixed epoch,
//! which keeps the tracker free of clocks and timers.

use std::time::Duration;

/// Delay between the last gesture ending and the view counting as settled.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleState {
    Idle,
    /// `active` gestures (move, zoom) are in progress.
    Interacting { active: u32 },
    /// All gestures ended; settles once `deadline` passes.
    SettlingDown { deadline: Duration },
}

#[derive(Debug, Clone)]
pub struct SettleTracker {
    state: SettleState,
    delay: Duration,
}

impl Default for SettleTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl SettleTracker {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: SettleState::Idle,
            delay,
        }
    }

    pub fn state(&self) -> SettleState {
        self.state
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_settled(&self) -> bool {
        self.state == SettleState::Idle
    }

    /// A gesture started. Cancels any pending settle.
    pub fn begin_interaction(&mut self) {
        self.state = match self.state {
            SettleState::Interacting { active } => SettleState::Interacting {
                active: active.saturating_add(1),
            },
            SettleState::Idle | SettleState::SettlingDown { .. } => {
                SettleState::Interacting { active: 1 }
            }
        };
        log::debug!("interaction started: {:?}", self.state);
    }

    /// A gesture ended at `now`. The last one to end arms the settle deadline.
    pub fn end_interaction(&mut self, now: Duration) {
        self.state = match self.state {
            SettleState::Interacting { active } if active > 1 => SettleState::Interacting {
                active: active - 1,
            },
            SettleState::Interacting { .. } => SettleState::SettlingDown {
                deadline: now + self.delay,
            },
            other => other,
        };
        log::debug!("interaction ended: {:?}", self.state);
    }

    /// Advances to `now`. Returns true exactly once, when the view settles.
    pub fn tick(&mut self, now: Duration) -> bool {
        match self.state {
            SettleState::SettlingDown { deadline } if now >= deadline => {
                self.state = SettleState::Idle;
                log::debug!("view settled");
                true
            }
            _ => false,
        }
    }
}
