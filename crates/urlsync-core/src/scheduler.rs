#![forbid(unsafe_code)]

//! Debounced write scheduling.
//!
//! # Design
//!
//! [`WriteScheduler`] is an explicit two-state machine:
//!
//! ```text
//!            schedule                 schedule (old timer cleared)
//!   Idle ─────────────▶ Pending ──────────────────┐
//!    ▲                   │  │ ◀───────────────────┘
//!    │   flush / cancel  │  │ timer fires (generation matches)
//!    └───────────────────┘  └──────────▶ take_due ─▶ Idle
//! ```
//!
//! Every armed timer carries a generation number. A firing whose generation
//! no longer matches the pending write is ignored, so a timer that the host
//! failed to disarm can never write a superseded snapshot.
//!
//! The scheduler does not perform writes itself; the engine supplies the
//! timer callback and performs the write for whatever [`take_due`] or
//! [`cancel`] hand back.
//!
//! [`take_due`]: WriteScheduler::take_due
//! [`cancel`]: WriteScheduler::cancel

use std::cell::{Cell, RefCell};
use std::time::Duration;

use tracing::{debug, debug_span, trace};
use urlsync_backend::{TimerId, TimerQueue};

use crate::value::FlatState;

/// Default quiet period before a scheduled write lands.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Identifies one armed timer of a scheduler.
pub type Generation = u64;

#[derive(Debug, Default)]
enum WriteState {
    #[default]
    Idle,
    Pending {
        timer: TimerId,
        generation: Generation,
        snapshot: FlatState,
    },
}

/// Outcome of [`WriteScheduler::schedule`].
#[derive(Debug, PartialEq)]
pub enum Scheduled {
    /// A timer is armed; the snapshot will be handed back by `take_due`.
    Armed(Generation),
    /// The host could not arm a timer. The caller should write the snapshot now.
    Unarmed(FlatState),
}

/// At most one pending write, replaced wholesale by each `schedule`.
#[derive(Debug)]
pub struct WriteScheduler {
    debounce: Duration,
    state: RefCell<WriteState>,
    next_generation: Cell<Generation>,
}

impl WriteScheduler {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: RefCell::new(WriteState::Idle),
            next_generation: Cell::new(1),
        }
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), WriteState::Pending { .. })
    }

    /// Replace any pending write with `snapshot` and arm a fresh timer.
    ///
    /// `callback` builds the timer body for the new generation; it should
    /// call [`take_due`](Self::take_due) with that generation when it fires.
    pub fn schedule<F>(&self, timers: &dyn TimerQueue, snapshot: FlatState, callback: F) -> Scheduled
    where
        F: FnOnce(Generation) -> Box<dyn FnOnce()>,
    {
        let _span = debug_span!("urlsync.schedule", debounce_ms = self.debounce.as_millis() as u64)
            .entered();

        if self.clear(timers).is_some() {
            debug!("pending snapshot superseded");
        }

        let generation = self.next_generation.get();
        self.next_generation.set(generation.wrapping_add(1));

        // No borrow is held here: hosts may run arbitrary code while arming.
        match timers.set_timeout(self.debounce, callback(generation)) {
            Some(timer) => {
                *self.state.borrow_mut() = WriteState::Pending {
                    timer,
                    generation,
                    snapshot,
                };
                trace!(generation, "debounce timer armed");
                Scheduled::Armed(generation)
            }
            None => {
                debug!("host has no timers; scheduled write degrades to immediate");
                Scheduled::Unarmed(snapshot)
            }
        }
    }

    /// Consume the pending snapshot if `generation` is still current.
    ///
    /// Returns `None` for stale or cancelled timers.
    pub fn take_due(&self, generation: Generation) -> Option<FlatState> {
        let mut state = self.state.borrow_mut();
        match &*state {
            WriteState::Pending {
                generation: current,
                ..
            } if *current == generation => {}
            _ => {
                debug!(generation, "stale debounce timer ignored");
                return None;
            }
        }
        match std::mem::take(&mut *state) {
            WriteState::Pending { snapshot, .. } => Some(snapshot),
            WriteState::Idle => None,
        }
    }

    /// Disarm and discard any pending write. Returns `true` if one existed.
    pub fn cancel(&self, timers: &dyn TimerQueue) -> bool {
        self.clear(timers).is_some()
    }

    fn clear(&self, timers: &dyn TimerQueue) -> Option<FlatState> {
        let previous = std::mem::take(&mut *self.state.borrow_mut());
        match previous {
            WriteState::Pending {
                timer, snapshot, ..
            } => {
                timers.clear_timeout(timer);
                Some(snapshot)
            }
            WriteState::Idle => None,
        }
    }
}

impl Default for WriteScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
