#![forbid(unsafe_code)]

//! The synchronization engine: one configured instance per state owner.
//!
//! # Design
//!
//! [`UrlStateSync`] is a cheap, cloneable handle to shared single-threaded
//! state (`Rc`). Timer and navigation callbacks capture a `Weak` handle, so
//! the host never keeps an engine alive and the engine never holds a
//! `RefCell` borrow while calling out. Any engine method may therefore be
//! called from inside a navigation callback or a timer-driven write.
//!
//! Dropping the last handle disarms the pending timer (the pending write is
//! discarded) and unbinds the navigation listener.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use urlsync_core::{FlatState, SyncConfig, UrlStateSync};
//! use urlsync_web::MemoryHost;
//!
//! let host = Rc::new(MemoryHost::new("/list?t_page=2&other=x"));
//! let sync = UrlStateSync::new(
//!     Rc::clone(&host),
//!     SyncConfig::new().with_prefix("t_").with_fields(["page", "sort"]),
//! );
//!
//! let state = sync.read_initial_state(&FlatState::new().with("sort", "name"));
//! assert_eq!(state, FlatState::new().with("page", 2).with("sort", "name"));
//!
//! sync.flush(state.with("page", 3));
//! assert_eq!(host.href(), "/list?t_page=3&other=x&t_sort=name");
//! ```

use std::rc::{Rc, Weak};

use tracing::{debug, debug_span};
use urlsync_backend::Host;

use crate::config::SyncConfig;
use crate::listener::NavigationListener;
use crate::location::AddressingMode;
use crate::projector::StateProjector;
use crate::scheduler::{Scheduled, WriteScheduler};
use crate::value::FlatState;

struct EngineInner<H: Host> {
    host: Rc<H>,
    config: SyncConfig,
    projector: StateProjector,
    scheduler: WriteScheduler,
    listener: NavigationListener,
}

impl<H: Host> EngineInner<H> {
    fn write(&self, state: &FlatState) {
        self.projector.serialize(self.host.address(), state);
    }

    fn project(&self, defaults: &FlatState) -> FlatState {
        self.projector.project(self.host.address(), defaults)
    }
}

impl<H: Host> Drop for EngineInner<H> {
    fn drop(&mut self) {
        if self.scheduler.cancel(self.host.timers()) {
            debug!("engine dropped with a pending write; discarded");
        }
        self.listener.detach(self.host.navigation());
    }
}

/// Keeps a flat state in sync with the address query.
pub struct UrlStateSync<H: Host + 'static> {
    inner: Rc<EngineInner<H>>,
}

impl<H: Host + 'static> Clone for UrlStateSync<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host + 'static> std::fmt::Debug for UrlStateSync<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlStateSync")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.scheduler.is_pending())
            .field("attached", &self.inner.listener.is_attached())
            .finish()
    }
}

impl<H: Host + 'static> UrlStateSync<H> {
    /// Create an engine over `host`. The configuration, including the
    /// addressing mode, is fixed from here on.
    #[must_use]
    pub fn new(host: Rc<H>, config: SyncConfig) -> Self {
        let strategy = config.mode.strategy();
        let kind = strategy.navigation_kind();
        let projector = StateProjector::new(
            config.prefix.clone(),
            config.fields.clone(),
            config.wildcard,
            config.history,
            strategy,
        );
        let scheduler = WriteScheduler::new(config.debounce());
        Self {
            inner: Rc::new(EngineInner {
                host,
                config,
                projector,
                scheduler,
                listener: NavigationListener::new(kind),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn mode(&self) -> AddressingMode {
        self.inner.config.mode
    }

    #[must_use]
    pub fn host(&self) -> &Rc<H> {
        &self.inner.host
    }

    /// Read the current address and overlay it onto `defaults`.
    #[must_use]
    pub fn read_initial_state(&self, defaults: &FlatState) -> FlatState {
        self.inner.project(defaults)
    }

    /// Write `state` now, leaving any pending scheduled write in place.
    pub fn serialize_state_to_url(&self, state: &FlatState) {
        self.inner.write(state);
    }

    /// Write `state` after the debounce interval, superseding any earlier
    /// scheduled snapshot.
    pub fn schedule(&self, state: FlatState) {
        let weak = Rc::downgrade(&self.inner);
        let outcome = self
            .inner
            .scheduler
            .schedule(
                self.inner.host.timers(),
                state,
                |generation| -> Box<dyn FnOnce()> {
                    Box::new(move || fire_scheduled(&weak, generation))
                },
            );
        if let Scheduled::Unarmed(snapshot) = outcome {
            self.inner.write(&snapshot);
        }
    }

    /// Disarm any pending write and write `state` immediately.
    pub fn flush(&self, state: FlatState) {
        if self.inner.scheduler.cancel(self.inner.host.timers()) {
            debug!("flush superseded pending snapshot");
        }
        self.inner.write(&state);
    }

    /// Discard any pending write without writing.
    pub fn cancel(&self) {
        self.inner.scheduler.cancel(self.inner.host.timers());
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.scheduler.is_pending()
    }

    /// Call `on_change` with the re-projected state whenever the user
    /// navigates (`popstate` in query mode, `hashchange` in fragment mode).
    ///
    /// An already attached listener is detached first. The returned
    /// [`Detach`] removes exactly this binding.
    pub fn attach_popstate_listener<F>(&self, on_change: F) -> Detach
    where
        F: Fn(FlatState) + 'static,
    {
        let weak = Rc::downgrade(&self.inner);
        let callback: Rc<dyn Fn()> = Rc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let _span = debug_span!(
                "urlsync.navigation",
                kind = inner.listener.kind().event_name()
            )
            .entered();
            let state = inner.project(&FlatState::new());
            on_change(state);
        });

        let token = self
            .inner
            .listener
            .attach(self.inner.host.navigation(), callback);

        let weak = Rc::downgrade(&self.inner);
        Detach {
            detach: Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .listener
                        .detach_token(inner.host.navigation(), token);
                }
            }),
        }
    }

    /// Remove the active navigation listener, if any. Idempotent.
    pub fn detach_popstate(&self) {
        self.inner.listener.detach(self.inner.host.navigation());
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.listener.is_attached()
    }
}

fn fire_scheduled<H: Host>(weak: &Weak<EngineInner<H>>, generation: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    if let Some(snapshot) = inner.scheduler.take_due(generation) {
        inner.write(&snapshot);
    }
}

/// Removes the navigation binding created by one
/// [`UrlStateSync::attach_popstate_listener`] call.
///
/// Dropping the handle does not detach.
pub struct Detach {
    detach: Box<dyn Fn()>,
}

impl Detach {
    /// Remove the binding. Idempotent; a no-op once the binding has been
    /// replaced by a newer attach or the engine is gone.
    pub fn detach(&self) {
        (self.detach)();
    }
}

impl std::fmt::Debug for Detach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detach").finish_non_exhaustive()
    }
}
