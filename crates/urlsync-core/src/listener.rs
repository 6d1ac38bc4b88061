#![forbid(unsafe_code)]

//! Navigation listener bookkeeping: at most one active binding per engine.
//!
//! Attaching while a binding is active removes the old binding first, so a
//! navigation event never reaches two callbacks of the same engine. Each
//! attach gets a fresh token; detaching by token only removes the binding it
//! created, which keeps stale detach handles harmless.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;
use urlsync_backend::{ListenerId, NavigationEvents, NavigationKind};

/// Identifies one `attach` call.
pub type AttachToken = u64;

#[derive(Debug, Clone, Copy)]
struct ActiveListener {
    token: AttachToken,
    id: ListenerId,
}

#[derive(Debug)]
pub struct NavigationListener {
    kind: NavigationKind,
    active: RefCell<Option<ActiveListener>>,
    next_token: Cell<AttachToken>,
}

impl NavigationListener {
    #[must_use]
    pub fn new(kind: NavigationKind) -> Self {
        Self {
            kind,
            active: RefCell::new(None),
            next_token: Cell::new(1),
        }
    }

    /// Event class this listener binds to.
    #[must_use]
    pub fn kind(&self) -> NavigationKind {
        self.kind
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.active.borrow().is_some()
    }

    /// Bind `callback`, replacing any active binding.
    ///
    /// Returns the token for this attach even when the host cannot deliver
    /// events; in that case nothing is bound and the token matches nothing.
    pub fn attach(&self, events: &dyn NavigationEvents, callback: Rc<dyn Fn()>) -> AttachToken {
        if self.detach(events) {
            debug!(kind = self.kind.event_name(), "replacing active navigation listener");
        }
        let token = self.next_token.get();
        self.next_token.set(token.wrapping_add(1));

        match events.listen(self.kind, callback) {
            Some(id) => {
                *self.active.borrow_mut() = Some(ActiveListener { token, id });
            }
            None => debug!(
                kind = self.kind.event_name(),
                "host has no navigation events; listener not bound"
            ),
        }
        token
    }

    /// Remove the active binding, if any. Idempotent.
    pub fn detach(&self, events: &dyn NavigationEvents) -> bool {
        let taken = self.active.borrow_mut().take();
        match taken {
            Some(active) => {
                events.unlisten(active.id);
                true
            }
            None => false,
        }
    }

    /// Remove the active binding only if it was created by `token`.
    pub fn detach_token(&self, events: &dyn NavigationEvents, token: AttachToken) -> bool {
        let taken = {
            let mut active = self.active.borrow_mut();
            if active.is_some_and(|current| current.token == token) {
                active.take()
            } else {
                None
            }
        };
        match taken {
            Some(active) => {
                events.unlisten(active.id);
                true
            }
            None => false,
        }
    }
}
