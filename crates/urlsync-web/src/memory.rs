#![forbid(unsafe_code)]

//! Deterministic, host-driven in-memory address bar.
//!
//! [`MemoryHost`] scripts everything a browser would do on its own:
//!
//! - a history stack with a cursor (`navigate`, `back`, `forward`, `set_fragment`)
//! - navigation events, dispatched synchronously when the script moves the cursor
//! - a monotonic clock that only moves when the caller [`advance`](MemoryHost::advance)s it
//!
//! Timers fire in deadline order, ties broken by arming order. A timer armed
//! from inside a callback fires within the same `advance` if its deadline has
//! been reached.

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;
use urlsync_backend::{
    AddressBar, HistoryMode, Host, ListenerId, Location, NavigationEvents, NavigationKind,
    TimerId, TimerQueue,
};

struct Listener {
    id: ListenerId,
    kind: NavigationKind,
    callback: Rc<dyn Fn()>,
}

struct PendingTimer {
    id: TimerId,
    deadline: Duration,
    callback: Box<dyn FnOnce()>,
}

#[derive(Debug)]
struct HistoryStack {
    entries: Vec<Location>,
    cursor: usize,
}

impl HistoryStack {
    fn current(&self) -> &Location {
        &self.entries[self.cursor]
    }

    fn push(&mut self, location: Location) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(location);
        self.cursor = self.entries.len() - 1;
    }
}

/// Scripted address bar, navigation source, and timer queue.
pub struct MemoryHost {
    addressable: bool,
    history: RefCell<HistoryStack>,
    commits: Cell<usize>,
    listeners: RefCell<Vec<Listener>>,
    next_listener: Cell<u64>,
    now: Cell<Duration>,
    timers: RefCell<Vec<PendingTimer>>,
    next_timer: Cell<u64>,
}

impl MemoryHost {
    /// Create a host whose single history entry is `href`.
    #[must_use]
    pub fn new(href: &str) -> Self {
        Self::build(href, true)
    }

    /// A host with no addressable context: reads see no address and commits
    /// are dropped. Timers and listeners still work.
    #[must_use]
    pub fn detached() -> Self {
        Self::build("", false)
    }

    fn build(href: &str, addressable: bool) -> Self {
        Self {
            addressable,
            history: RefCell::new(HistoryStack {
                entries: vec![Location::parse(href)],
                cursor: 0,
            }),
            commits: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            now: Cell::new(Duration::ZERO),
            timers: RefCell::new(Vec::new()),
            next_timer: Cell::new(0),
        }
    }

    /// Current address as text.
    #[must_use]
    pub fn href(&self) -> String {
        self.history.borrow().current().href()
    }

    /// Number of entries in the history stack.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.borrow().entries.len()
    }

    /// Number of commits received through [`AddressBar::commit`].
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.get()
    }

    /// Push `href` without firing events, like an app-initiated `pushState`.
    pub fn navigate(&self, href: &str) {
        self.history.borrow_mut().push(Location::parse(href));
    }

    /// Push a new entry with `fragment` replaced, then fire `popstate` and
    /// `hashchange`, like a user editing the hash.
    pub fn set_fragment(&self, fragment: &str) {
        let changed = {
            let mut history = self.history.borrow_mut();
            let next = Location {
                fragment: fragment.trim_start_matches('#').to_owned(),
                ..history.current().clone()
            };
            let changed = next.fragment != history.current().fragment;
            history.push(next);
            changed
        };
        self.dispatch(NavigationKind::PopState);
        if changed {
            self.dispatch(NavigationKind::HashChange);
        }
    }

    /// Step back one entry. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    /// Step forward one entry. Returns `false` at the end of history.
    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    fn traverse(&self, delta: isize) -> bool {
        let fragment_changed = {
            let mut history = self.history.borrow_mut();
            let Some(target) = history.cursor.checked_add_signed(delta) else {
                return false;
            };
            if target >= history.entries.len() {
                return false;
            }
            let before = history.current().fragment.clone();
            history.cursor = target;
            before != history.current().fragment
        };
        self.dispatch(NavigationKind::PopState);
        if fragment_changed {
            self.dispatch(NavigationKind::HashChange);
        }
        true
    }

    /// Deliver `kind` to every listener registered when dispatch starts.
    /// A listener removed mid-dispatch is skipped.
    fn dispatch(&self, kind: NavigationKind) {
        let targets: Vec<(ListenerId, Rc<dyn Fn()>)> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| (l.id, Rc::clone(&l.callback)))
            .collect();
        trace!(event = kind.event_name(), listeners = targets.len(), "dispatch");
        for (id, callback) in targets {
            let still_bound = self.listeners.borrow().iter().any(|l| l.id == id);
            if still_bound {
                callback();
            }
        }
    }

    /// Number of currently bound listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Current monotonic time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Advance the clock by `dt` and fire every timer that became due.
    pub fn advance(&self, dt: Duration) {
        self.now.set(self.now.get().saturating_add(dt));
        while let Some(timer) = self.take_next_due() {
            trace!(timer = timer.id.0, "timer fired");
            (timer.callback)();
        }
    }

    fn take_next_due(&self) -> Option<PendingTimer> {
        let now = self.now.get();
        let mut timers = self.timers.borrow_mut();
        // Ids are handed out in arming order, so they break deadline ties.
        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.id))
            .map(|(i, _)| i)?;
        Some(timers.remove(index))
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("addressable", &self.addressable)
            .field("history", &self.history.borrow())
            .field("commits", &self.commits.get())
            .field("listeners", &self.listeners.borrow().len())
            .field("now", &self.now.get())
            .field("timers", &self.timers.borrow().len())
            .finish()
    }
}

impl AddressBar for MemoryHost {
    fn location(&self) -> Option<Location> {
        self.addressable
            .then(|| self.history.borrow().current().clone())
    }

    fn commit(&self, location: &Location, mode: HistoryMode) {
        if !self.addressable {
            return;
        }
        self.commits.set(self.commits.get() + 1);
        let mut history = self.history.borrow_mut();
        match mode {
            HistoryMode::Replace => {
                let cursor = history.cursor;
                history.entries[cursor] = location.clone();
            }
            HistoryMode::Push => history.push(location.clone()),
        }
    }
}

impl NavigationEvents for MemoryHost {
    fn listen(&self, kind: NavigationKind, callback: Rc<dyn Fn()>) -> Option<ListenerId> {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push(Listener { id, kind, callback });
        Some(id)
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|l| l.id != id);
    }
}

impl TimerQueue for MemoryHost {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Option<TimerId> {
        let id = TimerId(self.next_timer.get());
        self.next_timer.set(id.0 + 1);
        self.timers.borrow_mut().push(PendingTimer {
            id,
            deadline: self.now.get().saturating_add(delay),
            callback,
        });
        Some(id)
    }

    fn clear_timeout(&self, id: TimerId) {
        self.timers.borrow_mut().retain(|t| t.id != id);
    }
}

impl Host for MemoryHost {
    type Address = Self;
    type Navigation = Self;
    type Timers = Self;

    fn address(&self) -> &Self {
        self
    }

    fn navigation(&self) -> &Self {
        self
    }

    fn timers(&self) -> &Self {
        self
    }
}
