#![forbid(unsafe_code)]
#![doc = "Boundary traits for urlsync: platform abstraction for the address bar, navigation"]
#![doc = "events, and deferred callbacks."]
#![doc = ""]
#![doc = "This crate defines the boundary between the synchronization engine and the"]
#![doc = "environment that owns the address (a browser via `urlsync-web`, or a scripted"]
#![doc = "in-memory host in tests and native tools)."]

use core::fmt;
use core::time::Duration;
use std::rc::Rc;

/// A navigable address split into the three components the engine cares about.
///
/// `query` and `fragment` are stored without their leading `?` / `#`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Everything before the query and fragment (origin and path).
    pub path: String,
    /// Query component, without the leading `?`.
    pub query: String,
    /// Fragment component, without the leading `#`.
    pub fragment: String,
}

impl Location {
    /// Create a location from its components.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        query: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
            fragment: fragment.into(),
        }
    }

    /// Split `path?query#fragment`.
    ///
    /// The fragment starts at the first `#`. The query starts at the first `?`
    /// before the fragment; a `?` inside the fragment belongs to the fragment.
    #[must_use]
    pub fn parse(href: &str) -> Self {
        let (before_hash, fragment) = match href.split_once('#') {
            Some((head, tail)) => (head, tail),
            None => (href, ""),
        };
        let (path, query) = match before_hash.split_once('?') {
            Some((head, tail)) => (head, tail),
            None => (before_hash, ""),
        };
        Self::new(path, query, fragment)
    }

    /// Render the address, omitting empty `?` and `#` markers.
    #[must_use]
    pub fn href(&self) -> String {
        let mut out =
            String::with_capacity(self.path.len() + self.query.len() + self.fragment.len() + 2);
        out.push_str(&self.path);
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            out.push('#');
            out.push_str(&self.fragment);
        }
        out
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

/// How a new address is committed to the navigation history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum HistoryMode {
    /// Overwrite the current entry in place (`history.replaceState`).
    #[default]
    Replace,
    /// Append a new navigable entry (`history.pushState`).
    Push,
}

/// Class of navigation notification a listener binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationKind {
    /// Back/forward traversal of the history stack (`popstate`).
    PopState,
    /// The fragment component changed (`hashchange`).
    HashChange,
}

impl NavigationKind {
    /// DOM event name for this kind.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::PopState => "popstate",
            Self::HashChange => "hashchange",
        }
    }
}

/// Opaque identifier for a registered navigation listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Opaque identifier for an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Read and commit the current address.
///
/// Implementations without an addressable context (no window, headless host)
/// return `None` from [`location`](Self::location) and ignore commits.
pub trait AddressBar {
    /// Current address, read fresh on every call.
    fn location(&self) -> Option<Location>;

    /// Commit a new address in place or as a new history entry.
    fn commit(&self, location: &Location, mode: HistoryMode);
}

/// Subscribe to navigation notifications.
pub trait NavigationEvents {
    /// Register `callback` for `kind`. Returns `None` when the host cannot
    /// deliver navigation events.
    fn listen(&self, kind: NavigationKind, callback: Rc<dyn Fn()>) -> Option<ListenerId>;

    /// Remove a binding. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId);
}

/// Deferred one-shot callbacks on the host's execution timeline.
///
/// Hosts may fire a callback later than requested but never earlier.
pub trait TimerQueue {
    /// Arm a timer. Returns `None` when the host has no timer facility.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Option<TimerId>;

    /// Disarm a timer. After this returns the callback must not run.
    /// Unknown or already-fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);
}

/// Unified host combining the address bar, navigation events, and timers.
///
/// The engine is generic over this trait. Concrete implementations live in
/// `urlsync-web`: the browser (`wasm32`), a deterministic in-memory host, and
/// a null host for non-interactive contexts.
pub trait Host {
    /// Address bar implementation.
    type Address: AddressBar;

    /// Navigation event source.
    type Navigation: NavigationEvents;

    /// Timer implementation.
    type Timers: TimerQueue;

    /// Access the address bar.
    fn address(&self) -> &Self::Address;

    /// Access the navigation event source.
    fn navigation(&self) -> &Self::Navigation;

    /// Access the timer queue.
    fn timers(&self) -> &Self::Timers;
}
