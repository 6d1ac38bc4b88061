#![forbid(unsafe_code)]

//! Host for non-interactive contexts: nothing is addressable.

use core::time::Duration;
use std::rc::Rc;

use urlsync_backend::{
    AddressBar, HistoryMode, Host, ListenerId, Location, NavigationEvents, NavigationKind,
    TimerId, TimerQueue,
};

/// Every capability is unavailable. Reads come back empty, writes, listeners,
/// and timers are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl AddressBar for NullHost {
    fn location(&self) -> Option<Location> {
        None
    }

    fn commit(&self, _location: &Location, _mode: HistoryMode) {}
}

impl NavigationEvents for NullHost {
    fn listen(&self, _kind: NavigationKind, _callback: Rc<dyn Fn()>) -> Option<ListenerId> {
        None
    }

    fn unlisten(&self, _id: ListenerId) {}
}

impl TimerQueue for NullHost {
    fn set_timeout(&self, _delay: Duration, _callback: Box<dyn FnOnce()>) -> Option<TimerId> {
        None
    }

    fn clear_timeout(&self, _id: TimerId) {}
}

impl Host for NullHost {
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
