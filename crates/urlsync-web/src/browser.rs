#![forbid(unsafe_code)]

//! Browser host backed by `window`, `location`, and `history`.
//!
//! Only compiled on `wasm32` targets.
//!
//! Every closure handed to JS is owned by the host, keyed by its listener or
//! timer id. A listener's closure is freed by `unlisten`; a timer's closure by
//! `clear_timeout`, or by the timer itself once it has fired. Dropping a
//! closure while JS is still inside it is deferred by wasm-bindgen until the
//! call returns, so a callback may unbind or clear itself.
//!
//! Dropping the host unbinds everything it still owns.

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::Function;
use tracing::{debug, trace, warn};
use urlsync_backend::{
    AddressBar, HistoryMode, Host, ListenerId, Location, NavigationEvents, NavigationKind,
    TimerId, TimerQueue,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

type TimerMap = RefCell<HashMap<TimerId, Closure<dyn FnMut()>>>;

/// Host bound to the page's global `window`.
pub struct BrowserHost {
    window: web_sys::Window,
    listeners: RefCell<HashMap<ListenerId, (NavigationKind, Closure<dyn Fn()>)>>,
    next_listener: Cell<u64>,
    timers: Rc<TimerMap>,
}

impl BrowserHost {
    /// Bind to the global `window`. `None` outside a window context (workers,
    /// non-browser runtimes).
    #[must_use]
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        Some(Self {
            window,
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
            timers: Rc::new(RefCell::new(HashMap::new())),
        })
    }

    /// Navigation listeners currently bound to the window.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Timers armed and not yet fired or cleared.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl std::fmt::Debug for BrowserHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHost")
            .field("listeners", &self.listener_count())
            .field("timers", &self.pending_timers())
            .finish_non_exhaustive()
    }
}

impl Drop for BrowserHost {
    fn drop(&mut self) {
        for (_, (kind, closure)) in self.listeners.get_mut().drain() {
            let function: &Function = closure.as_ref().unchecked_ref();
            if let Err(err) = self
                .window
                .remove_event_listener_with_callback(kind.event_name(), function)
            {
                warn!(?err, event = kind.event_name(), "removeEventListener failed");
            }
        }
        let timers = std::mem::take(&mut *self.timers.borrow_mut());
        for id in timers.keys() {
            self.window.clear_timeout_with_handle(handle_of(*id));
        }
    }
}

fn handle_of(id: TimerId) -> i32 {
    id.0 as u32 as i32
}

fn strip_marker(text: String, marker: char) -> String {
    match text.strip_prefix(marker) {
        Some(rest) => rest.to_owned(),
        None => text,
    }
}

impl AddressBar for BrowserHost {
    fn location(&self) -> Option<Location> {
        let loc = self.window.location();
        let path = loc.pathname().ok()?;
        let query = strip_marker(loc.search().ok()?, '?');
        let fragment = strip_marker(loc.hash().ok()?, '#');
        Some(Location {
            path,
            query,
            fragment,
        })
    }

    fn commit(&self, location: &Location, mode: HistoryMode) {
        let Ok(history) = self.window.history() else {
            debug!("history unavailable; commit dropped");
            return;
        };
        let href = location.href();
        let result = match mode {
            HistoryMode::Replace => {
                let state = history.state().unwrap_or(JsValue::NULL);
                history.replace_state_with_url(&state, "", Some(&href))
            }
            HistoryMode::Push => history.push_state_with_url(&JsValue::NULL, "", Some(&href)),
        };
        if let Err(err) = result {
            warn!(?err, href = href.as_str(), "history commit rejected");
        }
    }
}

impl NavigationEvents for BrowserHost {
    fn listen(&self, kind: NavigationKind, callback: Rc<dyn Fn()>) -> Option<ListenerId> {
        let closure = Closure::<dyn Fn()>::new(move || callback());
        let function: &Function = closure.as_ref().unchecked_ref();
        if let Err(err) = self
            .window
            .add_event_listener_with_callback(kind.event_name(), function)
        {
            warn!(?err, event = kind.event_name(), "addEventListener failed");
            return None;
        }
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().insert(id, (kind, closure));
        Some(id)
    }

    fn unlisten(&self, id: ListenerId) {
        let Some((kind, closure)) = self.listeners.borrow_mut().remove(&id) else {
            return;
        };
        let function: &Function = closure.as_ref().unchecked_ref();
        if let Err(err) = self
            .window
            .remove_event_listener_with_callback(kind.event_name(), function)
        {
            warn!(?err, event = kind.event_name(), "removeEventListener failed");
        }
    }
}

impl TimerQueue for BrowserHost {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Option<TimerId> {
        // Filled in once the browser hands back a handle; a timer never fires
        // synchronously from setTimeout.
        let own_id: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
        let registry = Rc::downgrade(&self.timers);
        let mut body = Some(callback);

        let fired_id = Rc::clone(&own_id);
        let closure = Closure::<dyn FnMut()>::new(move || {
            let entry = match (fired_id.get(), registry.upgrade()) {
                (Some(id), Some(timers)) => timers.borrow_mut().remove(&id),
                _ => None,
            };
            if let Some(body) = body.take() {
                body();
            }
            drop(entry);
        });

        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let function: &Function = closure.as_ref().unchecked_ref();
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(function, millis)
        {
            Ok(handle) => {
                let id = TimerId(u64::from(handle as u32));
                own_id.set(Some(id));
                self.timers.borrow_mut().insert(id, closure);
                trace!(timer = id.0, millis, "timer armed");
                Some(id)
            }
            Err(err) => {
                warn!(?err, "setTimeout failed");
                None
            }
        }
    }

    fn clear_timeout(&self, id: TimerId) {
        self.window.clear_timeout_with_handle(handle_of(id));
        let released = self.timers.borrow_mut().remove(&id);
        drop(released);
    }
}

impl Host for BrowserHost {
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
