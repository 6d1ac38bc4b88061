#![forbid(unsafe_code)]

//! urlsync core
//!
//! Keeps a flat set of primitive fields synchronized with the URL query,
//! either in the plain query component (`/page?a=1`) or embedded in the
//! fragment (`/page#/route?a=1`), and coalesces bursts of writes into
//! infrequent history entries.
//!
//! # Key Components
//!
//! - [`codec`] - Text to primitive conversion (`"42"` → `42`, `"true"` → `true`)
//! - [`query`] - Ordered query pairs with `URLSearchParams` mutation semantics
//! - [`location`] - Plain vs fragment-embedded query read/write strategies
//! - [`projector`] - Allow-list / prefix / wildcard mapping between state and query
//! - [`scheduler`] - Debounce state machine with flush and cancel
//! - [`listener`] - Single navigation binding per engine
//! - [`UrlStateSync`] - The engine tying the above to a [`Host`](urlsync_backend::Host)
//!
//! # Errors
//!
//! Runtime operations never fail: unparseable text decodes as a string and a
//! host without an address bar turns reads into defaults and writes into
//! no-ops. Only configuration loading returns [`ConfigError`].

pub mod codec;
pub mod config;
pub mod engine;
pub mod listener;
pub mod location;
pub mod projector;
pub mod query;
pub mod scheduler;
pub mod value;

pub use config::{ConfigError, SyncConfig};
pub use engine::{Detach, UrlStateSync};
pub use location::{AddressingMode, FragmentQuery, PlainQuery, QueryLocation};
pub use projector::{StateProjector, WildcardKeys};
pub use query::QueryParams;
pub use scheduler::{DEFAULT_DEBOUNCE, Scheduled, WriteScheduler};
pub use value::{FlatState, Value};

pub use urlsync_backend::{HistoryMode, Location};
