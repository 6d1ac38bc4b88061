#![forbid(unsafe_code)]

//! `urlsync-web` provides hosts for the urlsync engine.
//!
//! - [`BrowserHost`] (`wasm32` only): `window.location`, `history.pushState` /
//!   `replaceState`, `popstate` / `hashchange` listeners, and `setTimeout`.
//! - [`MemoryHost`]: a deterministic, host-driven stand-in. The caller scripts
//!   navigation and advances the clock explicitly, so engine behavior can be
//!   tested without a browser.
//! - [`NullHost`]: a context with no address bar at all.

pub mod memory;
pub mod null;

#[cfg(target_arch = "wasm32")]
mod browser;

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserHost;

pub use memory::MemoryHost;
pub use null::NullHost;
