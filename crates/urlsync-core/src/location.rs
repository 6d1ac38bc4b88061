#![forbid(unsafe_code)]

//! Query location strategies: where the query text lives in the address.
//!
//! Two addressing modes share one contract ([`QueryLocation`]):
//!
//! | Mode                     | Owned text                            | Preserved on write            |
//! |--------------------------|---------------------------------------|-------------------------------|
//! | [`AddressingMode::Query`]    | the query component (`?a=1`)      | path, fragment                |
//! | [`AddressingMode::Fragment`] | fragment text after its first `?` | path, query, fragment base    |
//!
//! The strategy is chosen once at engine construction; the projector only
//! ever talks to the trait object.

use tracing::debug;
use urlsync_backend::{AddressBar, HistoryMode, Location, NavigationKind};

use crate::query::QueryParams;

/// Which part of the address carries the synchronized query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config-file", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case"))]
pub enum AddressingMode {
    /// Plain query component: `/page?a=1#frag`.
    #[default]
    Query,
    /// Query embedded in the fragment: `/page#/route?a=1`.
    Fragment,
}

impl AddressingMode {
    /// Build the strategy for this mode.
    #[must_use]
    pub fn strategy(self) -> Box<dyn QueryLocation> {
        match self {
            Self::Query => Box::new(PlainQuery),
            Self::Fragment => Box::new(FragmentQuery),
        }
    }
}

/// Read/write contract for one addressing mode.
pub trait QueryLocation {
    /// Query text currently in effect, without a leading `?`. Empty when the
    /// host has no address or the mode finds no query.
    fn read_raw(&self, address: &dyn AddressBar) -> String;

    /// Replace the owned query text with `query`, preserving everything else,
    /// and commit it. No-op without an address.
    fn write_raw(&self, address: &dyn AddressBar, query: &QueryParams, history: HistoryMode);

    /// Navigation notification that signals a change for this mode.
    fn navigation_kind(&self) -> NavigationKind;

    /// Parsed form of [`read_raw`](Self::read_raw).
    fn read(&self, address: &dyn AddressBar) -> QueryParams {
        QueryParams::parse(&self.read_raw(address))
    }
}

/// Query text in the address's query component.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainQuery;

impl QueryLocation for PlainQuery {
    fn read_raw(&self, address: &dyn AddressBar) -> String {
        address.location().map(|loc| loc.query).unwrap_or_default()
    }

    fn write_raw(&self, address: &dyn AddressBar, query: &QueryParams, history: HistoryMode) {
        let Some(current) = address.location() else {
            debug!("no addressable context; plain query write skipped");
            return;
        };
        let next = Location {
            query: query.to_query_string(),
            ..current
        };
        address.commit(&next, history);
    }

    fn navigation_kind(&self) -> NavigationKind {
        NavigationKind::PopState
    }
}

/// Query text after the first `?` of the fragment (`#/base?a=1`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentQuery;

impl FragmentQuery {
    /// Split a fragment into its base path and embedded query text.
    #[must_use]
    pub fn split(fragment: &str) -> (&str, &str) {
        fragment.split_once('?').unwrap_or((fragment, ""))
    }
}

impl QueryLocation for FragmentQuery {
    fn read_raw(&self, address: &dyn AddressBar) -> String {
        address
            .location()
            .map(|loc| Self::split(&loc.fragment).1.to_owned())
            .unwrap_or_default()
    }

    fn write_raw(&self, address: &dyn AddressBar, query: &QueryParams, history: HistoryMode) {
        let Some(current) = address.location() else {
            debug!("no addressable context; fragment query write skipped");
            return;
        };
        let (base, _) = Self::split(&current.fragment);
        let text = query.to_query_string();
        let fragment = if text.is_empty() {
            base.to_owned()
        } else {
            format!("{base}?{text}")
        };
        let next = Location {
            fragment,
            ..current
        };
        address.commit(&next, history);
    }

    fn navigation_kind(&self) -> NavigationKind {
        NavigationKind::HashChange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Minimal address bar recording commits.
    struct FakeBar {
        current: RefCell<Option<Location>>,
        commits: RefCell<Vec<(String, HistoryMode)>>,
    }

    impl FakeBar {
        fn at(href: &str) -> Self {
            Self {
                current: RefCell::new(Some(Location::parse(href))),
                commits: RefCell::new(Vec::new()),
            }
        }

        fn detached() -> Self {
            Self {
                current: RefCell::new(None),
                commits: RefCell::new(Vec::new()),
            }
        }

        fn href(&self) -> String {
            self.current
                .borrow()
                .as_ref()
                .map(Location::href)
                .unwrap_or_default()
        }
    }

    impl AddressBar for FakeBar {
        fn location(&self) -> Option<Location> {
            self.current.borrow().clone()
        }

        fn commit(&self, location: &Location, mode: HistoryMode) {
            self.commits.borrow_mut().push((location.href(), mode));
            *self.current.borrow_mut() = Some(location.clone());
        }
    }

    #[test]
    fn plain_reads_query_component() {
        let bar = FakeBar::at("/p?a=1&b=2#/frag?x=9");
        assert_eq!(PlainQuery.read_raw(&bar), "a=1&b=2");
    }

    #[test]
    fn plain_write_preserves_path_and_fragment() {
        let bar = FakeBar::at("/p?old=1#frag");
        let q = QueryParams::parse("n=2");
        PlainQuery.write_raw(&bar, &q, HistoryMode::Push);
        assert_eq!(bar.href(), "/p?n=2#frag");
        assert_eq!(bar.commits.borrow()[0].1, HistoryMode::Push);
    }

    #[test]
    fn plain_write_of_empty_query_drops_marker() {
        let bar = FakeBar::at("/p?old=1#frag");
        PlainQuery.write_raw(&bar, &QueryParams::empty(), HistoryMode::Replace);
        assert_eq!(bar.href(), "/p#frag");
    }

    #[test]
    fn fragment_reads_after_first_question_mark() {
        let bar = FakeBar::at("/p?plain=1#/base?keep=1&z=a?b");
        assert_eq!(FragmentQuery.read_raw(&bar), "keep=1&z=a?b");
    }

    #[test]
    fn fragment_without_query_reads_empty() {
        let bar = FakeBar::at("/p#/base");
        assert_eq!(FragmentQuery.read_raw(&bar), "");
    }

    #[test]
    fn fragment_write_preserves_base_path_and_plain_query() {
        let bar = FakeBar::at("/p?plain=1#/base?keep=1");
        let q = QueryParams::parse("keep=1&p_a=x");
        FragmentQuery.write_raw(&bar, &q, HistoryMode::Replace);
        assert_eq!(bar.href(), "/p?plain=1#/base?keep=1&p_a=x");
    }

    #[test]
    fn fragment_write_of_empty_query_keeps_only_base() {
        let bar = FakeBar::at("/p#/base?gone=1");
        FragmentQuery.write_raw(&bar, &QueryParams::empty(), HistoryMode::Replace);
        assert_eq!(bar.href(), "/p#/base");
    }

    #[test]
    fn fragment_write_on_bare_address_starts_fragment() {
        let bar = FakeBar::at("/p");
        FragmentQuery.write_raw(&bar, &QueryParams::parse("a=1"), HistoryMode::Replace);
        assert_eq!(bar.href(), "/p#?a=1");
    }

    #[test]
    fn detached_address_is_inert() {
        let bar = FakeBar::detached();
        for strategy in [AddressingMode::Query.strategy(), AddressingMode::Fragment.strategy()] {
            assert_eq!(strategy.read_raw(&bar), "");
            strategy.write_raw(&bar, &QueryParams::parse("a=1"), HistoryMode::Push);
        }
        assert!(bar.commits.borrow().is_empty());
    }

    #[test]
    fn navigation_kind_follows_mode() {
        assert_eq!(
            AddressingMode::Query.strategy().navigation_kind(),
            NavigationKind::PopState
        );
        assert_eq!(
            AddressingMode::Fragment.strategy().navigation_kind(),
            NavigationKind::HashChange
        );
    }
}
