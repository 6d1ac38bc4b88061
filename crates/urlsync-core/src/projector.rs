#![forbid(unsafe_code)]

//! State projector: maps a [`FlatState`] onto the query representation and back.
//!
//! # Field selection
//!
//! - **Allow-list** (`fields` non-empty): only listed fields are read or
//!   written. Reads try `prefix + field` first and fall back to the bare
//!   field name.
//! - **Wildcard** (`fields` empty): every URL key is read (prefix stripped
//!   when present) and every key in the written state is managed.
//!
//! # Invariants
//!
//! 1. Keys the projector does not manage are carried through a write unchanged.
//! 2. Absent values and empty strings delete both the prefixed and bare key.
//! 3. A decoded URL value always wins over the supplied default; a missing
//!    key always keeps the default.

use tracing::{debug_span, trace};
use urlsync_backend::{AddressBar, HistoryMode};

use crate::codec;
use crate::location::QueryLocation;
use crate::query::QueryParams;
use crate::value::{FlatState, Value};

/// Which URL keys a wildcard read includes when a prefix is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config-file", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case"))]
pub enum WildcardKeys {
    /// Every key: prefixed keys are stripped, unprefixed keys pass through as-is.
    #[default]
    All,
    /// Only keys carrying the prefix. Equivalent to `All` when the prefix is empty.
    PrefixedOnly,
}

/// Projects flat state to and from the address via a [`QueryLocation`].
pub struct StateProjector {
    prefix: String,
    fields: Vec<String>,
    wildcard: WildcardKeys,
    history: HistoryMode,
    strategy: Box<dyn QueryLocation>,
}

impl std::fmt::Debug for StateProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProjector")
            .field("prefix", &self.prefix)
            .field("fields", &self.fields)
            .field("wildcard", &self.wildcard)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl StateProjector {
    #[must_use]
    pub fn new(
        prefix: impl Into<String>,
        fields: Vec<String>,
        wildcard: WildcardKeys,
        history: HistoryMode,
        strategy: Box<dyn QueryLocation>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            fields,
            wildcard,
            history,
            strategy,
        }
    }

    /// The location strategy this projector reads and writes through.
    #[must_use]
    pub fn strategy(&self) -> &dyn QueryLocation {
        self.strategy.as_ref()
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read the address and overlay decoded values onto `defaults`.
    #[must_use]
    pub fn project(&self, address: &dyn AddressBar, defaults: &FlatState) -> FlatState {
        let _span = debug_span!(
            "urlsync.project",
            fields = self.fields.len(),
            wildcard = self.fields.is_empty()
        )
        .entered();

        let params = self.strategy.read(address);
        let mut state = defaults.clone();

        if self.fields.is_empty() {
            self.project_wildcard(&params, &mut state);
            return state;
        }

        for field in &self.fields {
            let raw = params
                .get(&self.prefixed(field))
                .or_else(|| params.get(field));
            match codec::decode(raw) {
                Some(value) => {
                    trace!(field = field.as_str(), value = %value, "field read from url");
                    state.set(field.as_str(), value);
                }
                None => trace!(field = field.as_str(), "field missing; default kept"),
            }
        }
        state
    }

    fn project_wildcard(&self, params: &QueryParams, state: &mut FlatState) {
        for (key, raw) in params.iter() {
            let name = match key.strip_prefix(self.prefix.as_str()) {
                Some(stripped) if !self.prefix.is_empty() => stripped,
                _ if self.wildcard == WildcardKeys::PrefixedOnly && !self.prefix.is_empty() => {
                    trace!(key, "unprefixed key skipped");
                    continue;
                }
                _ => key,
            };
            if let Some(value) = codec::decode(Some(raw)) {
                state.set(name, value);
            }
        }
    }

    /// Write `state` into the address, leaving unmanaged keys untouched.
    pub fn serialize(&self, address: &dyn AddressBar, state: &FlatState) {
        let _span = debug_span!(
            "urlsync.serialize",
            keys = state.len(),
            history = ?self.history
        )
        .entered();

        let mut params = self.strategy.read(address);

        if self.fields.is_empty() {
            for (key, value) in state.iter() {
                self.apply(&mut params, key, value);
            }
        } else {
            for field in &self.fields {
                // Fields missing from the state are left alone.
                if let Some(value) = state.entry(field) {
                    self.apply(&mut params, field, value);
                }
            }
        }

        self.strategy.write_raw(address, &params, self.history);
    }

    fn apply(&self, params: &mut QueryParams, key: &str, value: Option<&Value>) {
        let prefixed = self.prefixed(key);
        match value {
            Some(value) if !value.is_empty_str() => {
                params.set(&prefixed, codec::encode(value));
            }
            _ => {
                trace!(key, "absent or empty; removing prefixed and bare keys");
                params.delete(&prefixed);
                params.delete(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::AddressingMode;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use urlsync_backend::Location;

    struct Bar(RefCell<Location>);

    impl Bar {
        fn at(href: &str) -> Self {
            Self(RefCell::new(Location::parse(href)))
        }

        fn href(&self) -> String {
            self.0.borrow().href()
        }
    }

    impl AddressBar for Bar {
        fn location(&self) -> Option<Location> {
            Some(self.0.borrow().clone())
        }

        fn commit(&self, location: &Location, _mode: HistoryMode) {
            *self.0.borrow_mut() = location.clone();
        }
    }

    fn projector(prefix: &str, fields: &[&str], mode: AddressingMode) -> StateProjector {
        StateProjector::new(
            prefix,
            fields.iter().map(|f| (*f).to_owned()).collect(),
            WildcardKeys::All,
            HistoryMode::Replace,
            mode.strategy(),
        )
    }

    #[test]
    fn allow_list_read_with_defaults() {
        let bar = Bar::at("/?t_page=2&t_flag=true&other=hello");
        let p = projector("t_", &["page", "flag", "missing"], AddressingMode::Query);
        let state = p.project(&bar, &FlatState::new().with("missing", 5));
        assert_eq!(
            state,
            FlatState::new()
                .with("page", 2)
                .with("flag", true)
                .with("missing", 5)
        );
    }

    #[test]
    fn allow_list_falls_back_to_bare_key() {
        let bar = Bar::at("/?page=3&t_flag=false");
        let p = projector("t_", &["page", "flag"], AddressingMode::Query);
        let state = p.project(&bar, &FlatState::new());
        assert_eq!(state, FlatState::new().with("page", 3).with("flag", false));
    }

    #[test]
    fn prefixed_key_wins_over_bare_key() {
        let bar = Bar::at("/?page=3&t_page=4");
        let p = projector("t_", &["page"], AddressingMode::Query);
        assert_eq!(
            p.project(&bar, &FlatState::new()),
            FlatState::new().with("page", 4)
        );
    }

    #[test]
    fn url_value_overrides_default() {
        let bar = Bar::at("/?q=found");
        let p = projector("", &["q"], AddressingMode::Query);
        let state = p.project(&bar, &FlatState::new().with("q", "default"));
        assert_eq!(state.get("q"), Some(&Value::from("found")));
    }

    #[test]
    fn absent_default_is_preserved() {
        let bar = Bar::at("/");
        let p = projector("", &["q"], AddressingMode::Query);
        let state = p.project(&bar, &FlatState::new().with_absent("q"));
        assert_eq!(state.entry("q"), Some(None));
    }

    #[test]
    fn wildcard_strips_prefix_and_keeps_foreign_keys() {
        let bar = Bar::at("/?a=1&pref_x=hello&pref_y=10&z=false");
        let p = projector("pref_", &[], AddressingMode::Query);
        assert_eq!(
            p.project(&bar, &FlatState::new()),
            FlatState::new()
                .with("a", 1)
                .with("x", "hello")
                .with("y", 10)
                .with("z", false)
        );
    }

    #[test]
    fn wildcard_prefixed_only_skips_foreign_keys() {
        let bar = Bar::at("/?a=1&pref_x=hello&z=false");
        let p = StateProjector::new(
            "pref_",
            Vec::new(),
            WildcardKeys::PrefixedOnly,
            HistoryMode::Replace,
            AddressingMode::Query.strategy(),
        );
        assert_eq!(
            p.project(&bar, &FlatState::new()),
            FlatState::new().with("x", "hello")
        );
    }

    #[test]
    fn serialize_sets_prefixed_and_deletes_absent() {
        let bar = Bar::at("/?keep=1&b=old&p_b=old");
        let p = projector("p_", &["a", "b"], AddressingMode::Query);
        p.serialize(&bar, &FlatState::new().with("a", "x").with_absent("b"));
        assert_eq!(bar.href(), "/?keep=1&p_a=x");
    }

    #[test]
    fn serialize_treats_empty_string_as_absent() {
        let bar = Bar::at("/?p_a=1&keep=2");
        let p = projector("p_", &["a"], AddressingMode::Query);
        p.serialize(&bar, &FlatState::new().with("a", ""));
        assert_eq!(bar.href(), "/?keep=2");
    }

    #[test]
    fn serialize_leaves_fields_missing_from_state() {
        let bar = Bar::at("/?p_a=1&p_b=2");
        let p = projector("p_", &["a", "b"], AddressingMode::Query);
        p.serialize(&bar, &FlatState::new().with("a", 7));
        assert_eq!(bar.href(), "/?p_a=7&p_b=2");
    }

    #[test]
    fn serialize_ignores_state_keys_outside_allow_list() {
        let bar = Bar::at("/");
        let p = projector("", &["a"], AddressingMode::Query);
        p.serialize(&bar, &FlatState::new().with("a", 1).with("rogue", 2));
        assert_eq!(bar.href(), "/?a=1");
    }

    #[test]
    fn serialize_in_fragment_mode() {
        let bar = Bar::at("/app#/base?keep=1");
        let p = projector("p_", &["a", "b"], AddressingMode::Fragment);
        p.serialize(&bar, &FlatState::new().with("a", "x").with_absent("b"));
        assert_eq!(bar.href(), "/app#/base?keep=1&p_a=x");
    }

    #[test]
    fn wildcard_serialize_manages_every_state_key() {
        let bar = Bar::at("/?w_gone=1&keep=yes");
        let p = projector("w_", &[], AddressingMode::Query);
        p.serialize(
            &bar,
            &FlatState::new().with("n", 1.5).with_absent("gone"),
        );
        assert_eq!(bar.href(), "/?keep=yes&w_n=1.5");
        assert_eq!(
            p.project(&bar, &FlatState::new()),
            FlatState::new().with("keep", "yes").with("n", 1.5)
        );
    }

    #[test]
    fn wildcard_with_empty_prefix_reads_every_key() {
        let bar = Bar::at("/?a=1&b=two&c=true");
        let p = projector("", &[], AddressingMode::Query);
        assert_eq!(
            p.project(&bar, &FlatState::new()),
            FlatState::new().with("a", 1).with("b", "two").with("c", true)
        );
    }

    #[test]
    fn wildcard_with_empty_prefix_round_trips() {
        let bar = Bar::at("/#/r?");
        let p = projector("", &[], AddressingMode::Fragment);
        let state = FlatState::new().with("q", "a b&c").with("n", -3).with("on", false);
        p.serialize(&bar, &state);
        assert_eq!(p.project(&bar, &FlatState::new()), state);
    }

    #[test]
    fn serialize_encodes_reserved_characters() {
        let bar = Bar::at("/");
        let p = projector("", &["q"], AddressingMode::Query);
        p.serialize(&bar, &FlatState::new().with("q", "a b&c"));
        assert_eq!(bar.href(), "/?q=a+b%26c");
        assert_eq!(
            p.project(&bar, &FlatState::new()).get("q"),
            Some(&Value::from("a b&c"))
        );
    }
}
