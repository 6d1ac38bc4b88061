#![forbid(unsafe_code)]

//! Ordered query-string representation with `URLSearchParams` semantics.
//!
//! Keys and values are held decoded. Parsing accepts
//! `application/x-www-form-urlencoded` text (`+` is a space, `%XX` escapes are
//! decoded with lossy UTF-8); serialization re-encodes with the same scheme.
//!
//! Mutation keeps unrelated pairs where they were: [`QueryParams::set`]
//! rewrites the first occurrence in place and [`QueryParams::delete`] only
//! removes matching keys, so foreign keys survive a read-modify-write cycle
//! in their original order.
//!
//! A parsed pair that no operation touched is written back exactly as it was
//! read (`flag`, `path=/a/b`, `s=a%20b` stay as typed). Only pairs created or
//! rewritten by `set` are re-encoded. Empty `&&` segments are not kept.

use std::fmt;

#[derive(Debug, Clone)]
struct Pair {
    key: String,
    value: String,
    /// Source text of an untouched parsed pair.
    raw: Option<String>,
}

impl Pair {
    fn new(key: String, value: String) -> Self {
        Self {
            key,
            value,
            raw: None,
        }
    }
}

/// Pairs compare by decoded content; the source spelling is not significant.
impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl Eq for Pair {}

/// Parsed URL query: `count=3&name=alice`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<Pair>);

impl QueryParams {
    /// Parse a query string (without the leading `?`).
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self(
            query
                .split('&')
                .filter(|s| !s.is_empty())
                .map(|segment| {
                    let (key, value) = match segment.split_once('=') {
                        Some((k, v)) => (decode_component(k), decode_component(v)),
                        None => (decode_component(segment), String::new()),
                    };
                    Pair {
                        key,
                        value,
                        raw: Some(segment.to_owned()),
                    }
                })
                .collect(),
        )
    }

    /// Empty params.
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Whether any pair has `key`, including pairs with an empty value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|p| p.key == key)
    }

    /// Set `key` to `value`: the first occurrence is rewritten in place and
    /// later duplicates are dropped. Appends when the key is new.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter().position(|p| p.key == key) {
            Some(first) => {
                self.0[first] = Pair::new(key.to_owned(), value);
                let mut index = 0;
                self.0.retain(|p| {
                    let keep = index <= first || p.key != key;
                    index += 1;
                    keep
                });
            }
            None => self.0.push(Pair::new(key.to_owned(), value)),
        }
    }

    /// Remove every pair with `key`.
    pub fn delete(&mut self, key: &str) {
        self.0.retain(|p| p.key != key);
    }

    /// Iterate decoded pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|p| (p.key.as_str(), p.value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize without a leading `?`. Untouched parsed pairs keep their
    /// source text; everything else is form-urlencoded.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        for (i, pair) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            match &pair.raw {
                Some(raw) => out.push_str(raw),
                None => {
                    encode_component_into(&pair.key, &mut out);
                    out.push('=');
                    encode_component_into(&pair.value, &mut out);
                }
            }
        }
        out
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| Pair::new(k.into(), v.into()))
                .collect(),
        )
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex_value);
                let lo = bytes.get(i + 2).copied().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                        continue;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn encode_component_into(text: &str, out: &mut String) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    for &b in text.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'*' | b'-' | b'.' | b'_' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(HEX[(b >> 4) as usize] as char);
                out.push(HEX[(b & 0x0f) as usize] as char);
            }
        }
    }
}
