//! Case-insensitive header storage.
//!
//! Headers are canonicalized to lowercase at the edges only: the
//! [`Parser`](crate::parser::Parser) lowercases names on ingress, the
//! [`writer`](crate::writer) module serializes names exactly as the caller
//! spelled them on egress. Nothing in between needs to know the rule.

use std::collections::HashMap;
use std::iter::FromIterator;

/// An ordered, case-insensitive multimap-as-singlemap of header values.
///
/// First occurrence wins: a header repeated in the wire stream without
/// being folded into a continuation line keeps only its first value, per
/// the distilled specification (header folding is tolerated, but
/// duplicate detection beyond that is not attempted).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    // Preserves insertion order for deterministic iteration/serialization,
    // while still keying lookups case-insensitively.
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers { entries: Vec::new() }
    }

    /// Inserts a header, keeping `name`'s case as given. If a header with
    /// the same name (case-insensitively) is already present the existing
    /// value is kept (first occurrence wins); use [`Headers::fold`] to
    /// append a continuation line instead. The parser always calls this
    /// with already-lowercased names (it canonicalizes on ingress); callers
    /// composing outgoing headers may spell names however they like and
    /// that spelling survives to the wire.
    pub fn insert_if_absent(&mut self, name: &str, value: String) {
        if !self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name)) {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Appends `extra` to the current value of `name` with a single space
    /// separator, as required for header-line folding. Inserts `name` with
    /// `extra` as the whole value if it is not present yet.
    pub fn fold(&mut self, name: &str, extra: &str) {
        if let Some((_, value)) = self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            value.push(' ');
            value.push_str(extra);
        } else {
            self.entries.push((name.to_string(), extra.to_string()));
        }
    }

    /// Unconditionally sets a header, replacing any previous value (and
    /// adopting `name`'s case). Used by the [`writer`](crate::writer)
    /// module when composing outgoing messages, where callers overwrite
    /// rather than fold.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            *entry = (name.to_string(), value.into());
        } else {
            self.entries.push((name.to_string(), value.into()));
        }
    }

    /// Case-insensitive lookup; returns the empty string for missing keys,
    /// matching the source's `__getitem__` behavior (no `Option`, no panic).
    pub fn get(&self, name: &str) -> &str {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.set(&name, value);
        }
        headers
    }
}
