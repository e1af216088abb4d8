//! Translation maps and key resolution.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// A value in a translation map: a translated string or a nested map.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum TrValue {
    Leaf(String),
    Node(TranslationMap),
}

/// A key→value mapping of arbitrary depth, as found in a language file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct TranslationMap(BTreeMap<String, TrValue>);

impl TranslationMap {
    pub fn get(&self, key: &str) -> Option<&TrValue> {
        self.0.get(key)
    }

    /// Resolves a dotted key.
    ///
    /// Segments are followed through nested maps. When a segment is missing,
    /// or holds a string where a map was expected, the rest of the path is
    /// looked up as one flat key at that level instead. A path ending on a
    /// map resolves to nothing.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        let segments: Vec<&str> = key.split('.').collect();
        let mut node = self;

        for (i, segment) in segments.iter().enumerate() {
            match node.get(segment) {
                Some(TrValue::Node(child)) => node = child,
                _ => return node.lookup_flat(&segments[i..].join(".")),
            }
        }
        None
    }

    /// Looks `key` up verbatim at this level, dots included.
    pub fn lookup_flat(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(TrValue::Leaf(text)) => Some(text),
            _ => None,
        }
    }
}

impl<K: Into<String>> FromIterator<(K, TrValue)> for TranslationMap {
    fn from_iter<I: IntoIterator<Item = (K, TrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The text shown for a key that cannot be resolved.
pub fn placeholder(key: &str) -> String {
    format!("{{{{{}}}}}", key)
}

/// Replaces positional placeholders `{0}`, `{1}`, ... with `values`.
///
/// Braces that do not enclose a valid index into `values` are copied as is.
pub fn interpolate(template: &str, values: &[&dyn fmt::Display]) -> String {
    if values.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let index = &after[..close];
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let value = values.get(index.parse::<usize>().ok()?)?;
            Some((close, value))
        });

        match value {
            Some((close, value)) => {
                let _ = write!(out, "{}", value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
