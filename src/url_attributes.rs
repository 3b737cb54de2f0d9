//! Ordered attribute bag feeding URL templates.
//!
//! Every job carries a set of URL attributes: free-form key/value pairs that
//! URL templates substitute into `:placeholder` segments. Keys keep their
//! insertion order, and a key explicitly set to nothing stays in the bag as
//! an empty marker rather than disappearing.
//!
//! ## Name derivation
//!
//! `name`, `basename`, and `ext` are mutually consistent. Whichever was set
//! explicitly wins; the others derive from it by splitting on the last dot:
//!
//! | Set | `name()` | `basename()` | `ext()` |
//! |-----|----------|--------------|---------|
//! | `name = "hello.egg"` | `hello.egg` | `hello` | `egg` |
//! | `name = "hello.egg"`, then `ext = "gif"` | `hello.gif` | `hello` | `gif` |
//! | `basename = "doc"` | `doc` | `doc` | — |
//! | `ext = "txt"` | — | — | `txt` |
//!
//! A leading dot is not a split point (`.profile` has no extension), and
//! re-setting `name` discards any explicit `basename`/`ext` so derivation
//! restarts from the new value.

use indexmap::IndexMap;

/// Split a filename into (stem, extension) on the last dot.
///
/// A dot at position zero or a trailing dot does not split:
/// `.profile` → (`.profile`, None), `hello.` → (`hello.`, None).
pub(crate) fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}

/// True for values that carry no information: empty or whitespace-only.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Insertion-ordered key/value bag with filename-aware accessors.
///
/// Only explicitly-set keys are stored. [`unset`](Self::unset) keeps the key
/// but marks it valueless, which [`extract`](Self::extract) and URL building
/// both treat as blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlAttributes {
    attrs: IndexMap<String, Option<String>>,
}

impl UrlAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key to a value. Setting `name` routes through
    /// [`set_name`](Self::set_name) so the derivation rules hold no matter
    /// which entry point was used.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if key == "name" {
            self.set_name(value);
        } else {
            self.attrs.insert(key, Some(value.into()));
        }
    }

    /// Mark a key as explicitly valueless. The key stays in the bag.
    pub fn unset(&mut self, key: impl Into<String>) {
        self.attrs.insert(key.into(), None);
    }

    /// Set the full name. Discards any explicit `basename`/`ext` so both
    /// derive from the new name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.attrs.shift_remove("basename");
        self.attrs.shift_remove("ext");
        self.attrs.insert("name".to_string(), Some(name.into()));
    }

    pub fn set_basename(&mut self, basename: impl Into<String>) {
        self.attrs
            .insert("basename".to_string(), Some(basename.into()));
    }

    pub fn set_ext(&mut self, ext: impl Into<String>) {
        self.attrs.insert("ext".to_string(), Some(ext.into()));
    }

    /// Raw stored value for a key, ignoring derivation. `None` both for
    /// missing keys and keys explicitly unset.
    fn stored(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_deref())
    }

    /// Effective name. When `basename` or `ext` was set explicitly the name
    /// recomposes from the two parts; a part-only bag without a basename has
    /// no name at all.
    pub fn name(&self) -> Option<String> {
        if self.stored("basename").is_some() || self.stored("ext").is_some() {
            let basename = self.basename()?;
            match self.ext() {
                Some(ext) => Some(format!("{basename}.{ext}")),
                None => Some(basename),
            }
        } else {
            self.stored("name").map(str::to_string)
        }
    }

    /// Effective basename: the explicit one, else the stem of `name`.
    pub fn basename(&self) -> Option<String> {
        if let Some(basename) = self.stored("basename") {
            return Some(basename.to_string());
        }
        self.stored("name")
            .map(|name| split_name(name).0.to_string())
    }

    /// Effective extension: the explicit one, else the suffix of `name`.
    pub fn ext(&self) -> Option<String> {
        if let Some(ext) = self.stored("ext") {
            return Some(ext.to_string());
        }
        self.stored("name")
            .and_then(|name| split_name(name).1.map(str::to_string))
    }

    /// Resolve a key. The three filename keys go through their derivation
    /// accessors; everything else returns the stored value as-is.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "name" => self.name(),
            "basename" => self.basename(),
            "ext" => self.ext(),
            _ => self.stored(key).map(str::to_string),
        }
    }

    /// True when no attribute holds a value. Keys that were explicitly unset
    /// do not count as values.
    pub fn is_empty(&self) -> bool {
        self.attrs.values().all(|v| v.is_none())
    }

    /// Stored keys in insertion order, including unset ones.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    /// Resolve the requested keys in the given order, dropping any that are
    /// missing or blank (empty/whitespace values carry no information).
    pub fn extract(&self, keys: &[&str]) -> Vec<(String, String)> {
        keys.iter()
            .filter_map(|key| {
                let value = self.get(key)?;
                if is_blank(&value) {
                    None
                } else {
                    Some((key.to_string(), value))
                }
            })
            .collect()
    }
}
