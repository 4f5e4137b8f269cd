// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declaration trees.
//!
//! A declaration is a tree of [`Decl`] nodes. At the top level, each entry of a
//! [`DeclMap`] declares one property: a plain value is a default, a map is a
//! *state map* whose keys are state keys or lifecycle hooks (`init`, `get`,
//! `set`, `changed`).
//!
//! This module also holds key flattening (`"1,2"` → `"1"` and `"2"`) and
//! the validation run by [`apply_state`](crate::apply_state).

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use smallvec::SmallVec;

use crate::config::StateConfig;
use crate::error::StateError;
use crate::handler::Handler;
use crate::value::Value;

/// Reserved keys of a state map that configure the property itself.
pub(crate) const LIFECYCLE_KEYS: [&str; 4] = ["init", "get", "set", "changed"];

/// Returns `true` if `key` names a lifecycle hook rather than a state.
#[must_use]
pub(crate) fn is_lifecycle_key(key: &str) -> bool {
    LIFECYCLE_KEYS.contains(&key)
}

/// Most descriptors have only a handful of entries.
const INLINE_CAPACITY: usize = 4;

/// One node of a declaration tree.
#[derive(Clone, Debug)]
pub enum Decl {
    /// A plain value. As a state descriptor, a handler is shorthand for
    /// `{enter: handler}` and any other value is a redirect.
    Value(Value),
    /// A nested map: a state map, a state descriptor, or an override set.
    Map(Rc<DeclMap>),
}

impl Decl {
    /// Returns the map, if this is a [`Decl::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&Rc<DeclMap>> {
        match self {
            Self::Map(m) => Some(m),
            Self::Value(_) => None,
        }
    }

    /// Returns the value, if this is a [`Decl::Value`].
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Map(_) => None,
        }
    }

    /// Identity comparison: maps by allocation, values by strict equality.
    #[must_use]
    pub(crate) fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b),
            (Self::Value(a), Self::Value(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! decl_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Decl {
                fn from(v: $ty) -> Self {
                    Self::Value(Value::from(v))
                }
            }
        )*
    };
}

decl_from_value!((), bool, f64, i32, u32, &str, String, Handler);

impl From<Value> for Decl {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<DeclMap> for Decl {
    fn from(m: DeclMap) -> Self {
        Self::Map(Rc::new(m))
    }
}

impl From<Rc<DeclMap>> for Decl {
    fn from(m: Rc<DeclMap>) -> Self {
        Self::Map(m)
    }
}

/// An insertion-ordered map of declaration entries.
///
/// Like the sparse stores elsewhere in Understory, this is a small vector map:
/// descriptors rarely have more than a few entries, so a linear scan over
/// inline storage beats hashing.
///
/// # Example
///
/// ```rust
/// use understory_stateful::{DeclMap, Handler, Value};
///
/// let decls = DeclMap::new()
///     .with("mode", DeclMap::new()
///         .with("init", "idle")
///         .with("idle", DeclMap::new().with("label", "Idle"))
///         .with("busy,blocked", DeclMap::new().with("label", "Working")))
///     .with("label", "");
///
/// assert_eq!(decls.len(), 2);
/// assert!(decls.get("mode").and_then(|d| d.as_map()).is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct DeclMap {
    entries: SmallVec<[(String, Decl); INLINE_CAPACITY]>,
}

impl DeclMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any entry with the same key in place.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, decl: impl Into<Decl>) -> Self {
        self.insert(key, decl);
        self
    }

    /// Adds an entry, replacing any entry with the same key in place.
    ///
    /// Returns the replaced entry, if any.
    pub fn insert(&mut self, key: impl Into<String>, decl: impl Into<Decl>) -> Option<Decl> {
        let key = key.into();
        let decl = decl.into();
        match self.position(&key) {
            Some(idx) => Some(core::mem::replace(&mut self.entries[idx].1, decl)),
            None => {
                self.entries.push((key, decl));
                None
            }
        }
    }

    /// Looks up an entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Decl> {
        self.position(key).map(|idx| &self.entries[idx].1)
    }

    /// Returns `true` if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Decl)> + '_ {
        self.entries.iter().map(|(k, d)| (k.as_str(), d))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

/// Expands composite keys such as `"1,2"` at every level of the tree.
///
/// Expanded keys share one descriptor allocation. A key that is already
/// present is merged with the new descriptor when both are maps (later entries
/// win), and replaced otherwise. Subtrees without composite keys are returned
/// as-is, so the result of a tree with no separators is the input itself.
pub(crate) fn normalize(
    map: &Rc<DeclMap>,
    separator: char,
    path: &str,
) -> Result<Rc<DeclMap>, StateError> {
    let mut out = DeclMap::new();
    let mut changed = false;

    for (key, decl) in map.iter() {
        let child = match decl {
            Decl::Map(inner) => {
                let normalized = normalize(inner, separator, &join(path, key))?;
                changed |= !Rc::ptr_eq(&normalized, inner);
                Decl::Map(normalized)
            }
            Decl::Value(_) => decl.clone(),
        };

        if key.contains(separator) {
            changed = true;
            for part in key.split(separator).map(str::trim) {
                if part.is_empty() {
                    return Err(StateError::invalid(join(path, key), "empty key in list"));
                }
                merge_entry(&mut out, part, child.clone());
            }
        } else {
            if key.trim().is_empty() {
                return Err(StateError::invalid(join(path, key), "empty key"));
            }
            changed |= out.contains_key(key);
            merge_entry(&mut out, key, child);
        }
    }

    Ok(if changed { Rc::new(out) } else { map.clone() })
}

fn merge_entry(out: &mut DeclMap, key: &str, decl: Decl) {
    let merged = match (out.get(key), &decl) {
        (Some(Decl::Map(existing)), Decl::Map(incoming)) => {
            let mut merged = DeclMap::clone(existing);
            for (k, d) in incoming.iter() {
                merged.insert(k, d.clone());
            }
            Decl::from(merged)
        }
        _ => decl,
    };
    out.insert(key, merged);
}

/// Checks hook slots of a normalized property declaration tree.
pub(crate) fn validate(decls: &DeclMap, config: &StateConfig) -> Result<(), StateError> {
    for (name, decl) in decls.iter() {
        let Decl::Map(states) = decl else {
            continue;
        };
        for (key, descriptor) in states.iter() {
            let Decl::Map(descriptor) = descriptor else {
                continue;
            };
            let path = format!("{name}.{key}");
            let slots: &[&str] = if is_lifecycle_key(key) {
                &[config.enter_hook()]
            } else {
                &[config.enter_hook(), config.leave_hook()]
            };
            for slot in slots {
                if matches!(descriptor.get(slot), Some(Decl::Map(_))) {
                    return Err(StateError::invalid(
                        join(&path, slot),
                        "hook slot must be a value or handler, not a map",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.into()
    } else {
        format!("{path}.{key}")
    }
}
