// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live state tables.
//!
//! A [`LiveTable`] is what the transition engine consults for one property:
//! the declared state map as a fixed fallback, plus overrides installed by
//! the active states of other properties. Installing an override inserts an
//! entry; leaving the state deletes it again.

use alloc::rc::Rc;
use alloc::string::String;
use smallvec::SmallVec;

use crate::config::StateConfig;
use crate::decl::{Decl, DeclMap, is_lifecycle_key};
use crate::value::Value;

/// A resolved state: the key it matched under and its descriptor.
#[derive(Clone, Debug)]
pub(crate) struct ActiveState {
    pub(crate) key: String,
    pub(crate) descriptor: Decl,
}

/// The current view of one property's state map.
#[derive(Clone, Debug, Default)]
pub(crate) struct LiveTable {
    declared: Option<Rc<DeclMap>>,
    overrides: SmallVec<[(String, Decl); 2]>,
}

impl LiveTable {
    /// Creates a table over a declared state map (`None` for plain
    /// properties).
    pub(crate) fn new(declared: Option<Rc<DeclMap>>) -> Self {
        Self {
            declared,
            overrides: SmallVec::new(),
        }
    }

    /// Looks up `key`, preferring overrides over the declaration.
    pub(crate) fn lookup(&self, key: &str) -> Option<&Decl> {
        self.overrides
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, d)| d)
            .or_else(|| self.declared.as_ref().and_then(|m| m.get(key)))
    }

    /// Resolves the state for `value`: an exact key, else the wildcard.
    pub(crate) fn resolve(&self, value: &Value, config: &StateConfig) -> Option<ActiveState> {
        if let Some(key) = value.state_key()
            && !is_lifecycle_key(&key)
            && let Some(descriptor) = self.lookup(&key)
        {
            return Some(ActiveState {
                key: key.into_owned(),
                descriptor: descriptor.clone(),
            });
        }
        let wildcard = config.wildcard();
        self.lookup(wildcard).map(|descriptor| ActiveState {
            key: wildcard.into(),
            descriptor: descriptor.clone(),
        })
    }

    /// Replaces the declared state map, keeping installed overrides.
    pub(crate) fn redeclare(&mut self, declared: Option<Rc<DeclMap>>) {
        self.declared = declared;
    }

    /// Installs an override for `key`.
    ///
    /// Installing the identical override twice is a no-op; returns `false`
    /// in that case.
    pub(crate) fn insert_override(&mut self, key: &str, decl: Decl) -> bool {
        if self.overrides.iter().any(|(k, d)| k == key && d.same(&decl)) {
            return false;
        }
        self.overrides.push((key.into(), decl));
        true
    }

    /// Removes the override for `key` that is identical to `decl`.
    ///
    /// Overrides installed by other states are left in place. Returns `true`
    /// if an entry was removed.
    pub(crate) fn remove_override(&mut self, key: &str, decl: &Decl) -> bool {
        match self
            .overrides
            .iter()
            .rposition(|(k, d)| k == key && d.same(decl))
        {
            Some(idx) => {
                self.overrides.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if no override is installed.
    #[cfg(test)]
    pub(crate) fn is_pristine(&self) -> bool {
        self.overrides.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;

    fn table() -> LiveTable {
        LiveTable::new(Some(Rc::new(
            DeclMap::new()
                .with("init", 1)
                .with("1", DeclMap::new().with("x", 1))
                .with("_", 9),
        )))
    }

    #[test]
    fn exact_key_wins_over_wildcard() {
        let config = StateConfig::default();
        let state = table().resolve(&Value::from(1), &config).unwrap();
        assert_eq!(state.key, "1");
        let state = table().resolve(&Value::from("1"), &config).unwrap();
        assert_eq!(state.key, "1");
        let state = table().resolve(&Value::from(2), &config).unwrap();
        assert_eq!(state.key, "_");
        assert_eq!(state.descriptor.as_value(), Some(&Value::from(9)));
    }

    #[test]
    fn lifecycle_keys_and_undefined_fall_to_wildcard() {
        let config = StateConfig::default();
        assert_eq!(table().resolve(&Value::from("init"), &config).unwrap().key, "_");
        assert_eq!(table().resolve(&Value::Undefined, &config).unwrap().key, "_");
    }

    #[test]
    fn no_state_without_wildcard() {
        let config = StateConfig::default();
        let table = LiveTable::new(Some(Rc::new(DeclMap::new().with("1", 2))));
        assert!(table.resolve(&Value::from(3), &config).is_none());
        assert!(LiveTable::new(None).resolve(&Value::from(3), &config).is_none());
    }

    #[test]
    fn override_insert_then_revert() {
        let mut table = table();
        let getter = Decl::from(Handler::hook(|_, _, _| Ok(Value::from(5))));
        assert!(table.insert_override("get", getter.clone()));
        assert!(!table.insert_override("get", getter.clone()));
        assert!(table.lookup("get").is_some_and(|d| d.same(&getter)));
        assert!(table.remove_override("get", &getter));
        assert!(table.lookup("get").is_none());
        assert!(table.is_pristine());
    }

    #[test]
    fn revert_leaves_foreign_overrides() {
        let mut table = table();
        let first = Decl::from(Handler::hook(|_, _, _| Ok(Value::from(1))));
        let second = Decl::from(Handler::hook(|_, _, _| Ok(Value::from(2))));
        table.insert_override("get", first.clone());
        table.insert_override("get", second.clone());
        assert!(table.lookup("get").is_some_and(|d| d.same(&second)));

        assert!(table.remove_override("get", &first));
        assert!(table.lookup("get").is_some_and(|d| d.same(&second)));
        assert!(!table.remove_override("get", &first));
    }

    #[test]
    fn overrides_shadow_declared_states() {
        let config = StateConfig::default();
        let mut table = table();
        table.insert_override("1", Decl::from(4));
        let state = table.resolve(&Value::from(1), &config).unwrap();
        assert_eq!(state.descriptor.as_value(), Some(&Value::from(4)));
    }
}
