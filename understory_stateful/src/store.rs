// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-target side tables.
//!
//! [`TargetStore`] holds everything the engine tracks for one target: the
//! value store and its defaults, the live state table of every property, the
//! dependency graph, reentrancy locks, bound listeners, and the host slots of
//! names the engine does not manage.
//!
//! The store is owned by its [`Target`](crate::Target), so all of it is
//! released together with the last handle to that target.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};

use crate::config::StateConfig;
use crate::decl::Decl;
use crate::deps::DependencyGraph;
use crate::handler::Handler;
use crate::table::{ActiveState, LiveTable};
use crate::value::Value;

/// A reentrancy lock key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    /// Leaving the state matched under `state`.
    Leave { property: String, state: String },
    /// Entering the state matched under `state`.
    Enter { property: String, state: String },
}

impl LockKey {
    pub(crate) fn leave(property: &str, state: &str) -> Self {
        Self::Leave {
            property: property.into(),
            state: state.into(),
        }
    }

    pub(crate) fn enter(property: &str, state: &str) -> Self {
        Self::Enter {
            property: property.into(),
            state: state.into(),
        }
    }
}

/// Engine state of one target.
#[derive(Debug, Default)]
pub(crate) struct TargetStore {
    /// Committed values of declared properties.
    values: HashMap<String, Value>,
    /// Fallback values: host values or plain declarations.
    defaults: HashMap<String, Value>,
    tables: HashMap<String, LiveTable>,
    deps: DependencyGraph,
    locks: HashSet<LockKey>,
    /// `(event name, handler address)` pairs bound through the transport.
    bound: HashSet<(String, usize)>,
    /// Properties whose first write has happened.
    entered: HashSet<String>,
    passthrough: HashSet<String>,
    /// Values of names the engine does not manage, and of passthrough names.
    host: HashMap<String, Value>,
    /// Current nesting of transitions.
    pub(crate) depth: usize,
}

impl TargetStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Declaration
    // =========================================================================

    /// Installs or refreshes property `name`.
    ///
    /// `decl` is the top-level declaration, or `None` for names that only
    /// appear nested inside other properties' states.
    pub(crate) fn declare(&mut self, name: &str, decl: Option<&Decl>, passthrough: bool) {
        let declared_states = decl.and_then(Decl::as_map).cloned();
        let known = match self.tables.get_mut(name) {
            Some(table) => {
                if decl.is_some() {
                    table.redeclare(declared_states);
                }
                true
            }
            None => {
                self.tables
                    .insert(name.into(), LiveTable::new(declared_states));
                false
            }
        };
        if passthrough {
            self.passthrough.insert(name.into());
        }

        if known {
            // A second declaration keeps what the property holds now.
            if decl.is_some() {
                let current = self.value(name);
                self.defaults.insert(name.into(), current);
            }
            return;
        }

        let plain = decl.and_then(Decl::as_value).cloned();
        let host = if passthrough {
            None
        } else {
            self.host.remove(name)
        };
        if let Some(default) = host.or(plain) {
            self.defaults.insert(name.into(), default);
        }
    }

    /// Folds a freshly built dependency graph into the target's graph.
    pub(crate) fn merge_deps(&mut self, graph: DependencyGraph) {
        self.deps.merge(graph);
    }

    /// Marks `name` resolved, returning its dependencies if it was pending.
    pub(crate) fn take_deps(&mut self, name: &str) -> Option<Vec<String>> {
        self.deps.take(name).map(|deps| deps.into_vec())
    }

    pub(crate) fn is_declared(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub(crate) fn is_initialized(&self, name: &str) -> bool {
        self.deps.is_resolved(name)
    }

    pub(crate) fn is_passthrough(&self, name: &str) -> bool {
        self.passthrough.contains(name)
    }

    /// Names of all declared properties, in declaration order.
    pub(crate) fn declared_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.deps.names()
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// The committed value, else the default, else `Undefined`.
    pub(crate) fn value(&self, name: &str) -> Value {
        self.values
            .get(name)
            .or_else(|| self.defaults.get(name))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn set_value(&mut self, name: &str, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub(crate) fn default_value(&self, name: &str) -> Option<Value> {
        self.defaults.get(name).cloned()
    }

    /// Records the first write of `name`; returns `true` if this is it.
    pub(crate) fn mark_entered(&mut self, name: &str) -> bool {
        self.entered.insert(name.into())
    }

    pub(crate) fn host_value(&self, name: &str) -> Value {
        self.host.get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn set_host_value(&mut self, name: &str, value: Value) {
        self.host.insert(name.into(), value);
    }

    // =========================================================================
    // Live state tables
    // =========================================================================

    /// Looks up `key` in the live table of `name`.
    pub(crate) fn lookup(&self, name: &str, key: &str) -> Option<Decl> {
        self.tables.get(name).and_then(|t| t.lookup(key)).cloned()
    }

    /// Resolves the active state of `name` for `value`.
    pub(crate) fn resolve(
        &self,
        name: &str,
        value: &Value,
        config: &StateConfig,
    ) -> Option<ActiveState> {
        self.tables.get(name).and_then(|t| t.resolve(value, config))
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> &mut LiveTable {
        self.tables.entry(name.into()).or_default()
    }

    // =========================================================================
    // Locks and listeners
    // =========================================================================

    /// Takes `key`; returns `false` if it is already held.
    pub(crate) fn try_lock(&mut self, key: LockKey) -> bool {
        self.locks.insert(key)
    }

    pub(crate) fn unlock(&mut self, key: &LockKey) {
        self.locks.remove(key);
    }

    /// Records a binding; returns `false` if it already exists.
    pub(crate) fn note_bound(&mut self, name: &str, handler: &Handler) -> bool {
        self.bound.insert((name.into(), handler.addr()))
    }

    /// Forgets a binding; returns `false` if it did not exist.
    pub(crate) fn note_unbound(&mut self, name: &str, handler: &Handler) -> bool {
        self.bound.remove(&(String::from(name), handler.addr()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::DeclMap;
    use alloc::rc::Rc;

    #[test]
    fn host_value_wins_over_plain_declaration() {
        let mut store = TargetStore::new();
        store.set_host_value("x", Value::from(1));
        store.declare("x", Some(&Decl::from(2)), false);
        assert_eq!(store.value("x"), Value::from(1));
        assert_eq!(store.host_value("x"), Value::Undefined);
    }

    #[test]
    fn passthrough_keeps_host_slot() {
        let mut store = TargetStore::new();
        store.set_host_value("click", Value::from("native"));
        store.declare("click", Some(&Decl::from("state")), true);
        assert_eq!(store.value("click"), Value::from("state"));
        assert_eq!(store.host_value("click"), Value::from("native"));
        assert!(store.is_passthrough("click"));
    }

    #[test]
    fn redeclaring_keeps_current_value() {
        let mut store = TargetStore::new();
        store.declare("x", Some(&Decl::from("def")), false);
        store.set_value("x", Value::from("abc"));
        store.declare("x", Some(&Decl::from("other")), false);
        assert_eq!(store.default_value("x"), Some(Value::from("abc")));
    }

    #[test]
    fn nested_only_names_have_no_default() {
        let mut store = TargetStore::new();
        store.declare("a", None, false);
        assert!(store.is_declared("a"));
        assert_eq!(store.default_value("a"), None);
        assert_eq!(store.value("a"), Value::Undefined);
    }

    #[test]
    fn lookup_reads_declared_states() {
        let mut store = TargetStore::new();
        let states = Decl::from(Rc::new(DeclMap::new().with("init", 3)));
        store.declare("a", Some(&states), false);
        assert_eq!(
            store.lookup("a", "init").and_then(|d| d.as_value().cloned()),
            Some(Value::from(3))
        );
    }

    #[test]
    fn first_write_is_marked_once() {
        let mut store = TargetStore::new();
        assert!(store.mark_entered("a"));
        assert!(!store.mark_entered("a"));
    }

    #[test]
    fn locks_are_exclusive() {
        let mut store = TargetStore::new();
        let key = LockKey::leave("a", "1");
        assert!(store.try_lock(key.clone()));
        assert!(!store.try_lock(key.clone()));
        store.unlock(&key);
        assert!(store.try_lock(key));
        assert!(store.try_lock(LockKey::enter("a", "1")));
    }
}
