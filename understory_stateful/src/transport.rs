// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event transport seam.
//!
//! The engine binds handler-valued properties as event listeners and
//! unbinds them when the state that installed them is left. It does so through
//! [`EventTransport`], so embedders can route events through their own
//! system. [`Listeners`] is the in-memory default.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::handler::Handler;
use crate::target::TargetId;

/// Subscribe/unsubscribe primitives consumed by the engine.
///
/// Every call names the target explicitly, so one transport can serve many
/// targets.
pub trait EventTransport {
    /// Registers `handler` for events called `name` on `target`.
    fn bind(&mut self, target: TargetId, name: &str, handler: &Handler);

    /// Removes one registration of `handler` for `name` on `target`.
    fn unbind(&mut self, target: TargetId, name: &str, handler: &Handler);

    /// Returns the handlers to invoke for `name` on `target`, in binding order.
    fn listeners(&self, target: TargetId, name: &str) -> Vec<Handler>;

    /// Drops every registration of `target`.
    ///
    /// Called when the target itself is dropped.
    fn forget(&mut self, target: TargetId) {
        let _ = target;
    }
}

/// In-memory listener registry.
///
/// # Example
///
/// ```rust
/// use understory_stateful::{EventTransport, Handler, Listeners, Target};
///
/// let target = Target::new();
/// let mut listeners = Listeners::new();
/// let ping = Handler::action(|_| {});
///
/// listeners.bind(target.id(), "ping", &ping);
/// assert_eq!(listeners.listeners(target.id(), "ping").len(), 1);
///
/// listeners.unbind(target.id(), "ping", &ping);
/// assert!(listeners.listeners(target.id(), "ping").is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Listeners {
    by_target: HashMap<TargetId, HashMap<String, SmallVec<[Handler; 2]>>>,
}

impl Listeners {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registrations across all targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_target
            .values()
            .flat_map(|names| names.values())
            .map(|list| list.len())
            .sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventTransport for Listeners {
    fn bind(&mut self, target: TargetId, name: &str, handler: &Handler) {
        self.by_target
            .entry(target)
            .or_default()
            .entry(name.into())
            .or_default()
            .push(handler.clone());
    }

    fn unbind(&mut self, target: TargetId, name: &str, handler: &Handler) {
        let Some(names) = self.by_target.get_mut(&target) else {
            return;
        };
        if let Some(list) = names.get_mut(name) {
            if let Some(idx) = list.iter().position(|h| h.ptr_eq(handler)) {
                list.remove(idx);
            }
            if list.is_empty() {
                names.remove(name);
            }
        }
        if names.is_empty() {
            self.by_target.remove(&target);
        }
    }

    fn listeners(&self, target: TargetId, name: &str) -> Vec<Handler> {
        self.by_target
            .get(&target)
            .and_then(|names| names.get(name))
            .map(|list| list.to_vec())
            .unwrap_or_default()
    }

    fn forget(&mut self, target: TargetId) {
        self.by_target.remove(&target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    #[test]
    fn bind_keeps_order_and_duplicates() {
        let target = Target::new();
        let id = target.id();
        let mut listeners = Listeners::new();
        let a = Handler::action(|_| {});
        let b = Handler::action(|_| {});
        listeners.bind(id, "x", &a);
        listeners.bind(id, "x", &b);
        listeners.bind(id, "x", &a);

        let bound = listeners.listeners(id, "x");
        assert_eq!(bound.len(), 3);
        assert!(bound[0].ptr_eq(&a));
        assert!(bound[1].ptr_eq(&b));

        listeners.unbind(id, "x", &a);
        assert_eq!(listeners.listeners(id, "x").len(), 2);
    }

    #[test]
    fn targets_are_isolated() {
        let one = Target::new();
        let two = Target::new();
        let mut listeners = Listeners::new();
        let h = Handler::action(|_| {});
        listeners.bind(one.id(), "x", &h);
        assert!(listeners.listeners(two.id(), "x").is_empty());

        listeners.forget(one.id());
        assert!(listeners.is_empty());
    }

    #[test]
    fn unbind_unknown_is_noop() {
        let target = Target::new();
        let mut listeners = Listeners::new();
        listeners.unbind(target.id(), "x", &Handler::action(|_| {}));
        assert!(listeners.is_empty());
    }
}
