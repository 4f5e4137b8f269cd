// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The transition engine.
//!
//! A write runs these phases in order, each of which may stop the current
//! frame:
//!
//! 1. lazy initialization and the `set` hook
//! 2. leave: the old state's leave hook, then its overrides are removed
//! 3. commit
//! 4. enter: the new state's overrides are installed, then its enter hook
//! 5. the `changed` hook
//!
//! Leave and enter hook results are classified as [`HookOutcome`]s. A
//! redirect re-runs the write with the returned value and ends the current
//! frame.
//!
//! No store borrow is held while user code runs: hooks may read and assign
//! any property of the target, including the one being written.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::decl::{Decl, DeclMap, normalize, validate};
use crate::deps::DependencyGraph;
use crate::error::StateError;
use crate::handler::{Handler, HookOutcome, call_hook, call_hook_or, call_state_hook};
use crate::store::LockKey;
use crate::target::Target;
use crate::value::Value;

/// Installs stateful properties on `target`.
///
/// The declarations are normalized and validated first; an invalid tree is
/// rejected before any property is touched. Every declared property is then
/// initialized in dependency order, so reads right after this call observe
/// settled initial states.
///
/// Names listed in `native` are passthrough properties: [`Target::get`] and
/// [`Target::set`] keep using their plain slot, while
/// [`Target::drive`] and [`Target::state_value`] reach the state machine.
///
/// Calling this again on the same target adds new properties and
/// re-initializes redeclared ones from their current value.
///
/// # Example
///
/// ```rust
/// use understory_stateful::{DeclMap, Handler, Target, Value, apply_state};
///
/// let target = Target::new();
/// apply_state(
///     &target,
///     &DeclMap::new().with(
///         "a",
///         DeclMap::new()
///             .with("init", 1)
///             .with("1", 2)
///             .with("2", Handler::hook(|_, _, _| Ok(Value::from(3))))
///             .with("3", DeclMap::new()),
///     ),
///     &[],
/// )?;
///
/// assert_eq!(target.get("a")?, Value::from(3));
/// # Ok::<(), understory_stateful::StateError>(())
/// ```
pub fn apply_state<'t>(
    target: &'t Target,
    decls: &DeclMap,
    native: &[&str],
) -> Result<&'t Target, StateError> {
    let config = target.config();
    let decls = normalize(&Rc::new(decls.clone()), config.separator(), "")?;
    validate(&decls, config)?;

    let graph = DependencyGraph::build(&decls, config);
    let names: Vec<String> = graph.names().map(String::from).collect();
    {
        let mut store = target.store_mut();
        for name in &names {
            store.declare(name, decls.get(name), native.contains(&name.as_str()));
        }
        store.merge_deps(graph);
    }

    for name in &names {
        target.init_prop(name)?;
    }
    Ok(target)
}

/// Bounds the transition nesting of a target.
struct DepthGuard<'a> {
    target: &'a Target,
}

impl<'a> DepthGuard<'a> {
    fn enter(target: &'a Target, name: &str, value: &Value) -> Result<Self, StateError> {
        let max = target.config().max_depth();
        let mut store = target.store_mut();
        if store.depth >= max {
            return Err(StateError::RedirectCycle {
                property: name.into(),
                value: value.clone(),
                depth: max,
            });
        }
        store.depth += 1;
        Ok(Self { target })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut store) = self.target.try_store_mut() {
            store.depth = store.depth.saturating_sub(1);
        }
    }
}

/// A held reentrancy lock, released on drop.
struct LockGuard<'a> {
    target: &'a Target,
    key: LockKey,
}

impl<'a> LockGuard<'a> {
    /// Takes `key`, or returns `None` if a frame further up holds it.
    fn acquire(target: &'a Target, key: LockKey) -> Option<Self> {
        let taken = target.store_mut().try_lock(key.clone());
        taken.then_some(Self { target, key })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut store) = self.target.try_store_mut() {
            store.unlock(&self.key);
        }
    }
}

/// The slot holding the leave hook of a state descriptor.
fn leave_slot(descriptor: &Decl, leave: &str) -> Option<Decl> {
    descriptor.as_map().and_then(|m| m.get(leave)).cloned()
}

impl Target {
    /// The write path.
    pub(crate) fn write(&self, name: &str, value: Value) -> Result<(), StateError> {
        let _depth = DepthGuard::enter(self, name, &value)?;
        self.init_prop(name)?;

        let config = self.config();
        let enter_key = config.enter_hook();

        let old = self.store().value(name);
        let set_hook = self.store().lookup(name, "set");
        let new = call_hook_or(self, set_hook.as_ref(), enter_key, &value, &old)
            .map_err(|e| e.in_property(name))?;

        let first = self.store_mut().mark_entered(name);
        if !first && new.is_same(&old) {
            return Ok(());
        }

        if !first {
            let old_state = self.store().resolve(name, &old, config);
            if let Some(state) = old_state {
                let lock = LockGuard::acquire(self, LockKey::leave(name, &state.key));
                if let Some(lock) = lock {
                    let slot = leave_slot(&state.descriptor, config.leave_hook());
                    let result = call_state_hook(self, slot.as_ref(), enter_key, &new, &old)
                        .map_err(|e| e.in_property(name))?;
                    match HookOutcome::classify(result, &new) {
                        HookOutcome::Proceed => {}
                        HookOutcome::Reject => {
                            self.trace(|t| t.reject(name, &new));
                            return Ok(());
                        }
                        HookOutcome::RedirectTo(to) => {
                            self.trace(|t| t.redirect(name, &new, &to));
                            drop(lock);
                            return self.write(name, to);
                        }
                    }
                    drop(lock);
                    self.trace(|t| t.leave(name, &state.key, &new));
                    self.unapply(&state.descriptor)?;
                    if !self.store().value(name).is_same(&old) {
                        // A hook assigned the property; that write settled it.
                        return Ok(());
                    }
                }
            }
        }

        self.store_mut().set_value(name, new.clone());

        let new_state = self.store().resolve(name, &new, config);
        if let Some(state) = new_state {
            let lock = LockGuard::acquire(self, LockKey::enter(name, &state.key));
            if let Some(lock) = lock {
                self.trace(|t| t.enter(name, &state.key, &new));
                self.apply(&state.descriptor)?;
                let result =
                    call_state_hook(self, Some(&state.descriptor), enter_key, &new, &old)
                    .map_err(|e| e.in_property(name))?;
                drop(lock);
                match HookOutcome::classify(result, &new) {
                    HookOutcome::Proceed => {
                        if !self.store().value(name).is_same(&new) {
                            return Ok(());
                        }
                    }
                    HookOutcome::Reject => {
                        self.trace(|t| t.reject(name, &new));
                        self.unapply(&state.descriptor)?;
                        if self.store().value(name).is_same(&new) {
                            self.store_mut().set_value(name, old.clone());
                        }
                        if !first {
                            let previous = self.store().resolve(name, &old, config);
                            if let Some(previous) = previous {
                                self.apply(&previous.descriptor)?;
                            }
                        }
                        return Ok(());
                    }
                    HookOutcome::RedirectTo(to) => {
                        self.trace(|t| t.redirect(name, &new, &to));
                        return self.write(name, to);
                    }
                }
            }
        }

        if !new.is_same(&old) {
            let changed = self.store().lookup(name, "changed");
            if let Some(slot) = changed {
                call_hook(self, Some(&slot), enter_key, &new, &old)
                    .map_err(|e| e.in_property(name))?;
            }
            self.trace(|t| t.changed(name, &new, &old));
        }
        Ok(())
    }

    /// The read path: initialize, then run the `get` hook.
    pub(crate) fn read(&self, name: &str) -> Result<Value, StateError> {
        self.init_prop(name)?;
        let stored = self.store().value(name);
        let get_hook = self.store().lookup(name, "get");
        call_hook_or(
            self,
            get_hook.as_ref(),
            self.config().enter_hook(),
            &stored,
            &Value::Undefined,
        )
        .map_err(|e| e.in_property(name))
    }

    /// Resolves `name` once, after its dependencies.
    pub(crate) fn init_prop(&self, name: &str) -> Result<(), StateError> {
        let deps = self.store_mut().take_deps(name);
        let Some(deps) = deps else {
            return Ok(());
        };
        for dep in &deps {
            self.init_prop(dep)?;
        }

        let stored = self.store().value(name);
        let init_hook = self.store().lookup(name, "init");
        let result = call_hook(
            self,
            init_hook.as_ref(),
            self.config().enter_hook(),
            &stored,
            &Value::Undefined,
        )
        .map_err(|e| e.in_property(name))?;
        let value = if result.is_undefined() {
            self.store().value(name)
        } else {
            result
        };

        self.trace(|t| t.init(name, &value));
        if let Value::Handler(handler) = &value {
            self.bind(name, handler);
        }
        self.write(name, value)
    }

    /// Installs the overrides of a state descriptor.
    ///
    /// Map entries extend the live table of the named property. Plain entries
    /// are written to the named property; handlers are also bound as
    /// listeners under that name.
    fn apply(&self, descriptor: &Decl) -> Result<(), StateError> {
        let Decl::Map(entries) = descriptor else {
            return Ok(());
        };
        let config = self.config();
        for (inner, entry) in entries.iter() {
            if config.is_hook_key(inner) {
                continue;
            }
            match entry {
                Decl::Map(overrides) => {
                    let mut store = self.store_mut();
                    let table = store.table_mut(inner);
                    for (key, decl) in overrides.iter() {
                        table.insert_override(key, decl.clone());
                    }
                }
                Decl::Value(value) => {
                    if let Value::Handler(handler) = value {
                        self.bind(inner, handler);
                    }
                    self.write(inner, value.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Removes what [`apply`](Self::apply) installed.
    ///
    /// Plain entries revert the named property to its default, if it has one.
    fn unapply(&self, descriptor: &Decl) -> Result<(), StateError> {
        let Decl::Map(entries) = descriptor else {
            return Ok(());
        };
        let config = self.config();
        for (inner, entry) in entries.iter() {
            if config.is_hook_key(inner) {
                continue;
            }
            match entry {
                Decl::Map(overrides) => {
                    let mut store = self.store_mut();
                    let table = store.table_mut(inner);
                    for (key, decl) in overrides.iter() {
                        table.remove_override(key, decl);
                    }
                }
                Decl::Value(value) => {
                    if let Value::Handler(handler) = value {
                        self.unbind(inner, handler);
                    }
                    let default = self.store().default_value(inner);
                    if let Some(default) = default {
                        self.write(inner, default)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn bind(&self, name: &str, handler: &Handler) {
        let fresh = self.store_mut().note_bound(name, handler);
        if fresh {
            self.transport_mut().bind(self.id(), name, handler);
            self.trace(|t| t.listener(name, true));
        }
    }

    fn unbind(&self, name: &str, handler: &Handler) {
        let known = self.store_mut().note_unbound(name, handler);
        if known {
            self.transport_mut().unbind(self.id(), name, handler);
            self.trace(|t| t.listener(name, false));
        }
    }
}
