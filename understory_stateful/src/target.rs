// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Targets: objects whose properties are driven by the state engine.
//!
//! A [`Target`] is a cheap, cloneable handle. It owns every side table the
//! engine keeps for the object, so nothing outlives the last handle except the
//! registrations its event transport is told to forget.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};
use core::fmt;

use crate::config::StateConfig;
use crate::error::StateError;
use crate::store::TargetStore;
use crate::trace::TransitionTrace;
use crate::transport::{EventTransport, Listeners};
use crate::value::Value;

/// Identity of a [`Target`].
///
/// Two handles have the same id exactly when they refer to the same target.
/// Ids of dropped targets may be reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

pub(crate) struct TargetInner {
    config: StateConfig,
    store: RefCell<TargetStore>,
    transport: Rc<RefCell<dyn EventTransport>>,
    trace: RefCell<Option<Box<dyn TransitionTrace>>>,
}

impl TargetInner {
    fn id(&self) -> TargetId {
        TargetId(core::ptr::from_ref(self).cast::<()>() as usize)
    }
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        let id = self.id();
        if let Ok(mut transport) = self.transport.try_borrow_mut() {
            transport.forget(id);
        }
    }
}

/// A handle to an object with stateful properties.
///
/// Properties are installed with [`apply_state`](crate::apply_state). After
/// that, [`get`](Self::get) and [`set`](Self::set) run the transition engine
/// for declared names and plain slot storage for everything else.
///
/// # Example
///
/// ```rust
/// use understory_stateful::{DeclMap, Target, Value, apply_state};
///
/// let target = Target::new();
/// target.set("title", "untitled")?;
///
/// apply_state(&target, &DeclMap::new().with("title", "fallback"), &[])?;
///
/// // The value the target already had wins over the declared default.
/// assert_eq!(target.get("title")?, Value::from("untitled"));
/// # Ok::<(), understory_stateful::StateError>(())
/// ```
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    /// Creates a target with the default configuration and its own
    /// [`Listeners`] registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    /// Creates a target with `config` and its own [`Listeners`] registry.
    #[must_use]
    pub fn with_config(config: StateConfig) -> Self {
        Self::with_transport(config, Rc::new(RefCell::new(Listeners::new())))
    }

    /// Creates a target that binds listeners through `transport`.
    ///
    /// One transport may be shared by several targets.
    #[must_use]
    pub fn with_transport<T>(config: StateConfig, transport: Rc<RefCell<T>>) -> Self
    where
        T: EventTransport + 'static,
    {
        Self {
            inner: Rc::new(TargetInner {
                config,
                store: RefCell::new(TargetStore::new()),
                transport,
                trace: RefCell::new(None),
            }),
        }
    }

    /// Returns the identity of this target.
    #[must_use]
    #[inline]
    pub fn id(&self) -> TargetId {
        self.inner.id()
    }

    /// Returns a handle that does not keep the target alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakTarget {
        WeakTarget {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns `true` if both handles refer to the same target.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the configuration of this target.
    #[must_use]
    #[inline]
    pub fn config(&self) -> &StateConfig {
        &self.inner.config
    }

    /// Returns the event transport of this target.
    #[must_use]
    pub fn transport(&self) -> Rc<RefCell<dyn EventTransport>> {
        self.inner.transport.clone()
    }

    /// Installs a trace sink, replacing any previous one.
    pub fn set_trace(&self, sink: impl TransitionTrace + 'static) {
        *self.inner.trace.borrow_mut() = Some(Box::new(sink));
    }

    /// Removes the trace sink.
    pub fn clear_trace(&self) {
        *self.inner.trace.borrow_mut() = None;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Reads `name`.
    ///
    /// Declared properties are initialized on first access and read through
    /// their `get` hook. Undeclared and passthrough names read their plain
    /// slot, which is [`Value::Undefined`] until written.
    pub fn get(&self, name: &str) -> Result<Value, StateError> {
        if self.is_managed(name) {
            self.read(name)
        } else {
            Ok(self.store().host_value(name))
        }
    }

    /// Assigns `value` to `name`.
    ///
    /// Declared properties run a full transition. Undeclared and passthrough
    /// names only store the value.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), StateError> {
        let value = value.into();
        if self.is_managed(name) {
            self.write(name, value)
        } else {
            self.store_mut().set_host_value(name, value);
            Ok(())
        }
    }

    /// Runs a transition of `name` even if it is a passthrough property.
    ///
    /// For undeclared names this behaves like [`set`](Self::set).
    pub fn drive(&self, name: &str, value: impl Into<Value>) -> Result<(), StateError> {
        let value = value.into();
        if self.is_declared(name) {
            self.write(name, value)
        } else {
            self.store_mut().set_host_value(name, value);
            Ok(())
        }
    }

    /// Reads the engine's value of `name` even if it is a passthrough
    /// property.
    pub fn state_value(&self, name: &str) -> Result<Value, StateError> {
        if self.is_declared(name) {
            self.read(name)
        } else {
            Ok(self.store().host_value(name))
        }
    }

    /// Invokes every listener bound under `name` with `args`.
    ///
    /// Listeners run in binding order with this target as receiver. The first
    /// error stops the dispatch.
    pub fn emit(&self, name: &str, args: &[Value]) -> Result<(), StateError> {
        let handlers = self.inner.transport.borrow().listeners(self.id(), name);
        for handler in &handlers {
            handler.call(self, args)?;
        }
        Ok(())
    }

    /// Reads `name` and invokes it with `args` if it holds a handler.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, StateError> {
        match self.get(name)? {
            Value::Handler(handler) => handler.call(self, args),
            _ => Err(StateError::NotCallable {
                property: name.into(),
            }),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns `true` if `name` is a declared property.
    #[must_use]
    pub fn is_declared(&self, name: &str) -> bool {
        self.store().is_declared(name)
    }

    /// Returns `true` if `name` is declared and has been initialized.
    #[must_use]
    pub fn is_initialized(&self, name: &str) -> bool {
        self.store().is_initialized(name)
    }

    /// Returns `true` if `name` was declared as a passthrough property.
    #[must_use]
    pub fn is_passthrough(&self, name: &str) -> bool {
        self.store().is_passthrough(name)
    }

    /// Returns the declared property names in declaration order.
    #[must_use]
    pub fn properties(&self) -> Vec<String> {
        self.store().declared_names().map(String::from).collect()
    }

    // =========================================================================
    // Crate internals
    // =========================================================================

    fn is_managed(&self, name: &str) -> bool {
        let store = self.store();
        store.is_declared(name) && !store.is_passthrough(name)
    }

    pub(crate) fn store(&self) -> Ref<'_, TargetStore> {
        self.inner.store.borrow()
    }

    pub(crate) fn store_mut(&self) -> RefMut<'_, TargetStore> {
        self.inner.store.borrow_mut()
    }

    pub(crate) fn try_store_mut(&self) -> Option<RefMut<'_, TargetStore>> {
        self.inner.store.try_borrow_mut().ok()
    }

    pub(crate) fn transport_mut(&self) -> RefMut<'_, dyn EventTransport + 'static> {
        self.inner.transport.borrow_mut()
    }

    /// Reports to the trace sink, if one is installed and not busy.
    pub(crate) fn trace(&self, f: impl FnOnce(&mut dyn TransitionTrace)) {
        if let Ok(mut slot) = self.inner.trace.try_borrow_mut()
            && let Some(sink) = slot.as_mut()
        {
            f(&mut **sink);
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Target {}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Target");
        s.field("id", &self.id());
        match self.inner.store.try_borrow() {
            Ok(store) => s.field("properties", &store.declared_names().collect::<Vec<_>>()),
            Err(_) => s.field("properties", &"<in transition>"),
        };
        s.finish_non_exhaustive()
    }
}

/// A non-owning handle to a [`Target`].
///
/// Hooks that need to refer back to their target from a stored closure
/// should capture a `WeakTarget`, so the closure does not keep its own
/// target alive.
#[derive(Clone)]
pub struct WeakTarget {
    inner: Weak<TargetInner>,
}

impl WeakTarget {
    /// Returns the target if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Target> {
        self.inner.upgrade().map(|inner| Target { inner })
    }
}

impl fmt::Debug for WeakTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTarget")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
