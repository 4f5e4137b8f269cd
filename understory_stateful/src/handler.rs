// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Callables, hook invocation and hook outcomes.

use alloc::rc::Rc;
use core::fmt;

use crate::decl::Decl;
use crate::error::StateError;
use crate::target::Target;
use crate::value::Value;

type HandlerFn = dyn Fn(&Target, &[Value]) -> Result<Value, StateError>;

/// A reference-counted callable.
///
/// Handlers serve as transition hooks (`enter`, `leave`, `init`, `get`,
/// `set`, `changed`) and as event listeners. They always run with the target
/// as receiver, so a hook can read and assign other properties of the same
/// object.
///
/// Two handlers are equal only if they are clones of the same allocation.
///
/// # Example
///
/// ```rust
/// use understory_stateful::{Handler, Target, Value};
///
/// let double = Handler::hook(|_, new, _| match new.as_number() {
///     Some(n) => Ok(Value::from(n * 2.0)),
///     None => Ok(Value::Undefined),
/// });
///
/// let target = Target::new();
/// assert_eq!(double.call(&target, &[Value::from(4)]).unwrap(), Value::from(8));
/// ```
#[derive(Clone)]
pub struct Handler(Rc<HandlerFn>);

impl Handler {
    /// Creates a handler receiving the raw argument list.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Target, &[Value]) -> Result<Value, StateError> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Creates a handler shaped like a transition hook: `(target, new, old)`.
    ///
    /// Missing arguments are passed as [`Value::Undefined`].
    pub fn hook<F>(f: F) -> Self
    where
        F: Fn(&Target, &Value, &Value) -> Result<Value, StateError> + 'static,
    {
        Self::new(move |target, args| {
            let new = args.first().unwrap_or(&Value::Undefined);
            let old = args.get(1).unwrap_or(&Value::Undefined);
            f(target, new, old)
        })
    }

    /// Creates a handler that runs `f` for its side effects and returns
    /// [`Value::Undefined`] ("no opinion").
    pub fn action<F>(f: F) -> Self
    where
        F: Fn(&Target) + 'static,
    {
        Self::new(move |target, _| {
            f(target);
            Ok(Value::Undefined)
        })
    }

    /// Invokes the handler with `target` as receiver.
    pub fn call(&self, target: &Target, args: &[Value]) -> Result<Value, StateError> {
        (self.0)(target, args)
    }

    /// Returns `true` if both handlers share one allocation.
    #[must_use]
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    /// Returns an address usable as an identity key.
    #[must_use]
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:#x})", self.addr())
    }
}

/// How a transition proceeds after an `enter` or `leave` hook ran.
#[derive(Clone, Debug, PartialEq)]
pub enum HookOutcome {
    /// The hook had no objection.
    Proceed,
    /// The hook rejected the transition; the property keeps its old value.
    Reject,
    /// The hook asked for a different value to be assigned instead.
    RedirectTo(Value),
}

impl HookOutcome {
    /// Classifies a hook result against the value being assigned.
    ///
    /// `Undefined` and the candidate itself mean [`Proceed`](Self::Proceed),
    /// `false` means [`Reject`](Self::Reject), anything else redirects.
    ///
    /// The candidate is compared first (with [`Value::is_same`]), so a hook
    /// echoing a `false` or `NaN` candidate lets the assignment through.
    #[must_use]
    pub fn classify(result: Value, candidate: &Value) -> Self {
        match result {
            Value::Undefined => Self::Proceed,
            other if other.is_same(candidate) => Self::Proceed,
            Value::Bool(false) => Self::Reject,
            other => Self::RedirectTo(other),
        }
    }
}

/// Invokes a hook slot.
///
/// - absent: returns `a1` unchanged
/// - a handler: calls it with `[a1, a2]`
/// - any other value: returns that value as a constant
/// - a map: recurses into its `enter` slot
pub(crate) fn call_hook(
    target: &Target,
    slot: Option<&Decl>,
    enter: &str,
    a1: &Value,
    a2: &Value,
) -> Result<Value, StateError> {
    match slot {
        None => Ok(a1.clone()),
        Some(Decl::Value(Value::Handler(h))) => h.call(target, &[a1.clone(), a2.clone()]),
        Some(Decl::Value(v)) => Ok(v.clone()),
        Some(Decl::Map(map)) => call_hook(target, map.get(enter), enter, a1, a2),
    }
}

/// Invokes the `enter` or `leave` slot of a state.
///
/// Unlike [`call_hook`], an absent slot (or a map without the `enter` slot)
/// has no opinion and yields `Undefined`.
pub(crate) fn call_state_hook(
    target: &Target,
    slot: Option<&Decl>,
    enter: &str,
    a1: &Value,
    a2: &Value,
) -> Result<Value, StateError> {
    match slot {
        None => Ok(Value::Undefined),
        Some(Decl::Map(map)) => call_state_hook(target, map.get(enter), enter, a1, a2),
        Some(slot) => call_hook(target, Some(slot), enter, a1, a2),
    }
}

/// Like [`call_hook`], but an `Undefined` result falls back to `a1`.
pub(crate) fn call_hook_or(
    target: &Target,
    slot: Option<&Decl>,
    enter: &str,
    a1: &Value,
    a2: &Value,
) -> Result<Value, StateError> {
    let result = call_hook(target, slot, enter, a1, a2)?;
    Ok(if result.is_undefined() {
        a1.clone()
    } else {
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::DeclMap;
    use core::cell::Cell;

    #[test]
    fn classify_outcomes() {
        let candidate = Value::from(1);
        assert_eq!(
            HookOutcome::classify(Value::Undefined, &candidate),
            HookOutcome::Proceed
        );
        assert_eq!(
            HookOutcome::classify(Value::from(1), &candidate),
            HookOutcome::Proceed
        );
        assert_eq!(
            HookOutcome::classify(Value::from(false), &candidate),
            HookOutcome::Reject
        );
        assert_eq!(
            HookOutcome::classify(Value::from(2), &candidate),
            HookOutcome::RedirectTo(Value::from(2))
        );
        assert_eq!(
            HookOutcome::classify(Value::Null, &candidate),
            HookOutcome::RedirectTo(Value::Null)
        );
    }

    #[test]
    fn classify_echoed_candidates_proceed() {
        let no = Value::from(false);
        assert_eq!(HookOutcome::classify(no.clone(), &no), HookOutcome::Proceed);
        assert_eq!(
            HookOutcome::classify(no, &Value::from(true)),
            HookOutcome::Reject
        );

        let nan = Value::from(f64::NAN);
        assert_eq!(HookOutcome::classify(nan.clone(), &nan), HookOutcome::Proceed);
    }

    #[test]
    fn state_slots_without_enter_have_no_opinion() {
        let target = Target::new();
        let out =
            call_state_hook(&target, None, "enter", &Value::from(false), &Value::Null).unwrap();
        assert_eq!(out, Value::Undefined);

        let empty = Decl::from(DeclMap::new());
        let out = call_state_hook(&target, Some(&empty), "enter", &Value::from(false), &Value::Null)
            .unwrap();
        assert_eq!(out, Value::Undefined);

        let constant = Decl::from(DeclMap::new().with("enter", 4));
        let out = call_state_hook(&target, Some(&constant), "enter", &Value::from(1), &Value::Null)
            .unwrap();
        assert_eq!(out, Value::from(4));
    }

    #[test]
    fn absent_slot_passes_first_argument() {
        let target = Target::new();
        let out = call_hook(&target, None, "enter", &Value::from(5), &Value::Null).unwrap();
        assert_eq!(out, Value::from(5));
    }

    #[test]
    fn constant_slot_ignores_arguments() {
        let target = Target::new();
        let slot = Decl::from(7);
        let out = call_hook(&target, Some(&slot), "enter", &Value::from(5), &Value::Null).unwrap();
        assert_eq!(out, Value::from(7));
    }

    #[test]
    fn handler_receives_new_and_old() {
        let target = Target::new();
        let slot = Decl::from(Handler::hook(|_, new, old| {
            assert_eq!(new, &Value::from(2));
            assert_eq!(old, &Value::from(1));
            Ok(Value::from("seen"))
        }));
        let out = call_hook(&target, Some(&slot), "enter", &Value::from(2), &Value::from(1)).unwrap();
        assert_eq!(out, Value::from("seen"));
    }

    #[test]
    fn map_slot_recurses_into_enter() {
        let target = Target::new();
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        let slot = Decl::from(DeclMap::new().with(
            "before",
            Handler::action(move |_| seen.set(seen.get() + 1)),
        ));
        let out = call_hook(&target, Some(&slot), "before", &Value::from(1), &Value::Null).unwrap();
        assert_eq!(out, Value::Undefined);
        assert_eq!(hits.get(), 1);

        // A map without the enter slot behaves like an absent slot.
        let out = call_hook(&target, Some(&slot), "enter", &Value::from(1), &Value::Null).unwrap();
        assert_eq!(out, Value::from(1));
    }

    #[test]
    fn undefined_result_falls_back() {
        let target = Target::new();
        let slot = Decl::from(Handler::action(|_| {}));
        let out =
            call_hook_or(&target, Some(&slot), "enter", &Value::from(3), &Value::Null).unwrap();
        assert_eq!(out, Value::from(3));
    }
}
