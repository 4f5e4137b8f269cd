// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explainability hooks for transitions.
//!
//! The engine keeps no history of its own. Embedders that want to know why a
//! property holds its value can install a [`TransitionTrace`] sink on a
//! target; [`TransitionLog`] is a small recorder that keeps every event in
//! order.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::value::Value;

/// A callback sink for transition events.
///
/// All methods default to doing nothing. Sinks receive plain data and must not
/// call back into the target.
pub trait TransitionTrace {
    /// A property was initialized with `value`.
    fn init(&mut self, property: &str, value: &Value) {
        let _ = (property, value);
    }

    /// The state matched under `state` was left for `to`.
    fn leave(&mut self, property: &str, state: &str, to: &Value) {
        let _ = (property, state, to);
    }

    /// The state matched under `state` was entered with `value`.
    fn enter(&mut self, property: &str, state: &str, value: &Value) {
        let _ = (property, state, value);
    }

    /// A hook redirected the assignment of `from` to `to`.
    fn redirect(&mut self, property: &str, from: &Value, to: &Value) {
        let _ = (property, from, to);
    }

    /// A hook rejected the assignment of `value`.
    fn reject(&mut self, property: &str, value: &Value) {
        let _ = (property, value);
    }

    /// The property settled on `new`, coming from `old`.
    fn changed(&mut self, property: &str, new: &Value, old: &Value) {
        let _ = (property, new, old);
    }

    /// A handler was bound (`bound == true`) or unbound under `name`.
    fn listener(&mut self, name: &str, bound: bool) {
        let _ = (name, bound);
    }
}

impl<T: TransitionTrace + ?Sized> TransitionTrace for Rc<RefCell<T>> {
    fn init(&mut self, property: &str, value: &Value) {
        self.borrow_mut().init(property, value);
    }

    fn leave(&mut self, property: &str, state: &str, to: &Value) {
        self.borrow_mut().leave(property, state, to);
    }

    fn enter(&mut self, property: &str, state: &str, value: &Value) {
        self.borrow_mut().enter(property, state, value);
    }

    fn redirect(&mut self, property: &str, from: &Value, to: &Value) {
        self.borrow_mut().redirect(property, from, to);
    }

    fn reject(&mut self, property: &str, value: &Value) {
        self.borrow_mut().reject(property, value);
    }

    fn changed(&mut self, property: &str, new: &Value, old: &Value) {
        self.borrow_mut().changed(property, new, old);
    }

    fn listener(&mut self, name: &str, bound: bool) {
        self.borrow_mut().listener(name, bound);
    }
}

/// One recorded transition event.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionEvent {
    /// See [`TransitionTrace::init`].
    Init {
        /// Property name.
        property: String,
        /// Initial value before the first write.
        value: Value,
    },
    /// See [`TransitionTrace::leave`].
    Leave {
        /// Property name.
        property: String,
        /// State key that was left.
        state: String,
        /// Value being assigned.
        to: Value,
    },
    /// See [`TransitionTrace::enter`].
    Enter {
        /// Property name.
        property: String,
        /// State key that was entered.
        state: String,
        /// Value that was committed.
        value: Value,
    },
    /// See [`TransitionTrace::redirect`].
    Redirect {
        /// Property name.
        property: String,
        /// Value that was being assigned.
        from: Value,
        /// Value assigned instead.
        to: Value,
    },
    /// See [`TransitionTrace::reject`].
    Reject {
        /// Property name.
        property: String,
        /// Value that was refused.
        value: Value,
    },
    /// See [`TransitionTrace::changed`].
    Changed {
        /// Property name.
        property: String,
        /// Settled value.
        new: Value,
        /// Previous value.
        old: Value,
    },
    /// See [`TransitionTrace::listener`].
    Listener {
        /// Event name.
        name: String,
        /// `true` for bind, `false` for unbind.
        bound: bool,
    },
}

/// Records every transition event in order.
#[derive(Clone, Debug, Default)]
pub struct TransitionLog {
    events: Vec<TransitionEvent>,
}

impl TransitionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[TransitionEvent] {
        &self.events
    }

    /// Removes and returns the recorded events.
    pub fn take(&mut self) -> Vec<TransitionEvent> {
        core::mem::take(&mut self.events)
    }

    /// Clears the log.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// State keys entered by `property`, in order.
    #[must_use]
    pub fn entered(&self, property: &str) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TransitionEvent::Enter {
                    property: p, state, ..
                } if p == property => Some(state.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl TransitionTrace for TransitionLog {
    fn init(&mut self, property: &str, value: &Value) {
        self.events.push(TransitionEvent::Init {
            property: property.into(),
            value: value.clone(),
        });
    }

    fn leave(&mut self, property: &str, state: &str, to: &Value) {
        self.events.push(TransitionEvent::Leave {
            property: property.into(),
            state: state.into(),
            to: to.clone(),
        });
    }

    fn enter(&mut self, property: &str, state: &str, value: &Value) {
        self.events.push(TransitionEvent::Enter {
            property: property.into(),
            state: state.into(),
            value: value.clone(),
        });
    }

    fn redirect(&mut self, property: &str, from: &Value, to: &Value) {
        self.events.push(TransitionEvent::Redirect {
            property: property.into(),
            from: from.clone(),
            to: to.clone(),
        });
    }

    fn reject(&mut self, property: &str, value: &Value) {
        self.events.push(TransitionEvent::Reject {
            property: property.into(),
            value: value.clone(),
        });
    }

    fn changed(&mut self, property: &str, new: &Value, old: &Value) {
        self.events.push(TransitionEvent::Changed {
            property: property.into(),
            new: new.clone(),
            old: old.clone(),
        });
    }

    fn listener(&mut self, name: &str, bound: bool) {
        self.events.push(TransitionEvent::Listener {
            name: name.into(),
            bound,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn log_records_in_order() {
        let mut log = TransitionLog::new();
        log.enter("a", "1", &Value::from(1));
        log.leave("a", "1", &Value::from(2));
        log.enter("a", "_", &Value::from(2));
        assert_eq!(log.entered("a"), vec!["1", "_"]);
        assert_eq!(log.events().len(), 3);
        assert_eq!(log.take().len(), 3);
        assert!(log.events().is_empty());
    }

    #[test]
    fn shared_log_forwards() {
        let log = Rc::new(RefCell::new(TransitionLog::new()));
        let mut sink = log.clone();
        sink.reject("a", &Value::from(false));
        assert_eq!(
            log.borrow().events(),
            &[TransitionEvent::Reject {
                property: "a".into(),
                value: Value::from(false),
            }]
        );
    }
}
