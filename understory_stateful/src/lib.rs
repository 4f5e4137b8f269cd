// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Stateful: finite-state-machine-backed object properties.
//!
//! Assigning a value to a stateful property is a state transition. Each
//! state can run hooks when it is entered or left, redirect or reject the
//! assignment, and change how *other* properties of the same object behave
//! while it is active.
//!
//! ## Core Concepts
//!
//! ### Declarations
//!
//! Properties are declared as a [`DeclMap`] tree and installed on a
//! [`Target`] with [`apply_state`]. A property is either a plain default
//! value or a state map:
//!
//! - **Lifecycle keys** `init`, `get`, `set` and `changed` hold hooks that
//!   compute the initial value, transform reads and writes, and observe
//!   settled changes.
//! - **State keys** name the values the property can hold. Their descriptors
//!   carry `enter`/`leave` hooks and overrides for other properties.
//! - **The wildcard** `_` matches every value without its own state.
//!
//! Composite keys such as `"1, 2"` are shorthand for repeating a descriptor.
//!
//! ### Hook Outcomes
//!
//! Enter and leave hooks steer the transition through their result (see
//! [`HookOutcome`]): no value proceeds, `false` rejects, and any other value
//! redirects the assignment to that value.
//!
//! ### Overrides
//!
//! A state descriptor entry naming another property either writes a value to
//! it or, when it is a map, overrides that property's own hooks and states
//! while the state is active. Leaving the state removes the overrides again.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_stateful::{DeclMap, Handler, Target, Value, apply_state};
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let record = |tag: &'static str| {
//!     let seen = seen.clone();
//!     Handler::action(move |_| seen.borrow_mut().push(tag))
//! };
//!
//! let target = Target::new();
//! apply_state(
//!     &target,
//!     &DeclMap::new().with(
//!         "a",
//!         DeclMap::new()
//!             .with("1", DeclMap::new().with("enter", record("enter 1")))
//!             .with("2", DeclMap::new().with("enter", record("enter 2")))
//!             .with(
//!                 "_",
//!                 DeclMap::new()
//!                     .with("enter", record("enter _"))
//!                     .with("leave", record("leave _")),
//!             ),
//!     ),
//!     &[],
//! )?;
//!
//! target.set("a", 1)?;
//! target.set("a", 2)?;
//! target.set("a", 8)?;
//!
//! assert_eq!(target.get("a")?, Value::from(8));
//! assert_eq!(
//!     *seen.borrow(),
//!     ["enter _", "leave _", "enter 1", "enter 2", "enter _"]
//! );
//! # Ok::<(), understory_stateful::StateError>(())
//! ```
//!
//! The property starts out `Undefined`, which has no state key of its own,
//! so initialization enters the wildcard state.
//!
//! ## Observability
//!
//! The engine does not log. Install a [`TransitionTrace`] sink on a target,
//! such as a shared [`TransitionLog`], to follow its transitions.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. Targets are single-threaded
//! (`Rc`-based) and fully synchronous.

#![no_std]

extern crate alloc;

mod config;
mod decl;
mod deps;
mod engine;
mod error;
mod handler;
mod store;
mod table;
mod target;
mod trace;
mod transport;
mod value;

pub use config::{DEFAULT_MAX_DEPTH, StateConfig, StateConfigBuilder};
pub use decl::{Decl, DeclMap};
pub use engine::apply_state;
pub use error::StateError;
pub use handler::{Handler, HookOutcome};
pub use target::{Target, TargetId, WeakTarget};
pub use trace::{TransitionEvent, TransitionLog, TransitionTrace};
pub use transport::{EventTransport, Listeners};
pub use value::Value;
