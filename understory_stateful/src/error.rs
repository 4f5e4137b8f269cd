// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for declaration and transition failures.

use alloc::borrow::Cow;
use alloc::string::String;
use core::fmt;

use crate::value::Value;

/// Errors produced while applying declarations or running transitions.
///
/// Ordinary control flow (reject, redirect) is never an error: it is carried
/// by hook results. These variants cover declarations that cannot be run,
/// transitions that never settle, and failures raised by user handlers.
#[derive(Clone, PartialEq)]
pub enum StateError {
    /// A declaration failed validation in [`apply_state`](crate::apply_state).
    ///
    /// No property of the target has been touched when this is returned.
    InvalidDeclaration {
        /// Dotted path to the offending entry, e.g. `a.1.enter`.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Transitions of a property nested deeper than the configured bound.
    ///
    /// This is how redirect chains such as `1 → 2 → 1` surface.
    RedirectCycle {
        /// The property being assigned when the bound was hit.
        property: String,
        /// The value that would have been assigned next.
        value: Value,
        /// The depth that was exceeded.
        depth: usize,
    },
    /// [`Target::call`](crate::Target::call) found no handler under the name.
    NotCallable {
        /// The name that was called.
        property: String,
    },
    /// A user handler failed.
    Hook {
        /// The property whose hook failed, if the engine knows it.
        property: Option<String>,
        /// Description supplied by the handler.
        message: Cow<'static, str>,
    },
}

impl StateError {
    /// Creates an error for a user handler to return.
    ///
    /// ```rust
    /// use understory_stateful::{Handler, StateError};
    ///
    /// let strict = Handler::hook(|_, new, _| {
    ///     if new.as_number().is_some() {
    ///         Ok(new.clone())
    ///     } else {
    ///         Err(StateError::hook("expected a number"))
    ///     }
    /// });
    /// # let _ = strict;
    /// ```
    #[must_use]
    pub fn hook(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Hook {
            property: None,
            message: message.into(),
        }
    }

    /// Attaches the property name to a [`StateError::Hook`] that lacks one.
    #[must_use]
    pub(crate) fn in_property(self, name: &str) -> Self {
        match self {
            Self::Hook {
                property: None,
                message,
            } => Self::Hook {
                property: Some(name.into()),
                message,
            },
            other => other,
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidDeclaration {
            path: path.into(),
            reason,
        }
    }
}

impl fmt::Debug for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDeclaration { path, reason } => f
                .debug_struct("InvalidDeclaration")
                .field("path", path)
                .field("reason", reason)
                .finish(),
            Self::RedirectCycle {
                property,
                value,
                depth,
            } => f
                .debug_struct("RedirectCycle")
                .field("property", property)
                .field("value", value)
                .field("depth", depth)
                .finish(),
            Self::NotCallable { property } => f
                .debug_struct("NotCallable")
                .field("property", property)
                .finish(),
            Self::Hook { property, message } => f
                .debug_struct("Hook")
                .field("property", property)
                .field("message", message)
                .finish(),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDeclaration { path, reason } => {
                write!(f, "invalid declaration at `{path}`: {reason}")
            }
            Self::RedirectCycle {
                property,
                value,
                depth,
            } => write!(
                f,
                "transition of `{property}` to {value:?} exceeded {depth} nested transitions"
            ),
            Self::NotCallable { property } => write!(f, "`{property}` does not hold a handler"),
            Self::Hook {
                property: Some(property),
                message,
            } => write!(f, "hook of `{property}` failed: {message}"),
            Self::Hook {
                property: None,
                message,
            } => write!(f, "hook failed: {message}"),
        }
    }
}

impl core::error::Error for StateError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::ToString;

    #[test]
    fn display_invalid_declaration() {
        let err = StateError::invalid("a.1.enter", "hook slot must not be a map");
        assert_eq!(
            err.to_string(),
            "invalid declaration at `a.1.enter`: hook slot must not be a map"
        );
    }

    #[test]
    fn display_redirect_cycle() {
        let err = StateError::RedirectCycle {
            property: "a".into(),
            value: Value::from(2),
            depth: 64,
        };
        let text = err.to_string();
        assert!(text.contains("`a`"), "{text}");
        assert!(text.contains("64"), "{text}");
    }

    #[test]
    fn display_not_callable() {
        let err = StateError::NotCallable {
            property: "count".into(),
        };
        assert_eq!(err.to_string(), "`count` does not hold a handler");
    }

    #[test]
    fn hook_error_picks_up_property_once() {
        let err = StateError::hook("boom").in_property("x").in_property("y");
        assert_eq!(err.to_string(), "hook of `x` failed: boom");
        assert!(format!("{err:?}").contains("Hook"));
    }
}
