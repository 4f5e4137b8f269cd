// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic property values.
//!
//! This module provides [`Value`], the dynamically typed value a stateful
//! property holds, and the state-key classification used to pick the active
//! state for a value.

use alloc::borrow::Cow;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;

use crate::handler::Handler;

/// The value held by a stateful property.
///
/// Equality is strict: numbers compare as `f64` (so `NaN != NaN`), strings by
/// content, and handlers by identity.
///
/// # Example
///
/// ```rust
/// use understory_stateful::Value;
///
/// assert_eq!(Value::from(1), Value::from(1.0));
/// assert_ne!(Value::from(1), Value::from("1"));
///
/// // ...but both are classified under the same state key.
/// assert_eq!(Value::from(1).state_key(), Value::from("1").state_key());
/// assert_eq!(Value::Undefined.state_key(), None);
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value. Hook results of `Undefined` mean "no opinion".
    #[default]
    Undefined,
    /// An explicit empty value.
    Null,
    /// A boolean. A hook returning `false` rejects a transition.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    Str(Rc<str>),
    /// A callable, bound as an event listener when a state installs it.
    Handler(Handler),
}

impl Value {
    /// Returns `true` for [`Value::Undefined`].
    #[must_use]
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Strict equality, except that `NaN` is the same as `NaN`.
    ///
    /// Transitions use this to decide whether a value changed, so assigning
    /// `NaN` twice is a no-op rather than a new transition.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Returns the number, if this is a [`Value::Number`].
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the handler, if this is a [`Value::Handler`].
    #[must_use]
    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Returns the state key this value is classified under.
    ///
    /// Values are keyed by their canonical text, so `1`, `1.0` and `"1"` all
    /// select the state declared under `"1"`. `Undefined` and handlers have no
    /// key; they always fall through to the wildcard state.
    #[must_use]
    pub fn state_key(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Undefined | Self::Handler(_) => None,
            Self::Null => Some(Cow::Borrowed("null")),
            Self::Bool(true) => Some(Cow::Borrowed("true")),
            Self::Bool(false) => Some(Cow::Borrowed("false")),
            Self::Number(n) => Some(number_key(*n)),
            Self::Str(s) => Some(Cow::Borrowed(s)),
        }
    }
}

fn number_key(n: f64) -> Cow<'static, str> {
    if n == 0.0 {
        // Covers -0 as well.
        Cow::Borrowed("0")
    } else if n.is_nan() {
        Cow::Borrowed("NaN")
    } else if n.is_infinite() {
        Cow::Borrowed(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        Cow::Owned(number_text(n))
    }
}

/// Formats a finite, non-zero number the way `Number#toString` does:
/// positional between `1e-7` and `1e21`, exponent form outside.
fn number_text(n: f64) -> String {
    // `{:e}` yields the shortest round-tripping digits, e.g. `1.2345e2`.
    let sci = format!("{:e}", n.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let len = i32::try_from(digits.len()).unwrap_or(i32::MAX);
    // Position of the decimal point relative to the first digit.
    let point = exp + 1;

    let mut out = String::new();
    if n < 0.0 {
        out.push('-');
    }
    if len <= point && point <= 21 {
        out.push_str(&digits);
        out.extend(core::iter::repeat_n('0', usize::try_from(point - len).unwrap_or(0)));
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(usize::try_from(point).unwrap_or(0));
        out.push_str(int);
        out.push('.');
        out.push_str(frac);
    } else if -6 < point && point <= 0 {
        out.push_str("0.");
        out.extend(core::iter::repeat_n('0', usize::try_from(-point).unwrap_or(0)));
        out.push_str(&digits);
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let sign = if point > 0 { '+' } else { '-' };
        out.push_str(&format!("e{sign}{}", (point - 1).unsigned_abs()));
    }
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Self::Handler(h)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_equality() {
        assert_eq!(Value::from(2), Value::from(2.0));
        assert_ne!(Value::from(2), Value::from("2"));
        assert_ne!(Value::Null, Value::Undefined);
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from("abc"), Value::from(String::from("abc")));
    }

    #[test]
    fn handlers_compare_by_identity() {
        let h = Handler::new(|_, _| Ok(Value::Undefined));
        let same = h.clone();
        let other = Handler::new(|_, _| Ok(Value::Undefined));
        assert_eq!(Value::from(h.clone()), Value::from(same));
        assert_ne!(Value::from(h), Value::from(other));
    }

    #[test]
    fn state_keys_collapse_by_text() {
        assert_eq!(Value::from(1).state_key().as_deref(), Some("1"));
        assert_eq!(Value::from(0.5).state_key().as_deref(), Some("0.5"));
        assert_eq!(Value::from(-0.0).state_key().as_deref(), Some("0"));
        assert_eq!(Value::from(f64::INFINITY).state_key().as_deref(), Some("Infinity"));
        assert_eq!(Value::from(false).state_key().as_deref(), Some("false"));
        assert_eq!(Value::Null.state_key().as_deref(), Some("null"));
        assert_eq!(Value::from("null").state_key(), Value::Null.state_key());
    }

    #[test]
    fn number_keys_follow_number_text() {
        let key = |n: f64| Value::from(n).state_key().map(Cow::into_owned);
        assert_eq!(key(f64::NAN).as_deref(), Some("NaN"));
        assert_eq!(key(-1.5).as_deref(), Some("-1.5"));
        assert_eq!(key(123.45).as_deref(), Some("123.45"));
        assert_eq!(key(1e20).as_deref(), Some("100000000000000000000"));
        assert_eq!(key(1e21).as_deref(), Some("1e+21"));
        assert_eq!(key(1.5e22).as_deref(), Some("1.5e+22"));
        assert_eq!(key(1e-6).as_deref(), Some("0.000001"));
        assert_eq!(key(1e-7).as_deref(), Some("1e-7"));
        assert_eq!(key(-2.5e-8).as_deref(), Some("-2.5e-8"));
    }

    #[test]
    fn nan_is_the_same_as_itself() {
        let nan = Value::from(f64::NAN);
        assert!(nan.is_same(&nan.clone()));
        assert!(Value::from(0.0).is_same(&Value::from(-0.0)));
        assert!(!Value::from(1).is_same(&Value::from("1")));
        assert!(!nan.is_same(&Value::Undefined));
    }

    #[test]
    fn undefined_and_handlers_have_no_key() {
        assert!(Value::Undefined.state_key().is_none());
        let h = Handler::new(|_, _| Ok(Value::Undefined));
        assert!(Value::from(h).state_key().is_none());
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::from(3));
    }
}
