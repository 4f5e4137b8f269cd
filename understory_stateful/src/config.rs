// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration.
//!
//! This module provides [`StateConfig`] and [`StateConfigBuilder`] for
//! naming the reserved descriptor keys and bounding nested transitions.

use alloc::borrow::Cow;

/// Default bound on nested transitions of one target.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration shared by every property of a [`Target`](crate::Target).
///
/// # Example
///
/// ```rust
/// use understory_stateful::StateConfigBuilder;
///
/// // Declarations written with `before`/`after` hook names.
/// let config = StateConfigBuilder::new()
///     .enter_hook("before")
///     .leave_hook("after")
///     .max_depth(16)
///     .build();
///
/// assert_eq!(config.enter_hook(), "before");
/// assert_eq!(config.wildcard(), "_");
/// assert_eq!(config.max_depth(), 16);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateConfig {
    enter_hook: Cow<'static, str>,
    leave_hook: Cow<'static, str>,
    wildcard: Cow<'static, str>,
    separator: char,
    max_depth: usize,
}

impl Default for StateConfig {
    /// `enter`, `leave`, `_`, `,` and [`DEFAULT_MAX_DEPTH`].
    fn default() -> Self {
        Self {
            enter_hook: Cow::Borrowed("enter"),
            leave_hook: Cow::Borrowed("leave"),
            wildcard: Cow::Borrowed("_"),
            separator: ',',
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl StateConfig {
    /// Key of the hook run when a state is entered.
    #[must_use]
    #[inline]
    pub fn enter_hook(&self) -> &str {
        &self.enter_hook
    }

    /// Key of the hook run when a state is left.
    #[must_use]
    #[inline]
    pub fn leave_hook(&self) -> &str {
        &self.leave_hook
    }

    /// Key of the remainder state matching values with no explicit state.
    #[must_use]
    #[inline]
    pub fn wildcard(&self) -> &str {
        &self.wildcard
    }

    /// Separator of composite declaration keys.
    #[must_use]
    #[inline]
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Maximum nesting of transitions before
    /// [`StateError::RedirectCycle`](crate::StateError::RedirectCycle).
    #[must_use]
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns `true` for keys that name a transition hook.
    #[must_use]
    pub(crate) fn is_hook_key(&self, key: &str) -> bool {
        key == self.enter_hook || key == self.leave_hook
    }
}

/// Builder for [`StateConfig`].
#[derive(Clone, Debug, Default)]
pub struct StateConfigBuilder {
    config: StateConfig,
}

impl StateConfigBuilder {
    /// Starts from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the enter hook key.
    #[must_use]
    pub fn enter_hook(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.config.enter_hook = key.into();
        self
    }

    /// Sets the leave hook key.
    #[must_use]
    pub fn leave_hook(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.config.leave_hook = key.into();
        self
    }

    /// Sets the wildcard state key.
    #[must_use]
    pub fn wildcard(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.config.wildcard = key.into();
        self
    }

    /// Sets the composite key separator.
    #[must_use]
    pub fn separator(mut self, separator: char) -> Self {
        self.config.separator = separator;
        self
    }

    /// Sets the nested transition bound. Values below 1 are raised to 1.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth.max(1);
        self
    }

    /// Builds the [`StateConfig`].
    #[must_use]
    pub fn build(self) -> StateConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StateConfig::default();
        assert_eq!(config.enter_hook(), "enter");
        assert_eq!(config.leave_hook(), "leave");
        assert_eq!(config.wildcard(), "_");
        assert_eq!(config.separator(), ',');
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn hook_keys_follow_configuration() {
        let config = StateConfigBuilder::new().enter_hook("before").build();
        assert!(config.is_hook_key("before"));
        assert!(config.is_hook_key("leave"));
        assert!(!config.is_hook_key("enter"));
    }

    #[test]
    fn max_depth_is_at_least_one() {
        let config = StateConfigBuilder::new().max_depth(0).build();
        assert_eq!(config.max_depth(), 1);
    }
}
