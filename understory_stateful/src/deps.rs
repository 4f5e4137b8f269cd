// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Initialization-order dependencies between properties.
//!
//! When a state of `p` overrides property `q`, `q` depends on `p`: `p` must
//! have entered its initial state before `q`'s own logic can be trusted to
//! reflect it. A nested entry whose value is the name of another declared
//! property (an alias) also makes `p` depend on that property.
//!
//! Every map under a property is scanned, lifecycle maps (`init`, `get`,
//! `set`, `changed`) included; only their hook slots are skipped.
//!
//! Cycles are not rejected. Resolving a property consumes its entry before
//! its dependencies are visited, so each participant of a cycle is resolved
//! at most once; the order inside a cycle depends on which member is
//! resolved first.

use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::config::StateConfig;
use crate::decl::{Decl, DeclMap};
use crate::value::Value;

type DepList = SmallVec<[String; 2]>;

/// Dependency graph of one target's properties.
///
/// Every property has an entry; `None` marks a resolved (initialized)
/// property. Properties are kept in discovery order, which is the order
/// [`apply_state`](crate::apply_state) initializes them in.
#[derive(Clone, Debug, Default)]
pub(crate) struct DependencyGraph {
    order: Vec<String>,
    pending: HashMap<String, Option<DepList>>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Builds the graph of a normalized declaration tree.
    pub(crate) fn build(decls: &DeclMap, config: &StateConfig) -> Self {
        let mut graph = Self::new();

        for (name, decl) in decls.iter() {
            graph.add_property(name);
            let Decl::Map(states) = decl else {
                continue;
            };
            for (_, descriptor) in states.iter() {
                let Decl::Map(descriptor) = descriptor else {
                    continue;
                };
                for (inner, entry) in descriptor.iter() {
                    if config.is_hook_key(inner) || inner == name {
                        continue;
                    }
                    graph.add_dependency(inner, name);
                    if let Decl::Value(Value::Str(alias)) = entry
                        && &**alias != name
                        && decls.contains_key(alias)
                    {
                        graph.add_dependency(name, alias);
                    }
                }
            }
        }

        graph
    }

    /// Registers a property with no dependencies, if unknown.
    pub(crate) fn add_property(&mut self, name: &str) {
        if !self.pending.contains_key(name) {
            self.order.push(name.into());
            self.pending.insert(name.into(), Some(DepList::new()));
        }
    }

    /// Records that `from` depends on `on`.
    ///
    /// Returns `false` if the edge already existed or `from` is resolved.
    pub(crate) fn add_dependency(&mut self, from: &str, on: &str) -> bool {
        self.add_property(from);
        self.add_property(on);
        match self.pending.get_mut(from) {
            Some(Some(deps)) if !deps.iter().any(|d| d == on) => {
                deps.push(on.into());
                true
            }
            _ => false,
        }
    }

    /// Marks `name` resolved and returns its dependencies.
    ///
    /// Returns `None` if `name` is unknown or already resolved.
    pub(crate) fn take(&mut self, name: &str) -> Option<DepList> {
        self.pending.get_mut(name).and_then(Option::take)
    }

    /// Returns `true` if `name` is known to the graph.
    #[cfg(test)]
    fn contains(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Returns `true` if `name` is known and resolved.
    pub(crate) fn is_resolved(&self, name: &str) -> bool {
        matches!(self.pending.get(name), Some(None))
    }

    /// Property names in discovery order.
    pub(crate) fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    /// Folds another graph into this one.
    ///
    /// Properties of `other` become pending again with `other`'s edges, even
    /// if they were resolved here.
    pub(crate) fn merge(&mut self, other: Self) {
        let Self { order, mut pending } = other;
        for name in order {
            let deps = pending.remove(&name).flatten().unwrap_or_default();
            if !self.pending.contains_key(&name) {
                self.order.push(name.clone());
            }
            self.pending.insert(name, Some(deps));
        }
    }

    /// Dependencies of a pending property, for inspection.
    #[cfg(test)]
    fn dependencies(&self, name: &str) -> Vec<&str> {
        match self.pending.get(name) {
            Some(Some(deps)) => deps.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn config() -> StateConfig {
        StateConfig::default()
    }

    #[test]
    fn nested_reference_depends_on_owner() {
        let decls = DeclMap::new()
            .with("a", DeclMap::new().with("init", 3))
            .with(
                "x",
                DeclMap::new().with("1", DeclMap::new().with("a", DeclMap::new().with("get", 1))),
            );
        let graph = DependencyGraph::build(&decls, &config());
        assert_eq!(graph.dependencies("a"), vec!["x"]);
        assert!(graph.dependencies("x").is_empty());
        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["a", "x"]);
    }

    #[test]
    fn hooks_and_self_references_are_skipped() {
        let decls = DeclMap::new().with(
            "a",
            DeclMap::new()
                .with("init", DeclMap::new().with("enter", 1))
                .with("1", DeclMap::new().with("enter", 2).with("leave", 3).with("a", 4)),
        );
        let graph = DependencyGraph::build(&decls, &config());
        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["a"]);
        assert!(graph.dependencies("a").is_empty());
    }

    #[test]
    fn lifecycle_maps_are_scanned_for_references() {
        let decls = DeclMap::new()
            .with("a", DeclMap::new().with("changed", DeclMap::new().with("enter", 1).with("b", 2)))
            .with("b", 0);
        let graph = DependencyGraph::build(&decls, &config());
        assert_eq!(graph.dependencies("b"), vec!["a"]);
        assert!(graph.dependencies("a").is_empty());
    }

    #[test]
    fn undeclared_references_become_properties() {
        let decls = DeclMap::new().with(
            "s",
            DeclMap::new().with("1", DeclMap::new().with("label", "one")),
        );
        let graph = DependencyGraph::build(&decls, &config());
        assert!(graph.contains("label"));
        assert_eq!(graph.dependencies("label"), vec!["s"]);
    }

    #[test]
    fn alias_values_add_reverse_edge() {
        let decls = DeclMap::new()
            .with("cb", 0)
            .with("a", DeclMap::new().with("2", DeclMap::new().with("alias", "cb")));
        let graph = DependencyGraph::build(&decls, &config());
        assert_eq!(graph.dependencies("alias"), vec!["a"]);
        assert_eq!(graph.dependencies("a"), vec!["cb"]);
    }

    #[test]
    fn take_resolves_once() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("b", "a");
        assert!(!graph.add_dependency("b", "a"));
        assert_eq!(graph.take("b").map(|d| d.into_vec()), Some(vec!["a".into()]));
        assert!(graph.is_resolved("b"));
        assert!(graph.take("b").is_none());
        assert!(graph.take("unknown").is_none());
        // Resolved properties take no new edges.
        assert!(!graph.add_dependency("b", "c"));
    }

    #[test]
    fn cycles_resolve_each_member_once() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");
        assert!(graph.take("a").is_some());
        assert!(graph.take("b").is_some());
        assert!(graph.take("a").is_none());
    }

    #[test]
    fn merge_reopens_redeclared_properties() {
        let mut graph = DependencyGraph::new();
        graph.add_property("x");
        graph.take("x");
        let mut other = DependencyGraph::new();
        other.add_property("x");
        other.add_property("y");
        graph.merge(other);
        assert!(!graph.is_resolved("x"));
        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["x", "y"]);
    }
}
