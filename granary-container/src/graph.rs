//! The destruction graph: who depends on whom, and who contains whom.
//!
//! Edges are discovered while beans are created: every resolved reference,
//! autowired collaborator and `depends_on` declaration records
//! `bean → dependent`. Teardown uses them so that a dependent is always
//! destroyed before the bean it depends on. Inner beans are also recorded
//! as *contained* by their outer bean and are destroyed after it.
//!
//! [`DependsOnValidator`] checks the declared `depends_on` relations for
//! cycles when the container is built, before any bean exists.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, instrument, trace, warn};

use granary_support::rendering::render_chain;

use crate::error::{ContainerError, Result};

#[derive(Debug, Default)]
struct Edges {
    /// bean -> beans depending on it, in discovery order
    dependents: HashMap<String, Vec<String>>,
    /// bean -> beans it depends on
    dependencies: HashMap<String, Vec<String>>,
    /// outer bean -> inner beans
    contained: HashMap<String, Vec<String>>,
}

fn push_unique(map: &mut HashMap<String, Vec<String>>, key: &str, value: &str) -> bool {
    let entry = map.entry(key.to_string()).or_default();
    if entry.iter().any(|v| v == value) {
        return false;
    }
    entry.push(value.to_string());
    true
}

/// Dependent-bean and contained-bean relations, built up during creation.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    edges: Mutex<Edges>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `dependent` depends on `bean`. Idempotent.
    pub fn register_dependent(&self, bean: &str, dependent: &str) {
        let mut edges = self.edges.lock();
        if push_unique(&mut edges.dependents, bean, dependent) {
            push_unique(&mut edges.dependencies, dependent, bean);
            trace!(bean, dependent, "Registered dependent bean");
        }
    }

    /// Records `inner` as contained in `outer`.
    ///
    /// The outer bean also becomes a dependent of the inner one, so it is
    /// destroyed first even when the inner bean is reached through another
    /// path.
    pub fn register_contained(&self, inner: &str, outer: &str) {
        {
            let mut edges = self.edges.lock();
            if !push_unique(&mut edges.contained, outer, inner) {
                return;
            }
        }
        self.register_dependent(inner, outer);
    }

    /// Returns `true` if `dependent` depends on `bean`, directly or transitively.
    pub fn is_dependent(&self, bean: &str, dependent: &str) -> bool {
        let edges = self.edges.lock();
        let mut seen = HashSet::new();
        Self::reaches(&edges, bean, dependent, &mut seen)
    }

    fn reaches<'e>(edges: &'e Edges, bean: &'e str, dependent: &str, seen: &mut HashSet<&'e str>) -> bool {
        if !seen.insert(bean) {
            return false;
        }
        let Some(direct) = edges.dependents.get(bean) else {
            return false;
        };
        if direct.iter().any(|d| d == dependent) {
            return true;
        }
        direct
            .iter()
            .any(|d| Self::reaches(edges, d, dependent, seen))
    }

    pub fn has_dependents(&self, bean: &str) -> bool {
        self.edges
            .lock()
            .dependents
            .get(bean)
            .is_some_and(|d| !d.is_empty())
    }

    pub fn dependents_of(&self, bean: &str) -> Vec<String> {
        self.edges.lock().dependents.get(bean).cloned().unwrap_or_default()
    }

    pub fn dependencies_of(&self, bean: &str) -> Vec<String> {
        self.edges.lock().dependencies.get(bean).cloned().unwrap_or_default()
    }

    pub fn contained_in(&self, bean: &str) -> Vec<String> {
        self.edges.lock().contained.get(bean).cloned().unwrap_or_default()
    }

    /// Detaches and returns the dependents of `bean`.
    pub fn take_dependents(&self, bean: &str) -> Vec<String> {
        self.edges.lock().dependents.remove(bean).unwrap_or_default()
    }

    /// Detaches and returns the beans contained in `bean`.
    pub fn take_contained(&self, bean: &str) -> Vec<String> {
        self.edges.lock().contained.remove(bean).unwrap_or_default()
    }

    /// Drops every edge that still mentions `bean` after it was destroyed.
    pub fn forget(&self, bean: &str) {
        let mut edges = self.edges.lock();
        edges.dependents.retain(|_, dependents| {
            dependents.retain(|d| d != bean);
            !dependents.is_empty()
        });
        edges.dependencies.remove(bean);
    }

    pub fn clear(&self) {
        let mut edges = self.edges.lock();
        edges.dependents.clear();
        edges.dependencies.clear();
        edges.contained.clear();
    }
}

/// Checks declared `depends_on` relations for cycles.
///
/// Depth-first search with a `visiting` set and the current path for the
/// error report. Names that are not declared are leaves: a missing target
/// is reported when the depending bean is created, since it may still be
/// registered later or live in a parent container.
pub(crate) struct DependsOnValidator {
    declared: HashMap<String, Vec<String>>,
    visiting: HashSet<String>,
    validated: HashSet<String>,
    path: Vec<String>,
}

impl DependsOnValidator {
    pub fn new(declared: HashMap<String, Vec<String>>) -> Self {
        Self {
            declared,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// # Errors
    /// [`ContainerError::BeanCreation`] naming both ends of the first cycle found.
    #[instrument(skip(self), name = "depends_on_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let mut names: Vec<String> = self.declared.keys().cloned().collect();
        names.sort();
        debug!(declaring = names.len(), "Validating depends-on declarations");

        for name in names {
            self.visit(&name)?;
        }
        Ok(())
    }

    fn visit(&mut self, name: &str) -> Result<()> {
        if self.validated.contains(name) {
            return Ok(());
        }
        if self.visiting.contains(name) {
            let start = self.path.iter().position(|n| n == name).unwrap_or(0);
            let mut chain: Vec<String> = self.path[start..].to_vec();
            chain.push(name.to_string());
            let depender = self.path.last().cloned().unwrap_or_else(|| name.to_string());
            warn!(cycle = %render_chain(&chain), "Circular depends-on relationship detected");
            return Err(ContainerError::creation(
                depender.clone(),
                format!(
                    "Circular depends-on relationship between '{depender}' and '{name}'\n  Cycle: {}",
                    render_chain(&chain)
                ),
            ));
        }

        let Some(targets) = self.declared.get(name).cloned() else {
            return Ok(());
        };

        self.visiting.insert(name.to_string());
        self.path.push(name.to_string());
        for target in &targets {
            self.visit(target)?;
        }
        self.path.pop();
        self.visiting.remove(name);
        self.validated.insert(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_dependent_is_idempotent() {
        let graph = DependencyGraph::new();
        graph.register_dependent("db", "repo");
        graph.register_dependent("db", "repo");
        assert_eq!(graph.dependents_of("db"), vec!["repo".to_string()]);
        assert_eq!(graph.dependencies_of("repo"), vec!["db".to_string()]);
    }

    #[test]
    fn transitive_dependents() {
        // service -> repo -> db
        let graph = DependencyGraph::new();
        graph.register_dependent("db", "repo");
        graph.register_dependent("repo", "service");

        assert!(graph.is_dependent("db", "service"));
        assert!(graph.is_dependent("db", "repo"));
        assert!(!graph.is_dependent("service", "db"));
    }

    #[test]
    fn is_dependent_survives_cycles() {
        let graph = DependencyGraph::new();
        graph.register_dependent("a", "b");
        graph.register_dependent("b", "a");
        assert!(graph.is_dependent("a", "b"));
        assert!(!graph.is_dependent("a", "c"));
    }

    #[test]
    fn contained_beans_are_dependents_too() {
        let graph = DependencyGraph::new();
        graph.register_contained("(inner bean)#1", "outer");

        assert_eq!(graph.contained_in("outer"), vec!["(inner bean)#1".to_string()]);
        assert_eq!(graph.dependents_of("(inner bean)#1"), vec!["outer".to_string()]);
    }

    #[test]
    fn forget_removes_all_mentions() {
        let graph = DependencyGraph::new();
        graph.register_dependent("db", "repo");
        graph.register_dependent("cache", "repo");

        graph.forget("repo");
        assert!(!graph.has_dependents("db"));
        assert!(!graph.has_dependents("cache"));
        assert!(graph.dependencies_of("repo").is_empty());
    }

    #[test]
    fn take_detaches() {
        let graph = DependencyGraph::new();
        graph.register_dependent("db", "repo");
        assert_eq!(graph.take_dependents("db"), vec!["repo".to_string()]);
        assert!(graph.take_dependents("db").is_empty());
    }

    fn declared(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(n, deps)| (n.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn depends_on_cycle_detected() {
        let mut validator = DependsOnValidator::new(declared(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["a"]),
        ]));
        match validator.validate() {
            Err(ContainerError::BeanCreation(e)) => {
                assert!(e.message.contains("Circular depends-on relationship"));
                assert!(e.message.contains("a → b → c → a"));
            }
            other => panic!("Expected BeanCreation error, got: {other:?}"),
        }
    }

    #[test]
    fn depends_on_diamond_ok() {
        let mut validator = DependsOnValidator::new(declared(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["d"]),
        ]));
        assert!(validator.validate().is_ok());
    }

    #[test]
    fn undeclared_targets_are_leaves() {
        let mut validator = DependsOnValidator::new(declared(&[("a", &["missing"])]));
        assert!(validator.validate().is_ok());
    }
}
