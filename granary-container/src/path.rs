//! The creation path: which beans the current call chain is building.
//!
//! Instead of thread-local bookkeeping, every internal creation call
//! receives the [`CreationPath`] of its caller and extends it with one
//! [`Frame`] for the bean it is about to build. Frames live on the stack of
//! the creating call, so the path is naturally per call chain: two threads
//! creating the same prototype never see each other, while a prototype that
//! (indirectly) requires itself finds its own name on the path.

use std::fmt;

/// Shared, immutable view of the frames above the current call.
#[derive(Clone, Copy, Default)]
pub(crate) struct CreationPath<'a> {
    head: Option<&'a Frame<'a>>,
}

/// One bean in creation.
pub(crate) struct Frame<'a> {
    name: String,
    /// Prototype, custom-scoped or inner bean: re-entry is always a cycle.
    /// Singletons are tracked globally by the singleton registry instead.
    scoped: bool,
    parent: CreationPath<'a>,
}

impl<'a> CreationPath<'a> {
    /// The empty path of a top-level request.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a frame for `name` on top of this path.
    pub fn frame(self, name: &str, scoped: bool) -> Frame<'a> {
        Frame {
            name: name.to_string(),
            scoped,
            parent: self,
        }
    }

    fn frames(&self) -> impl Iterator<Item = &'a Frame<'a>> {
        std::iter::successors(self.head, |f| f.parent.head)
    }

    /// Returns `true` if a scoped (non-singleton) frame for `name` is on the path.
    pub fn contains_scoped(&self, name: &str) -> bool {
        self.frames().any(|f| f.scoped && f.name == name)
    }

    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    /// Names on the path, outermost first.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frames().map(|f| f.name.clone()).collect();
        names.reverse();
        names
    }

    /// The chain from the outermost occurrence of `name` to the current
    /// frame, closed with `name` again, e.g. `a → b → a`.
    pub fn cycle_to(&self, name: &str) -> Vec<String> {
        let names = self.names();
        let mut chain: Vec<String> = match names.iter().position(|n| n == name) {
            Some(start) => names[start..].to_vec(),
            None => vec![name.to_string()],
        };
        chain.push(name.to_string());
        chain
    }
}

impl<'a> Frame<'a> {
    /// The path including this frame.
    pub fn path(&self) -> CreationPath<'_> {
        CreationPath { head: Some(self) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CreationPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        let root = CreationPath::root();
        assert_eq!(root.depth(), 0);
        assert!(root.names().is_empty());
        assert!(!root.contains_scoped("a"));
    }

    #[test]
    fn frames_stack_outermost_first() {
        let a = CreationPath::root().frame("a", false);
        let b = a.path().frame("b", true);
        let path = b.path();

        assert_eq!(path.names(), vec!["a", "b"]);
        assert_eq!(path.depth(), 2);
        assert!(path.contains_scoped("b"));
        assert!(!path.contains_scoped("a"));
        assert_eq!(b.name(), "b");
    }

    #[test]
    fn cycle_report_starts_at_first_occurrence() {
        let x = CreationPath::root().frame("x", false);
        let a = x.path().frame("a", true);
        let b = a.path().frame("b", true);

        assert_eq!(b.path().cycle_to("a"), vec!["a", "b", "a"]);
        assert_eq!(b.path().cycle_to("zzz"), vec!["zzz", "zzz"]);
    }
}
