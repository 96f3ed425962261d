//! Name interning for MNA unknowns.
//!
//! Nodes and branches live in separate namespaces. Both hand out dense
//! indices in first-seen order; node index 0 is always ground.

use std::collections::HashMap;

/// Canonical ground name.
pub const GROUND: &str = "0";

/// Whether a node name refers to the reference node.
pub fn is_ground(name: &str) -> bool {
    name == GROUND || name.eq_ignore_ascii_case("gnd")
}

#[derive(Debug, Clone, Default)]
struct Interner {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl Interner {
    fn add(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.lookup.get(name) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), idx);
        idx
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }
}

/// Circuit nodes. Ground is pre-registered at index 0.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    inner: Interner,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        let mut inner = Interner::default();
        inner.add(GROUND);
        Self { inner }
    }

    /// Intern `name`, returning its existing index if already known.
    /// Every ground alias maps to index 0.
    pub fn add(&mut self, name: &str) -> usize {
        if is_ground(name) {
            return 0;
        }
        self.inner.add(name)
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        if is_ground(name) {
            return Some(0);
        }
        self.inner.index(name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.inner.names.get(index).map(String::as_str)
    }

    /// Node count including ground.
    pub fn len(&self) -> usize {
        self.inner.names.len()
    }

    /// Always false: ground is present from construction.
    pub fn is_empty(&self) -> bool {
        self.inner.names.is_empty()
    }

    /// Node names in index order, without ground. Position `i` here is row
    /// `i` of a ground-shed solution vector.
    pub fn names_exgnd(&self) -> &[String] {
        &self.inner.names[1..]
    }
}

/// Auxiliary current unknowns, keyed by the owning component's name.
#[derive(Debug, Clone, Default)]
pub struct BranchRegistry {
    inner: Interner,
}

impl BranchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str) -> usize {
        self.inner.add(name)
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.inner.index(name)
    }

    pub fn len(&self) -> usize {
        self.inner.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.inner.names
    }
}
