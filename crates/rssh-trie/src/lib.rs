//! Prefix trie for interactive name completion.
//!
//! The trie stores whole keys and answers "which keys start with this
//! prefix" queries. All operations take `&self` so one instance can be
//! shared between the component that registers names and the terminal
//! that completes them.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<char, Node>,
    terminal: bool,
}

impl Node {
    fn collect(&self, prefix: &mut String, out: &mut Vec<String>) {
        if self.terminal {
            out.push(prefix.clone());
        }
        for (ch, child) in &self.children {
            prefix.push(*ch);
            child.collect(prefix, out);
            prefix.pop();
        }
    }

    /// Removes `key` below this node. Returns true when this node became
    /// empty and can be dropped by its parent.
    fn remove(&mut self, mut chars: std::str::Chars<'_>) -> bool {
        match chars.next() {
            None => self.terminal = false,
            Some(ch) => {
                if let Some(child) = self.children.get_mut(&ch) {
                    if child.remove(chars) {
                        self.children.remove(&ch);
                    }
                }
            }
        }
        !self.terminal && self.children.is_empty()
    }
}

/// A thread-safe set of strings supporting prefix lookup.
#[derive(Debug, Default)]
pub struct Trie {
    root: RwLock<Node>,
}

impl Trie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key. Inserting an existing key is a no-op.
    pub fn add(&self, key: &str) {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        let mut node = &mut *root;
        for ch in key.chars() {
            node = node.children.entry(ch).or_default();
        }
        node.terminal = true;
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        root.remove(key.chars());
    }

    /// Whether the exact key is present.
    pub fn contains(&self, key: &str) -> bool {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        let mut node = &*root;
        for ch in key.chars() {
            match node.children.get(&ch) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.terminal
    }

    /// All keys starting with `prefix`, in lexical order.
    ///
    /// An empty prefix returns every key.
    pub fn prefix_matches(&self, prefix: &str) -> Vec<String> {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        let mut node = &*root;
        for ch in prefix.chars() {
            match node.children.get(&ch) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }

        let mut out = Vec::new();
        let mut buf = prefix.to_string();
        node.collect(&mut buf, &mut out);
        out
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.prefix_matches("").len()
    }

    pub fn is_empty(&self) -> bool {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        !root.terminal && root.children.is_empty()
    }
}
