//! Name completion collaborator.

use rssh_trie::Trie;

/// Receives every live lookup key so interactive prompts can complete them.
///
/// Implementations must be cheap and infallible: they are called while the
/// cache holds its write lock.
pub trait CompletionIndex: Send + Sync {
    fn add(&self, key: &str);
    fn remove(&self, key: &str);
}

impl CompletionIndex for Trie {
    fn add(&self, key: &str) {
        Trie::add(self, key);
    }

    fn remove(&self, key: &str) {
        Trie::remove(self, key);
    }
}
