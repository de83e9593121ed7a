//! Insertion-ordered registry of live actors.

use parking_lot::RwLock;

/// Shared, insertion-ordered collection.
///
/// Reads hand out clones so no lock is held while callers iterate.
#[derive(Debug)]
pub struct Registry<T> {
    entries: RwLock<Vec<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone + PartialEq> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entry: T) {
        self.entries.write().push(entry);
    }

    /// Remove the first entry equal to `entry`. Returns whether one existed.
    pub fn unregister(&self, entry: &T) -> bool {
        let mut entries = self.entries.write();
        match entries.iter().position(|e| e == entry) {
            Some(idx) => {
                entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Zero-based positional lookup.
    pub fn get(&self, index: usize) -> Option<T> {
        self.entries.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, entry: &T) -> bool {
        self.entries.read().contains(entry)
    }

    /// Snapshot in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().clone()
    }

    pub fn find<P>(&self, mut predicate: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        self.entries.read().iter().find(|e| predicate(e)).cloned()
    }
}
