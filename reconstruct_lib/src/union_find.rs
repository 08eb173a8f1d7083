//! Disjoint-set forest used by the contouring engine to merge regions discovered by
//! independent flood-fills.
//!
//! A direct translation of the original `UnionFind<T>`: path compression without rank
//! balancing (worst case `O(n log n)`, good case `O(n)`), backed by a parent map rather than
//! a dense array since element ids here are not contiguous from zero.

use std::hash::Hash;

use crate::{new_map, MapType};

pub struct UnionFind<T> {
    parent: MapType<T, T>,
}

impl<T> Default for UnionFind<T> {
    fn default() -> Self {
        Self { parent: new_map() }
    }
}

impl<T> UnionFind<T>
where
    T: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.parent.clear();
    }

    /// Registers `e` as the sole member of its own class, if not already known. Needed so
    /// that a class with exactly one member (never involved in a `unify` call) is still
    /// counted by [`class_count`](Self::class_count).
    pub fn make_set(&mut self, e: T) {
        self.parent.entry(e).or_insert(e);
    }

    /// Finds the representative of `e`'s class, applying path compression, without
    /// inserting `e` if it has never been seen.
    fn irep(&mut self, e: T) -> Option<T> {
        if !self.parent.contains_key(&e) {
            return None;
        }
        let mut root = e;
        loop {
            let next = *self.parent.get(&root).unwrap();
            if next == root {
                break;
            }
            root = next;
        }
        let mut cur = e;
        while cur != root {
            let next = *self.parent.get(&cur).unwrap();
            self.parent.insert(cur, root);
            cur = next;
        }
        Some(root)
    }

    /// Puts the two elements in the same equivalence class. Returns whether they were
    /// previously in different classes.
    pub fn unify(&mut self, e1: T, e2: T) -> bool {
        if e1 == e2 {
            return false;
        }
        let r1 = self.irep(e1).unwrap_or_else(|| {
            self.parent.insert(e1, e1);
            e1
        });
        let r2 = self.irep(e2).unwrap_or_else(|| {
            self.parent.insert(e2, e2);
            e2
        });
        if r1 == r2 {
            return false;
        }
        self.parent.insert(r1, r2);
        true
    }

    /// Are the two elements in the same equivalence class? Elements never seen before are
    /// treated as singleton classes of their own.
    pub fn equal(&mut self, e1: T, e2: T) -> bool {
        if e1 == e2 {
            return true;
        }
        match (self.irep(e1), self.irep(e2)) {
            (Some(r1), Some(r2)) => r1 == r2,
            _ => false,
        }
    }

    /// Returns the representative label for `e`. Only valid until the next call to [`unify`](Self::unify).
    pub fn get_label(&mut self, e: T) -> T {
        self.irep(e).unwrap_or(e)
    }

    /// Number of distinct equivalence classes among elements inserted so far.
    pub fn class_count(&mut self) -> usize {
        let elems: Vec<T> = self.parent.keys().copied().collect();
        let mut set = std::collections::HashSet::new();
        for e in elems {
            set.insert(self.get_label(e));
        }
        set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_and_equal() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        assert!(!uf.equal(1, 2));
        assert!(uf.unify(1, 2));
        assert!(uf.equal(1, 2));
        assert!(!uf.unify(1, 2));
        assert!(uf.unify(2, 3));
        assert!(uf.equal(1, 3));
    }

    #[test]
    fn class_count_tracks_merges() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        uf.unify(0, 1);
        uf.unify(2, 3);
        uf.unify(4, 4);
        assert_eq!(uf.class_count(), 2);
        uf.unify(1, 2);
        assert_eq!(uf.class_count(), 1);
    }

    #[test]
    fn get_label_stable_until_next_unify() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        uf.unify(10, 20);
        let l1 = uf.get_label(10);
        let l2 = uf.get_label(20);
        assert_eq!(l1, l2);
    }
}
