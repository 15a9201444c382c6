use alloc::collections::BTreeMap;

use crate::clock::Stamp;
use crate::{Crdt, LWWRegister, OpCrdt};

/// A last-writer-wins map (LWW-Map), operation-based.
///
/// Associates keys with [`LWWRegister`]s. Keys are never physically erased:
/// removing a key leaves a tombstone so that operations delivered late can
/// still be ordered against the removal.
///
/// Each key tracks two independently stamped facts:
///
/// - its **value**, written by `insert` and `update`;
/// - its **presence**, decided by the greatest stamp among the `insert` and
///   `remove` operations seen for the key (the tombstone stamp).
///
/// `update` never changes presence. An `update` that arrives before the
/// `insert` of its key creates a provisional entry that is visible until an
/// `insert` or `remove` decides presence.
///
/// # Example
///
/// ```
/// use collab_kit::prelude::*;
///
/// let mut a: LWWMap<&str, &str> = LWWMap::new();
/// let mut b: LWWMap<&str, &str> = LWWMap::new();
///
/// let insert = MapOp::Insert { key: "title", value: "Draft", stamp: Stamp::new(1, 1) };
/// let remove = MapOp::Remove { key: "title", stamp: Stamp::new(2, 2) };
///
/// // Replicas receive the operations in different orders
/// a.apply(&insert);
/// a.apply(&remove);
/// b.apply(&remove);
/// b.apply(&insert);
///
/// assert_eq!(a, b);
/// assert!(!a.contains(&"title"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LWWMap<K: Ord, T, S = Stamp> {
    entries: BTreeMap<K, Entry<T, S>>,
}

/// The state kept for one key of an [`LWWMap`], including tombstones.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry<T, S = Stamp> {
    /// `None` for a key only known through a `remove`.
    register: Option<LWWRegister<T, S>>,
    removed: bool,
    /// Stamp of the latest `insert` or `remove`; `None` for provisional entries.
    tombstone: Option<S>,
}

impl<T: Clone, S: Ord + Clone> Entry<T, S> {
    fn written(value: T, stamp: S, tombstone: Option<S>) -> Self {
        Self {
            register: Some(LWWRegister::new(value, stamp)),
            removed: false,
            tombstone,
        }
    }

    fn write(&mut self, value: T, stamp: S) -> bool {
        match &mut self.register {
            Some(register) => register.assign(value, stamp),
            None => {
                self.register = Some(LWWRegister::new(value, stamp));
                true
            }
        }
    }

    fn mark(&mut self, removed: bool, stamp: S) -> bool {
        let newer = match &self.tombstone {
            Some(current) => stamp > *current,
            None => true,
        };
        if newer {
            self.removed = removed;
            self.tombstone = Some(stamp);
        }
        newer
    }

    /// The visible value, or `None` if the key is removed.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        if self.removed {
            return None;
        }
        self.register.as_ref().map(LWWRegister::value)
    }

    /// The last written value, ignoring removal.
    #[must_use]
    pub fn last_written(&self) -> Option<&T> {
        self.register.as_ref().map(LWWRegister::value)
    }

    /// Stamp of the last written value.
    #[must_use]
    pub fn value_stamp(&self) -> Option<&S> {
        self.register.as_ref().map(LWWRegister::stamp)
    }

    /// Whether the latest presence decision is a removal.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Stamp of the latest `insert` or `remove` applied to this key.
    #[must_use]
    pub fn tombstone(&self) -> Option<&S> {
        self.tombstone.as_ref()
    }
}

/// An operation on an [`LWWMap`], as exchanged between replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MapOp<K, T, S = Stamp> {
    /// See [`LWWMap::insert`].
    Insert {
        /// Target key.
        key: K,
        /// Value to write.
        value: T,
        /// Stamp of the operation.
        stamp: S,
    },
    /// See [`LWWMap::update`].
    Update {
        /// Target key.
        key: K,
        /// Value to write.
        value: T,
        /// Stamp of the operation.
        stamp: S,
    },
    /// See [`LWWMap::remove`].
    Remove {
        /// Target key.
        key: K,
        /// Stamp of the operation.
        stamp: S,
    },
}

impl<K: Ord, T, S> LWWMap<K, T, S> {
    /// Create a new empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord, T: Clone, S: Ord + Clone> LWWMap<K, T, S> {
    /// Insert `value` under `key`, marking the key present.
    ///
    /// If the key is already known this behaves like [`update`](Self::update)
    /// and additionally revives the key when `stamp` is newer than its
    /// latest removal. Two replicas concurrently inserting the same key
    /// converge to a single entry holding the value with the greater stamp.
    ///
    /// Returns `true` if the map changed. An insert older than both the
    /// key's value and its presence changes nothing and returns `false`,
    /// the same as a duplicate delivery. The map has no notion of a
    /// malformed insert; validation belongs to whoever builds the op.
    pub fn insert(&mut self, key: K, value: T, stamp: S) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                let wrote = entry.write(value, stamp.clone());
                let marked = entry.mark(false, stamp);
                wrote || marked
            }
            None => {
                let entry = Entry::written(value, stamp.clone(), Some(stamp));
                self.entries.insert(key, entry);
                true
            }
        }
    }

    /// Write `value` under `key` without changing whether the key is present.
    ///
    /// An update for a key this replica has never seen creates a provisional
    /// entry, so updates delivered before their insert are not lost.
    ///
    /// Returns `true` if the map changed.
    pub fn update(&mut self, key: K, value: T, stamp: S) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) => entry.write(value, stamp),
            None => {
                self.entries.insert(key, Entry::written(value, stamp, None));
                true
            }
        }
    }

    /// Mark `key` removed at `stamp`.
    ///
    /// The value is kept; a later insert with a greater stamp revives it.
    /// A remove whose stamp does not exceed the key's latest insert or
    /// remove is stale and returns `false`.
    pub fn remove(&mut self, key: K, stamp: S) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) => entry.mark(true, stamp),
            None => {
                let entry = Entry {
                    register: None,
                    removed: true,
                    tombstone: Some(stamp),
                };
                self.entries.insert(key, entry);
                true
            }
        }
    }

    /// Get the visible value for `key`.
    ///
    /// Returns `None` if the key is removed or was never observed.
    #[must_use]
    pub fn query(&self, key: &K) -> Option<&T> {
        self.entries.get(key).and_then(Entry::value)
    }

    /// Get the full entry for `key`, tombstones included.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&Entry<T, S>> {
        self.entries.get(key)
    }

    /// Check if `key` is visible.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.query(key).is_some()
    }

    /// Number of visible keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if no key is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Iterate over visible `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| entry.value().map(|value| (key, value)))
    }

    /// Iterate over every entry, tombstones included.
    pub fn cells(&self) -> impl Iterator<Item = (&K, &Entry<T, S>)> {
        self.entries.iter()
    }
}

impl<K: Ord, T, S> Default for LWWMap<K, T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, T: Clone, S: Ord + Clone> OpCrdt for LWWMap<K, T, S> {
    type Op = MapOp<K, T, S>;

    fn apply(&mut self, op: &MapOp<K, T, S>) -> bool {
        match op {
            MapOp::Insert { key, value, stamp } => {
                self.insert(key.clone(), value.clone(), stamp.clone())
            }
            MapOp::Update { key, value, stamp } => {
                self.update(key.clone(), value.clone(), stamp.clone())
            }
            MapOp::Remove { key, stamp } => self.remove(key.clone(), stamp.clone()),
        }
    }
}

impl<K: Ord + Clone, T: Clone, S: Ord + Clone> Crdt for LWWMap<K, T, S> {
    fn merge(&mut self, other: &Self) {
        for (key, theirs) in &other.entries {
            let Some(ours) = self.entries.get_mut(key) else {
                self.entries.insert(key.clone(), theirs.clone());
                continue;
            };
            if let Some(register) = &theirs.register {
                ours.write(register.value().clone(), register.stamp().clone());
            }
            if let Some(stamp) = &theirs.tombstone {
                ours.mark(theirs.removed, stamp.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(counter: u64) -> Stamp {
        Stamp::new(counter, 1)
    }

    #[test]
    fn new_map_is_empty() {
        let m: LWWMap<&str, i32> = LWWMap::new();
        assert!(m.is_empty());
        assert_eq!(m.query(&"k"), None);
        assert!(m.get(&"k").is_none());
    }

    #[test]
    fn insert_makes_key_visible() {
        let mut m = LWWMap::new();
        assert!(m.insert("k", 1, s(1)));
        assert_eq!(m.query(&"k"), Some(&1));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn insert_on_existing_key_acts_as_update() {
        let mut m = LWWMap::new();
        m.insert("k", 1, s(1));
        assert!(m.insert("k", 2, s(2)));
        assert!(!m.insert("k", 0, s(0)));
        assert_eq!(m.query(&"k"), Some(&2));
        assert_eq!(m.cells().count(), 1);
    }

    #[test]
    fn superseded_or_repeated_insert_returns_false() {
        let mut m = LWWMap::new();
        assert!(m.insert("k", 1, s(3)));
        assert!(!m.insert("k", 1, s(3)));
        assert!(!m.insert("k", 9, s(2)));
        assert_eq!(m.query(&"k"), Some(&1));
    }

    #[test]
    fn update_before_insert_creates_provisional_entry() {
        let mut m = LWWMap::new();
        assert!(m.update("k", "v", s(1)));
        assert_eq!(m.query(&"k"), Some(&"v"));
        assert_eq!(m.get(&"k").and_then(Entry::tombstone), None);

        assert!(m.insert("k", "v2", s(2)));
        assert_eq!(m.query(&"k"), Some(&"v2"));
    }

    #[test]
    fn late_insert_does_not_override_newer_update() {
        let mut m = LWWMap::new();
        m.update("k", "newer", s(5));
        m.insert("k", "older", s(3));
        assert_eq!(m.query(&"k"), Some(&"newer"));
    }

    #[test]
    fn remove_hides_key_but_keeps_value() {
        let mut m = LWWMap::new();
        m.insert("k", 1, s(1));
        assert!(m.remove("k", s(2)));

        assert_eq!(m.query(&"k"), None);
        let entry = m.get(&"k").unwrap();
        assert!(entry.is_removed());
        assert_eq!(entry.last_written(), Some(&1));
        assert_eq!(entry.tombstone(), Some(&s(2)));
    }

    #[test]
    fn stale_remove_is_rejected() {
        let mut m = LWWMap::new();
        m.insert("k", 1, s(5));
        assert!(!m.remove("k", s(3)));
        assert_eq!(m.query(&"k"), Some(&1));
    }

    #[test]
    fn duplicate_remove_is_noop() {
        let mut m: LWWMap<&str, i32> = LWWMap::new();
        m.insert("k", 1, s(1));
        assert!(m.remove("k", s(2)));
        assert!(!m.remove("k", s(2)));
    }

    #[test]
    fn newer_insert_revives_removed_key() {
        let mut m = LWWMap::new();
        m.remove("k", s(1));
        assert!(m.insert("k", "v", s(2)));
        assert_eq!(m.query(&"k"), Some(&"v"));
    }

    #[test]
    fn older_insert_stays_removed() {
        let mut m = LWWMap::new();
        m.remove("k", s(2));
        m.insert("k", "v", s(1));
        assert_eq!(m.query(&"k"), None);
        assert!(!m.contains(&"k"));
    }

    #[test]
    fn update_does_not_clear_removal() {
        let mut m = LWWMap::new();
        m.insert("k", 1, s(1));
        m.remove("k", s(2));
        assert!(m.update("k", 3, s(3)));

        assert_eq!(m.query(&"k"), None);
        assert_eq!(m.get(&"k").unwrap().last_written(), Some(&3));
    }

    #[test]
    fn remove_supersedes_provisional_entry() {
        let mut m = LWWMap::new();
        m.update("k", 1, s(3));
        assert!(m.remove("k", s(2)));
        assert_eq!(m.query(&"k"), None);
    }

    #[test]
    fn iter_skips_tombstones() {
        let mut m = LWWMap::new();
        m.insert("a", 1, s(1));
        m.insert("b", 2, s(2));
        m.remove("a", s(3));

        let visible: Vec<_> = m.iter().collect();
        assert_eq!(visible, vec![(&"b", &2)]);
        assert_eq!(m.cells().count(), 2);
    }

    #[test]
    fn apply_dispatches_ops() {
        let mut m = LWWMap::new();
        assert!(m.apply(&MapOp::Insert { key: "k", value: 1, stamp: s(1) }));
        assert!(m.apply(&MapOp::Update { key: "k", value: 2, stamp: s(2) }));
        assert!(!m.apply(&MapOp::Remove { key: "k", stamp: s(1) }));
        assert_eq!(m.query(&"k"), Some(&2));
    }

    #[test]
    fn merge_matches_op_delivery() {
        let mut a = LWWMap::new();
        a.insert("x", 1, Stamp::new(1, 1));
        a.remove("y", Stamp::new(4, 1));

        let mut b = LWWMap::new();
        b.insert("y", 2, Stamp::new(3, 2));
        b.update("x", 5, Stamp::new(2, 2));

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.query(&"x"), Some(&5));
        assert_eq!(ab.query(&"y"), None);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = LWWMap::new();
        a.insert("k", 1, s(1));
        a.remove("k", s(2));

        let before = a.clone();
        let snapshot = a.clone();
        a.merge(&snapshot);
        assert_eq!(a, before);
    }
}
