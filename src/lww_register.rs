use crate::clock::Stamp;
use crate::Crdt;

/// A last-writer-wins register (LWW-Register).
///
/// Holds a single value together with the stamp of the write that produced
/// it. Concurrent writes are resolved by keeping the value with the greatest
/// stamp, regardless of the order in which they arrive.
///
/// Stamps must be unique per write; see [`crate::clock`].
///
/// # Example
///
/// ```
/// use collab_kit::prelude::*;
///
/// let mut r = LWWRegister::new("draft", Stamp::new(1, 1));
///
/// assert!(r.assign("final", Stamp::new(3, 2)));
/// // An older write arriving late loses
/// assert!(!r.assign("stale", Stamp::new(2, 1)));
///
/// assert_eq!(*r.value(), "final");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LWWRegister<T, S = Stamp> {
    value: T,
    stamp: S,
}

impl<T: Clone, S: Ord + Clone> LWWRegister<T, S> {
    /// Create a register seeded with `value` written at `stamp`.
    pub fn new(value: T, stamp: S) -> Self {
        Self { value, stamp }
    }

    /// Write `value` if `stamp` is greater than the stored stamp.
    ///
    /// Returns `true` if the write won. A write with a smaller or equal stamp
    /// is a silent no-op and returns `false`.
    pub fn assign(&mut self, value: T, stamp: S) -> bool {
        if stamp > self.stamp {
            self.value = value;
            self.stamp = stamp;
            true
        } else {
            false
        }
    }

    /// Get the current value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Get the stamp of the current value.
    #[must_use]
    pub fn stamp(&self) -> &S {
        &self.stamp
    }

    /// Copy out the current value and stamp.
    #[must_use]
    pub fn query(&self) -> (T, S) {
        (self.value.clone(), self.stamp.clone())
    }
}

impl<T: Clone, S: Ord + Clone> Crdt for LWWRegister<T, S> {
    fn merge(&mut self, other: &Self) {
        self.assign(other.value.clone(), other.stamp.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_register_holds_value() {
        let r = LWWRegister::new(42, 1u64);
        assert_eq!(*r.value(), 42);
        assert_eq!(*r.stamp(), 1);
    }

    #[test]
    fn assign_with_greater_stamp_wins() {
        let mut r = LWWRegister::new(1, 1u64);
        assert!(r.assign(2, 2));
        assert_eq!(r.query(), (2, 2));
    }

    #[test]
    fn assign_with_smaller_stamp_is_ignored() {
        let mut r = LWWRegister::new("new", 5u64);
        assert!(!r.assign("old", 3));
        assert_eq!(*r.value(), "new");
        assert_eq!(*r.stamp(), 5);
    }

    #[test]
    fn duplicate_assign_is_noop() {
        let mut r = LWWRegister::new("a", Stamp::new(1, 1));
        assert!(r.assign("b", Stamp::new(2, 1)));
        assert!(!r.assign("b", Stamp::new(2, 1)));
        assert_eq!(*r.value(), "b");
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let t1 = Stamp::new(1, 1);
        let t2 = Stamp::new(1, 2);

        let mut forward = LWWRegister::new("init", Stamp::new(0, 0));
        forward.assign("v1", t1);
        forward.assign("v2", t2);

        let mut backward = LWWRegister::new("init", Stamp::new(0, 0));
        backward.assign("v2", t2);
        backward.assign("v1", t1);

        assert_eq!(*forward.value(), "v2");
        assert_eq!(forward, backward);
    }

    #[test]
    fn merge_keeps_later_stamp() {
        let mut r1 = LWWRegister::new("old", 1u64);
        let r2 = LWWRegister::new("new", 2u64);

        r1.merge(&r2);
        assert_eq!(*r1.value(), "new");
    }

    #[test]
    fn merge_keeps_self_if_later() {
        let mut r1 = LWWRegister::new("new", 2u64);
        let r2 = LWWRegister::new("old", 1u64);

        r1.merge(&r2);
        assert_eq!(*r1.value(), "new");
    }

    #[test]
    fn merge_is_idempotent() {
        let mut r1 = LWWRegister::new("x", 1u64);
        let r2 = LWWRegister::new("y", 2u64);

        r1.merge(&r2);
        let after_first = r1.clone();
        r1.merge(&r2);

        assert_eq!(r1, after_first);
    }
}
