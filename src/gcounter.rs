use alloc::collections::BTreeMap;
use alloc::string::String;
use core::iter::Sum;
use core::ops::AddAssign;

use crate::Crdt;

/// A grow-only counter (G-Counter), state-based.
///
/// Each replica owns one slot and only ever increments its own slot. The
/// total value is the sum of all slots. Merging takes the slot-wise maximum,
/// which makes the counter a join-semilattice.
///
/// Two counters compare equal when their totals are equal, even if the
/// totals are distributed differently across slots. Compare
/// [`slots`](GCounter::slots) when the full state matters.
///
/// # Example
///
/// ```
/// use collab_kit::prelude::*;
///
/// let mut c1: GCounter = GCounter::new("node-1");
/// c1.increment();
/// c1.increment();
///
/// let mut c2: GCounter = GCounter::new("node-2");
/// c2.increment();
///
/// c1.merge(&c2);
/// assert_eq!(c1.value(), 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GCounter<T = u64, Id: Ord = String> {
    replica: Id,
    counts: BTreeMap<Id, T>,
}

impl<T, Id> GCounter<T, Id>
where
    T: Copy + Ord + Default + AddAssign + Sum,
    Id: Ord + Clone,
{
    /// Create a new G-Counter for the given replica.
    pub fn new(replica: impl Into<Id>) -> Self {
        Self {
            replica: replica.into(),
            counts: BTreeMap::new(),
        }
    }

    /// Increment this replica's slot by `amount`.
    ///
    /// Negative amounts are clamped to zero; a grow-only counter cannot
    /// represent decrements.
    pub fn increment_by(&mut self, amount: T) {
        let amount = amount.max(T::default());
        *self.counts.entry(self.replica.clone()).or_default() += amount;
    }

    /// Get the total counter value across all replicas.
    #[must_use]
    pub fn value(&self) -> T {
        self.counts.values().copied().sum()
    }

    /// Get this replica's id.
    #[must_use]
    pub fn replica(&self) -> &Id {
        &self.replica
    }

    /// Get the count contributed by a specific replica.
    #[must_use]
    pub fn count_for(&self, replica: &Id) -> T {
        self.counts.get(replica).copied().unwrap_or_default()
    }

    /// Iterate over every `(replica, count)` slot.
    pub fn slots(&self) -> impl Iterator<Item = (&Id, T)> {
        self.counts.iter().map(|(id, count)| (id, *count))
    }
}

impl<T, Id> GCounter<T, Id>
where
    T: Copy + Ord + Default + AddAssign + Sum + From<u8>,
    Id: Ord + Clone,
{
    /// Increment this replica's slot by one.
    pub fn increment(&mut self) {
        self.increment_by(T::from(1));
    }
}

impl<T, Id> Crdt for GCounter<T, Id>
where
    T: Copy + Ord + Default,
    Id: Ord + Clone,
{
    fn merge(&mut self, other: &Self) {
        for (replica, &count) in &other.counts {
            let slot = self.counts.entry(replica.clone()).or_default();
            *slot = (*slot).max(count);
        }
    }
}

impl<T, Id> PartialEq for GCounter<T, Id>
where
    T: Copy + Ord + Default + AddAssign + Sum,
    Id: Ord + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl<T, Id> Eq for GCounter<T, Id>
where
    T: Copy + Ord + Default + AddAssign + Sum,
    Id: Ord + Clone,
{
}
