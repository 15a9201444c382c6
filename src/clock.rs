//! Lamport stamps for last-writer-wins resolution.
//!
//! A [`Stamp`] is a logical counter paired with the id of the replica that
//! issued it. Ordering compares the counter first and the replica second, so
//! stamps are totally ordered and two distinct events never compare equal as
//! long as each replica issues its own stamps through a [`LamportClock`].
//!
//! # Example
//!
//! ```
//! use collab_kit::clock::{LamportClock, Stamp};
//!
//! let mut clock = LamportClock::new(1);
//!
//! let s1 = clock.tick();
//! let s2 = clock.tick();
//! assert!(s2 > s1);
//!
//! // A stamp from a replica that is ahead of us
//! let remote = Stamp::new(40, 2);
//! clock.observe(&remote);
//! assert!(clock.tick() > remote);
//! ```

use core::cmp;
use core::fmt;

/// Identifier of a replica issuing stamps.
pub type ReplicaId = u32;

/// A totally ordered `(counter, replica)` stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stamp {
    /// Logical clock value.
    pub counter: u64,
    /// Replica that issued the stamp, used as tiebreaker.
    pub replica: ReplicaId,
}

impl Stamp {
    /// Create a stamp from its parts.
    #[must_use]
    pub const fn new(counter: u64, replica: ReplicaId) -> Self {
        Self { counter, replica }
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.counter
            .cmp(&other.counter)
            .then(self.replica.cmp(&other.replica))
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.replica)
    }
}

/// A Lamport clock for a single replica.
///
/// Call [`tick`](LamportClock::tick) for every local update and
/// [`observe`](LamportClock::observe) for every stamp received from another
/// replica.
#[derive(Debug, Clone)]
pub struct LamportClock {
    replica: ReplicaId,
    counter: u64,
}

impl LamportClock {
    /// Create a clock for the given replica, starting before any event.
    #[must_use]
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            counter: 0,
        }
    }

    /// Issue a stamp for a local event.
    ///
    /// The result is strictly greater than every stamp previously issued or
    /// observed by this clock.
    pub fn tick(&mut self) -> Stamp {
        self.counter += 1;
        Stamp::new(self.counter, self.replica)
    }

    /// Advance the clock past a stamp received from another replica.
    pub fn observe(&mut self, remote: &Stamp) {
        self.counter = cmp::max(self.counter, remote.counter);
    }

    /// The last stamp issued, if any.
    #[must_use]
    pub fn last(&self) -> Option<Stamp> {
        (self.counter > 0).then(|| Stamp::new(self.counter, self.replica))
    }

    /// Get the replica id of this clock.
    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_strictly_increasing() {
        let mut clock = LamportClock::new(7);
        let s1 = clock.tick();
        let s2 = clock.tick();
        let s3 = clock.tick();

        assert!(s1 < s2);
        assert!(s2 < s3);
        assert_eq!(s1, Stamp::new(1, 7));
        assert_eq!(s3.counter, 3);
    }

    #[test]
    fn observe_jumps_past_remote() {
        let mut clock = LamportClock::new(1);
        clock.tick();

        let remote = Stamp::new(10, 2);
        clock.observe(&remote);
        let next = clock.tick();

        assert!(next > remote);
        assert_eq!(next, Stamp::new(11, 1));
    }

    #[test]
    fn observe_older_stamp_keeps_counter() {
        let mut clock = LamportClock::new(1);
        for _ in 0..5 {
            clock.tick();
        }
        clock.observe(&Stamp::new(2, 9));
        assert_eq!(clock.tick().counter, 6);
    }

    #[test]
    fn replica_breaks_counter_ties() {
        let a = Stamp::new(4, 1);
        let b = Stamp::new(4, 2);
        let c = Stamp::new(5, 0);

        assert!(a < b);
        assert!(b < c); // counter takes precedence over replica
    }

    #[test]
    fn last_is_none_before_first_tick() {
        let mut clock = LamportClock::new(3);
        assert_eq!(clock.last(), None);
        let s = clock.tick();
        assert_eq!(clock.last(), Some(s));
        assert_eq!(clock.replica(), 3);
    }

    #[test]
    fn display_shows_counter_and_replica() {
        assert_eq!(Stamp::new(12, 4).to_string(), "12@4");
    }
}
