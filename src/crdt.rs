/// A replicated value whose replicas converge by exchanging whole states.
///
/// Merging must form a join: for replicas `a`, `b` and `c`
///
/// - `a ⊔ b == b ⊔ a`
/// - `(a ⊔ b) ⊔ c == a ⊔ (b ⊔ c)`
/// - `a ⊔ a == a`
///
/// so replicas that have seen the same set of states agree regardless of
/// the order or number of merges.
pub trait Crdt {
    /// Fold `other` into `self`, leaving the join of the two states.
    fn merge(&mut self, other: &Self);
}

/// A CRDT whose replicas exchange individual operations instead of state.
///
/// ```text
/// State-based:      state ──merge──▶ state
/// Operation-based:  op ──apply──▶ state ──broadcast op──▶ other replicas
/// ```
///
/// For convergence, `apply` must be:
/// - **Commutative**: delivering operations in any order gives the same state
/// - **Idempotent**: delivering an operation twice has no additional effect
pub trait OpCrdt {
    /// The operation type exchanged between replicas.
    type Op;

    /// Apply an operation, local or remote.
    ///
    /// Returns `true` if the replica state changed and `false` if the
    /// operation was superseded by state already known here.
    fn apply(&mut self, op: &Self::Op) -> bool;
}
