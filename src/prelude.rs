//! Convenient re-exports for common usage.
//!
//! ```
//! use collab_kit::prelude::*;
//! ```

pub use crate::clock::{LamportClock, ReplicaId, Stamp};
pub use crate::Crdt;
pub use crate::Entry;
pub use crate::GCounter;
pub use crate::LWWMap;
pub use crate::LWWRegister;
pub use crate::MapOp;
pub use crate::OpCrdt;
